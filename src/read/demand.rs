/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::StreamError;
use crate::io::AsyncChunkRecvExt;

/// Pull-producer whose chunk size is set by the consumer on each request.
///
/// Nothing is read from the connection until [`recv`](Self::recv) is called,
/// and each call performs exactly one receive bounded by that call's
/// `max_len`. Suits protocol framing, where the next read size depends on
/// what was parsed so far.
pub struct DemandRecvStream<R> {
    reader: R,
    read_done: bool,
}

impl<R> DemandRecvStream<R> {
    pub fn new(reader: R) -> Self {
        DemandRecvStream {
            reader,
            read_done: false,
        }
    }

    /// Bound every requested receive with `timeout`.
    pub fn timed(self, timeout: Duration) -> crate::timeout::TimedDemandRecvStream<R> {
        crate::timeout::TimedDemandRecvStream::new(self, timeout)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R> DemandRecvStream<R>
where
    R: AsyncRead + Unpin,
{
    /// Receive the next chunk of at most `max_len` bytes.
    ///
    /// `Ok(None)` means the peer shut down in an orderly way; once seen, all
    /// further calls return `Ok(None)` without touching the connection.
    pub async fn recv(&mut self, max_len: usize) -> Result<Option<Bytes>, StreamError> {
        if self.read_done {
            return Ok(None);
        }
        match self.reader.recv_chunk(max_len).await {
            Ok(Some(chunk)) => Ok(Some(chunk)),
            Ok(None) => {
                self.read_done = true;
                Ok(None)
            }
            Err(e) => Err(StreamError::RecvFailed(e)),
        }
    }
}
