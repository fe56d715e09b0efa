/*
 * SPDX-License-Identifier: Apache-2.0
 */

use tokio::io::{AsyncRead, AsyncWrite};

use super::recv_chunk::RecvChunk;
use super::send_chunk::SendChunk;

pub trait AsyncChunkRecvExt: AsyncRead {
    /// Receive at most `max_len` bytes in a single read.
    ///
    /// Resolves to `Ok(None)` on end-of-stream, and to
    /// `io::ErrorKind::InvalidInput` if `max_len` is 0.
    fn recv_chunk(&mut self, max_len: usize) -> RecvChunk<'_, Self>
    where
        Self: Unpin,
    {
        RecvChunk::new(self, max_len)
    }
}

impl<R: AsyncRead + ?Sized> AsyncChunkRecvExt for R {}

pub trait AsyncChunkSendExt: AsyncWrite {
    /// Send the whole non-empty chunk and flush before resolving.
    fn send_chunk<'a>(&'a mut self, chunk: &'a [u8]) -> SendChunk<'a, Self>
    where
        Self: Unpin,
    {
        SendChunk::new(self, chunk)
    }
}

impl<W: AsyncWrite + ?Sized> AsyncChunkSendExt for W {}
