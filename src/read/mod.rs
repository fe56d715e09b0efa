/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;

use crate::error::StreamError;
use crate::io::poll_recv_once;

mod demand;
pub use demand::DemandRecvStream;

pin_project! {
    /// Pull-producer over a connection's read half.
    ///
    /// Emits chunks of at most `max_chunk_size` bytes, one receive per chunk,
    /// in receive order. End-of-stream terminates the sequence with `None`
    /// and the stream stays terminated. An I/O failure is emitted as a single
    /// `Err` item, after which the stream is also terminated.
    ///
    /// The read half must be driven by exactly one stage at a time: two
    /// readers pulling from the same connection see arbitrary byte
    /// interleaving.
    pub struct RecvStream<R> {
        #[pin]
        reader: R,
        buf: Box<[u8]>,
        read_done: bool,
    }
}

impl<R> RecvStream<R> {
    pub fn new(reader: R, max_chunk_size: usize) -> Self {
        RecvStream {
            reader,
            buf: vec![0u8; max_chunk_size].into_boxed_slice(),
            read_done: false,
        }
    }

    #[inline]
    pub fn max_chunk_size(&self) -> usize {
        self.buf.len()
    }

    /// Bound every chunk receive with `timeout`.
    pub fn timed(self, timeout: Duration) -> crate::timeout::TimedRecvStream<R> {
        crate::timeout::TimedRecvStream::new(self, timeout)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R> Stream for RecvStream<R>
where
    R: AsyncRead,
{
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.read_done {
            return Poll::Ready(None);
        }
        match ready!(poll_recv_once(this.reader, cx, this.buf)) {
            Ok(Some(nr)) => Poll::Ready(Some(Ok(Bytes::copy_from_slice(&this.buf[..nr])))),
            Ok(None) => {
                *this.read_done = true;
                Poll::Ready(None)
            }
            Err(e) => {
                *this.read_done = true;
                Poll::Ready(Some(Err(StreamError::RecvFailed(e))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn split_chunks() {
        let stream = tokio_test::io::Builder::new()
            .read(b"hello")
            .read(b"")
            .build();
        let mut recv = RecvStream::new(stream, 4);
        assert_eq!(recv.next().await.unwrap().unwrap().as_ref(), b"hell");
        assert_eq!(recv.next().await.unwrap().unwrap().as_ref(), b"o");
        assert!(recv.next().await.is_none());
        // terminated for good
        assert!(recv.next().await.is_none());
    }

    #[tokio::test]
    async fn single_chunk() {
        let stream = tokio_test::io::Builder::new()
            .read(b"hello")
            .read(b"")
            .build();
        let mut recv = RecvStream::new(stream, 10);
        assert_eq!(recv.next().await.unwrap().unwrap().as_ref(), b"hello");
        assert!(recv.next().await.is_none());
    }

    #[tokio::test]
    async fn reassemble() {
        let stream = tokio_test::io::Builder::new()
            .read(b"the quick brown fox ")
            .read(b"jumps over ")
            .read(b"the lazy dog")
            .read(b"")
            .build();
        let mut recv = RecvStream::new(stream, 7);
        let mut all = Vec::new();
        while let Some(r) = recv.next().await {
            let chunk = r.unwrap();
            assert!(!chunk.is_empty());
            assert!(chunk.len() <= 7);
            all.extend_from_slice(&chunk);
        }
        assert_eq!(all.as_slice(), b"the quick brown fox jumps over the lazy dog");
    }

    #[tokio::test]
    async fn recv_error() {
        let stream = tokio_test::io::Builder::new()
            .read(b"x")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut recv = RecvStream::new(stream, 4);
        assert_eq!(recv.next().await.unwrap().unwrap().as_ref(), b"x");
        let err = recv.next().await.unwrap().unwrap_err();
        assert!(err.is_io());
        assert!(recv.next().await.is_none());
    }

    #[tokio::test]
    async fn zero_max_size() {
        let stream = tokio_test::io::Builder::new().build();
        let mut recv = RecvStream::new(stream, 0);
        let err = recv.next().await.unwrap().unwrap_err();
        assert!(err.is_io());
        assert!(recv.next().await.is_none());
    }
}
