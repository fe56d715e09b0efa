/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use tokio::io::{AsyncRead, ReadBuf};

pub struct RecvChunk<'a, R: ?Sized> {
    reader: &'a mut R,
    buf: Vec<u8>,
}

impl<'a, R> RecvChunk<'a, R>
where
    R: AsyncRead + ?Sized + Unpin,
{
    pub(crate) fn new(reader: &'a mut R, max_len: usize) -> Self {
        RecvChunk {
            reader,
            buf: vec![0u8; max_len],
        }
    }
}

/// One bounded receive: exactly one successful `poll_read`.
///
/// `Ok(None)` means end-of-stream. An empty `buf` is rejected without
/// touching the reader, so a zero sized request can never block.
pub(crate) fn poll_recv_once<R: AsyncRead + ?Sized>(
    reader: Pin<&mut R>,
    cx: &mut Context<'_>,
    buf: &mut [u8],
) -> Poll<io::Result<Option<usize>>> {
    if buf.is_empty() {
        return Poll::Ready(Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "max chunk size must be greater than 0",
        )));
    }
    let mut read_buf = ReadBuf::new(buf);
    ready!(reader.poll_read(cx, &mut read_buf))?;
    let nr = read_buf.filled().len();
    if nr == 0 {
        Poll::Ready(Ok(None))
    } else {
        #[cfg(feature = "log-raw-io")]
        crate::debug::log_recv(nr);
        Poll::Ready(Ok(Some(nr)))
    }
}

impl<R> Future for RecvChunk<'_, R>
where
    R: AsyncRead + ?Sized + Unpin,
{
    type Output = io::Result<Option<Bytes>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let RecvChunk { reader, buf } = &mut *self;
        match ready!(poll_recv_once(Pin::new(&mut **reader), cx, buf))? {
            Some(nr) => {
                let mut chunk = mem::take(buf);
                chunk.truncate(nr);
                Poll::Ready(Ok(Some(Bytes::from(chunk))))
            }
            None => Poll::Ready(Ok(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::AsyncChunkRecvExt;

    #[tokio::test]
    async fn closed() {
        let mut stream = tokio_test::io::Builder::new().read(&[]).build();
        assert!(stream.recv_chunk(16).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recv_all() {
        let mut stream = tokio_test::io::Builder::new().read(b"123456").build();
        let chunk = stream.recv_chunk(16).await.unwrap().unwrap();
        assert_eq!(chunk.as_ref(), b"123456");
    }

    #[tokio::test]
    async fn recv_bounded() {
        let mut stream = tokio_test::io::Builder::new().read(b"123456").build();
        let chunk = stream.recv_chunk(4).await.unwrap().unwrap();
        assert_eq!(chunk.as_ref(), b"1234");
        let chunk = stream.recv_chunk(4).await.unwrap().unwrap();
        assert_eq!(chunk.as_ref(), b"56");
    }

    #[tokio::test]
    async fn zero_size() {
        let mut stream = tokio_test::io::Builder::new().build();
        let err = stream.recv_chunk(0).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
