/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;

pin_project! {
    #[derive(Debug)]
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct SendChunk<'a, W: ?Sized> {
        writer: &'a mut W,
        chunk: &'a [u8],
        offset: usize,
        flush_done: bool,
    }
}

impl<'a, W> SendChunk<'a, W>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    pub(crate) fn new(writer: &'a mut W, chunk: &'a [u8]) -> Self {
        SendChunk {
            writer,
            chunk,
            offset: 0,
            flush_done: false,
        }
    }
}

impl<W> Future for SendChunk<'_, W>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    type Output = io::Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let me = self.project();
        if me.chunk.is_empty() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk to send must not be empty",
            )));
        }

        while *me.offset < me.chunk.len() {
            let n = ready!(Pin::new(&mut *me.writer).poll_write(cx, &me.chunk[*me.offset..]))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            *me.offset += n;
        }

        if !*me.flush_done {
            ready!(Pin::new(&mut *me.writer).poll_flush(cx))?;
            *me.flush_done = true;
            #[cfg(feature = "log-raw-io")]
            crate::debug::log_send(me.chunk.len());
        }

        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use crate::AsyncChunkSendExt;

    #[tokio::test]
    async fn send_one() {
        let mut stream = tokio_test::io::Builder::new().write(b"123456").build();
        stream.send_chunk(b"123456").await.unwrap();
    }

    #[tokio::test]
    async fn send_split() {
        // the peer accepts the chunk in two partial writes
        let mut stream = tokio_test::io::Builder::new()
            .write(b"123")
            .write(b"456")
            .build();
        stream.send_chunk(b"123456").await.unwrap();
    }

    #[tokio::test]
    async fn send_empty() {
        let mut stream = tokio_test::io::Builder::new().build();
        let err = stream.send_chunk(b"").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
