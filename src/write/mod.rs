/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;

use crate::error::StreamError;

fn empty_chunk_error() -> StreamError {
    StreamError::SendFailed(io::Error::new(
        io::ErrorKind::InvalidInput,
        "chunk to send must not be empty",
    ))
}

pin_project! {
    /// Push-consumer over a connection's write half.
    ///
    /// Each chunk is fully written and flushed, in order, before the next is
    /// accepted. `poll_close` flushes pending data but does not shut the
    /// connection down, the connection stays usable and is still owned by
    /// the caller.
    ///
    /// The write half must be driven by exactly one stage at a time: a
    /// concurrent second writer interleaves bytes on the wire.
    pub struct SendSink<W> {
        #[pin]
        writer: W,
        chunk: Option<Bytes>,
        offset: usize,
        need_flush: bool,
    }
}

impl<W> SendSink<W> {
    pub fn new(writer: W) -> Self {
        SendSink {
            writer,
            chunk: None,
            offset: 0,
            need_flush: false,
        }
    }

    /// Bound every chunk send with `timeout`.
    pub fn timed(self, timeout: Duration) -> crate::timeout::TimedSendSink<W> {
        crate::timeout::TimedSendSink::new(self, timeout)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> SendSink<W>
where
    W: AsyncWrite,
{
    pub(crate) fn poll_send_pending(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), StreamError>> {
        let mut this = self.project();
        if let Some(chunk) = this.chunk.take() {
            while *this.offset < chunk.len() {
                match this.writer.as_mut().poll_write(cx, &chunk[*this.offset..]) {
                    Poll::Pending => {
                        *this.chunk = Some(chunk);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(0)) => {
                        return Poll::Ready(Err(StreamError::SendFailed(
                            io::ErrorKind::WriteZero.into(),
                        )));
                    }
                    Poll::Ready(Ok(n)) => *this.offset += n,
                    Poll::Ready(Err(e)) => {
                        return Poll::Ready(Err(StreamError::SendFailed(e)));
                    }
                }
            }
            *this.offset = 0;
            *this.need_flush = true;
            #[cfg(feature = "log-raw-io")]
            crate::debug::log_send(chunk.len());
        }
        if *this.need_flush {
            ready!(this.writer.as_mut().poll_flush(cx)).map_err(StreamError::SendFailed)?;
            *this.need_flush = false;
        }
        Poll::Ready(Ok(()))
    }
}

impl<W> Sink<Bytes> for SendSink<W>
where
    W: AsyncWrite,
{
    type Error = StreamError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.poll_send_pending(cx)
    }

    fn start_send(self: Pin<&mut Self>, chunk: Bytes) -> Result<(), Self::Error> {
        if chunk.is_empty() {
            return Err(empty_chunk_error());
        }
        let this = self.project();
        debug_assert!(this.chunk.is_none(), "start_send called while not ready");
        *this.chunk = Some(chunk);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.poll_send_pending(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // connection lifetime belongs to the caller, flush only
        self.poll_send_pending(cx)
    }
}

pin_project! {
    /// Pass-through transformer sending every upstream chunk to a connection.
    ///
    /// Each chunk is fully written and flushed before the next is pulled from
    /// upstream. With tee mode enabled the identical chunk is re-emitted
    /// downstream after its send completes, so a pipeline can both persist
    /// and forward the same data. The stage has no termination of its own,
    /// it ends when upstream ends or a send fails.
    pub struct SendStream<S, W> {
        #[pin]
        upstream: S,
        #[pin]
        writer: W,
        chunk: Option<Bytes>,
        offset: usize,
        tee: bool,
        sent_chunks: u64,
        done: bool,
    }
}

impl<S, W> SendStream<S, W> {
    pub fn new(upstream: S, writer: W) -> Self {
        SendStream {
            upstream,
            writer,
            chunk: None,
            offset: 0,
            tee: false,
            sent_chunks: 0,
            done: false,
        }
    }

    /// Re-emit each chunk downstream after its send completes.
    pub fn with_tee(mut self) -> Self {
        self.tee = true;
        self
    }

    /// Bound every chunk send with `timeout`. Time spent waiting on upstream
    /// is not counted.
    pub fn timed(self, timeout: Duration) -> crate::timeout::TimedSendStream<S, W> {
        crate::timeout::TimedSendStream::new(self, timeout)
    }

    /// Whether a chunk transfer (write or trailing flush) is in flight.
    pub fn is_sending(&self) -> bool {
        self.chunk.is_some()
    }

    /// Number of chunks fully sent so far.
    pub fn sent_chunks(&self) -> u64 {
        self.sent_chunks
    }

    pub fn into_parts(self) -> (S, W) {
        (self.upstream, self.writer)
    }
}

impl<S, W> Stream for SendStream<S, W>
where
    S: Stream<Item = Result<Bytes, StreamError>>,
    W: AsyncWrite,
{
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        loop {
            if let Some(chunk) = this.chunk.take() {
                while *this.offset < chunk.len() {
                    match this.writer.as_mut().poll_write(cx, &chunk[*this.offset..]) {
                        Poll::Pending => {
                            *this.chunk = Some(chunk);
                            return Poll::Pending;
                        }
                        Poll::Ready(Ok(0)) => {
                            *this.done = true;
                            return Poll::Ready(Some(Err(StreamError::SendFailed(
                                io::ErrorKind::WriteZero.into(),
                            ))));
                        }
                        Poll::Ready(Ok(n)) => *this.offset += n,
                        Poll::Ready(Err(e)) => {
                            *this.done = true;
                            return Poll::Ready(Some(Err(StreamError::SendFailed(e))));
                        }
                    }
                }
                match this.writer.as_mut().poll_flush(cx) {
                    Poll::Pending => {
                        *this.chunk = Some(chunk);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(())) => {}
                    Poll::Ready(Err(e)) => {
                        *this.done = true;
                        return Poll::Ready(Some(Err(StreamError::SendFailed(e))));
                    }
                }
                #[cfg(feature = "log-raw-io")]
                crate::debug::log_send(chunk.len());
                *this.offset = 0;
                *this.sent_chunks += 1;
                if *this.tee {
                    return Poll::Ready(Some(Ok(chunk)));
                }
                continue;
            }
            match ready!(this.upstream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        *this.done = true;
                        return Poll::Ready(Some(Err(empty_chunk_error())));
                    }
                    *this.chunk = Some(chunk);
                }
                Some(Err(e)) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    *this.done = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}
