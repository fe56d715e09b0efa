/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, Sleep};

use crate::error::{StreamError, TimeoutError};
use crate::read::{DemandRecvStream, RecvStream};
use crate::write::{SendSink, SendStream};

pin_project! {
    /// [`RecvStream`] with a fresh deadline for every chunk receive.
    ///
    /// The deadline covers one receive attempt, not the stream lifetime: a
    /// slow peer makes progress as long as each individual chunk arrives in
    /// time. On expiry the stage emits `StreamError::Timeout` and terminates,
    /// so a late chunk can never surface afterwards. The connection itself is
    /// untouched and still owned by the caller.
    pub struct TimedRecvStream<R> {
        #[pin]
        inner: RecvStream<R>,
        delay: Pin<Box<Sleep>>,
        timeout: Duration,
        armed: bool,
        done: bool,
    }
}

impl<R> TimedRecvStream<R> {
    pub fn new(inner: RecvStream<R>, timeout: Duration) -> Self {
        TimedRecvStream {
            inner,
            delay: Box::pin(tokio::time::sleep(Duration::ZERO)),
            timeout,
            armed: false,
            done: false,
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn into_inner(self) -> RecvStream<R> {
        self.inner
    }
}

impl<R> Stream for TimedRecvStream<R>
where
    R: AsyncRead,
{
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        if !*this.armed {
            this.delay.as_mut().reset(Instant::now() + *this.timeout);
            *this.armed = true;
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(v) => {
                *this.armed = false;
                if matches!(v, None | Some(Err(_))) {
                    *this.done = true;
                }
                Poll::Ready(v)
            }
            Poll::Pending => match this.delay.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    *this.done = true;
                    crate::log_msg!("recv timed out after {:?}", *this.timeout);
                    Poll::Ready(Some(Err(TimeoutError::Recv(*this.timeout).into())))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// [`DemandRecvStream`] with a fresh deadline for every requested receive.
///
/// Expiry latches the stage: the abandoned receive is never resumed, and
/// later calls keep failing with the same timeout error instead of surfacing
/// bytes that arrived late.
pub struct TimedDemandRecvStream<R> {
    inner: DemandRecvStream<R>,
    timeout: Duration,
    timed_out: bool,
}

impl<R> TimedDemandRecvStream<R> {
    pub fn new(inner: DemandRecvStream<R>, timeout: Duration) -> Self {
        TimedDemandRecvStream {
            inner,
            timeout,
            timed_out: false,
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn into_inner(self) -> DemandRecvStream<R> {
        self.inner
    }
}

impl<R> TimedDemandRecvStream<R>
where
    R: AsyncRead + Unpin,
{
    pub async fn recv(&mut self, max_len: usize) -> Result<Option<Bytes>, StreamError> {
        if self.timed_out {
            return Err(TimeoutError::DemandRecv(self.timeout).into());
        }
        match tokio::time::timeout(self.timeout, self.inner.recv(max_len)).await {
            Ok(r) => r,
            Err(_) => {
                self.timed_out = true;
                crate::log_msg!("demand recv timed out after {:?}", self.timeout);
                Err(TimeoutError::DemandRecv(self.timeout).into())
            }
        }
    }
}

pin_project! {
    /// [`SendSink`] with a fresh deadline for every chunk send.
    ///
    /// The deadline is armed when a chunk is submitted and covers its whole
    /// write-and-flush. Expiry is terminal for the sink; the connection stays
    /// with the caller.
    pub struct TimedSendSink<W> {
        #[pin]
        inner: SendSink<W>,
        delay: Pin<Box<Sleep>>,
        timeout: Duration,
        armed: bool,
        timed_out: bool,
    }
}

impl<W> TimedSendSink<W> {
    pub fn new(inner: SendSink<W>, timeout: Duration) -> Self {
        TimedSendSink {
            inner,
            delay: Box::pin(tokio::time::sleep(Duration::ZERO)),
            timeout,
            armed: false,
            timed_out: false,
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn into_inner(self) -> SendSink<W> {
        self.inner
    }
}

impl<W> TimedSendSink<W>
where
    W: AsyncWrite,
{
    fn poll_send_timed(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), StreamError>> {
        let mut this = self.project();
        if *this.timed_out {
            return Poll::Ready(Err(TimeoutError::Send(*this.timeout).into()));
        }
        match this.inner.as_mut().poll_send_pending(cx) {
            Poll::Ready(r) => {
                *this.armed = false;
                Poll::Ready(r)
            }
            Poll::Pending => {
                if !*this.armed {
                    this.delay.as_mut().reset(Instant::now() + *this.timeout);
                    *this.armed = true;
                }
                match this.delay.as_mut().poll(cx) {
                    Poll::Ready(()) => {
                        *this.timed_out = true;
                        crate::log_msg!("send timed out after {:?}", *this.timeout);
                        Poll::Ready(Err(TimeoutError::Send(*this.timeout).into()))
                    }
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

impl<W> Sink<Bytes> for TimedSendSink<W>
where
    W: AsyncWrite,
{
    type Error = StreamError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.poll_send_timed(cx)
    }

    fn start_send(self: Pin<&mut Self>, chunk: Bytes) -> Result<(), Self::Error> {
        let mut this = self.project();
        if *this.timed_out {
            return Err(TimeoutError::Send(*this.timeout).into());
        }
        this.inner.as_mut().start_send(chunk)?;
        // the deadline for this chunk starts at submission
        this.delay.as_mut().reset(Instant::now() + *this.timeout);
        *this.armed = true;
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.poll_send_timed(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.poll_send_timed(cx)
    }
}

pin_project! {
    /// [`SendStream`] with a fresh deadline for every chunk send.
    ///
    /// Only the send phase is bounded; time spent waiting for upstream to
    /// produce the next chunk does not count against the deadline.
    pub struct TimedSendStream<S, W> {
        #[pin]
        inner: SendStream<S, W>,
        delay: Pin<Box<Sleep>>,
        timeout: Duration,
        armed_seq: Option<u64>,
        done: bool,
    }
}

impl<S, W> TimedSendStream<S, W> {
    pub fn new(inner: SendStream<S, W>, timeout: Duration) -> Self {
        TimedSendStream {
            inner,
            delay: Box::pin(tokio::time::sleep(Duration::ZERO)),
            timeout,
            armed_seq: None,
            done: false,
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn into_inner(self) -> SendStream<S, W> {
        self.inner
    }
}

impl<S, W> Stream for TimedSendStream<S, W>
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
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(v) => {
                *this.armed_seq = None;
                if matches!(v, None | Some(Err(_))) {
                    *this.done = true;
                }
                Poll::Ready(v)
            }
            Poll::Pending => {
                let stage = this.inner.as_ref().get_ref();
                if stage.is_sending() {
                    let seq = stage.sent_chunks();
                    if *this.armed_seq != Some(seq) {
                        this.delay.as_mut().reset(Instant::now() + *this.timeout);
                        *this.armed_seq = Some(seq);
                    }
                    match this.delay.as_mut().poll(cx) {
                        Poll::Ready(()) => {
                            *this.done = true;
                            crate::log_msg!("send timed out after {:?}", *this.timeout);
                            Poll::Ready(Some(Err(TimeoutError::Send(*this.timeout).into())))
                        }
                        Poll::Pending => Poll::Pending,
                    }
                } else {
                    // still waiting on upstream, not on the connection
                    *this.armed_seq = None;
                    Poll::Pending
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt, stream};
    use tokio::io::ReadBuf;

    /// Connection that never delivers or accepts anything.
    struct Stalled;

    impl AsyncRead for Stalled {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for Stalled {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Pending
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recv_deadline_fires() {
        let mut recv = RecvStream::new(Stalled, 4).timed(Duration::from_millis(100));
        let err = recv.next().await.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("100000 microseconds"));
        // terminal afterwards, nothing was emitted for the attempt
        assert!(recv.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn recv_within_deadline_is_transparent() {
        let stream = tokio_test::io::Builder::new()
            .wait(Duration::from_millis(10))
            .read(b"hello")
            .read(b"")
            .build();
        let mut recv = RecvStream::new(stream, 4).timed(Duration::from_secs(1));
        assert_eq!(recv.next().await.unwrap().unwrap().as_ref(), b"hell");
        assert_eq!(recv.next().await.unwrap().unwrap().as_ref(), b"o");
        assert!(recv.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn recv_deadline_is_per_chunk() {
        // two chunks each slower than half the deadline: a cumulative bound
        // would fire, a per-chunk bound must not
        let stream = tokio_test::io::Builder::new()
            .wait(Duration::from_millis(80))
            .read(b"ab")
            .wait(Duration::from_millis(80))
            .read(b"cd")
            .read(b"")
            .build();
        let mut recv = RecvStream::new(stream, 4).timed(Duration::from_millis(100));
        assert_eq!(recv.next().await.unwrap().unwrap().as_ref(), b"ab");
        assert_eq!(recv.next().await.unwrap().unwrap().as_ref(), b"cd");
        assert!(recv.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn demand_recv_deadline_fires_and_latches() {
        let mut recv = DemandRecvStream::new(Stalled).timed(Duration::from_millis(100));
        let err = recv.recv(4).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("100000 microseconds"));
        let err = recv.recv(4).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn demand_recv_within_deadline() {
        let stream = tokio_test::io::Builder::new()
            .wait(Duration::from_millis(10))
            .read(b"abc")
            .read(b"")
            .build();
        let mut recv = DemandRecvStream::new(stream).timed(Duration::from_millis(100));
        assert_eq!(recv.recv(8).await.unwrap().unwrap().as_ref(), b"abc");
        assert!(recv.recv(8).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn send_sink_deadline_fires() {
        let mut sink = SendSink::new(Stalled).timed(Duration::from_millis(100));
        let err = sink.send(Bytes::from_static(b"ab")).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("100000 microseconds"));
        // latched
        let err = sink.flush().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn send_sink_within_deadline() {
        let stream = tokio_test::io::Builder::new()
            .wait(Duration::from_millis(10))
            .write(b"ab")
            .write(b"cd")
            .build();
        let mut sink = SendSink::new(stream).timed(Duration::from_millis(100));
        sink.send(Bytes::from_static(b"ab")).await.unwrap();
        sink.send(Bytes::from_static(b"cd")).await.unwrap();
        sink.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn send_stream_deadline_fires() {
        let upstream = stream::iter(vec![Ok(Bytes::from_static(b"ab"))]);
        let mut send = SendStream::new(upstream, Stalled)
            .with_tee()
            .timed(Duration::from_millis(100));
        let err = send.next().await.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert!(send.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn send_stream_upstream_wait_is_unbounded() {
        let upstream = stream::pending::<Result<Bytes, StreamError>>();
        let mut send = SendStream::new(upstream, Stalled).timed(Duration::from_millis(100));
        // nothing is in flight on the connection, so the send deadline must
        // not fire no matter how long upstream stays silent
        let waited =
            tokio::time::timeout(Duration::from_millis(500), send.next()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn send_stream_within_deadline() {
        let stream = tokio_test::io::Builder::new()
            .write(b"ab")
            .wait(Duration::from_millis(10))
            .write(b"cd")
            .build();
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ]);
        let mut send = SendStream::new(upstream, stream)
            .with_tee()
            .timed(Duration::from_millis(100));
        assert_eq!(send.next().await.unwrap().unwrap().as_ref(), b"ab");
        assert_eq!(send.next().await.unwrap().unwrap().as_ref(), b"cd");
        assert!(send.next().await.is_none());
    }
}
