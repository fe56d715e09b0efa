/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::io;
use std::time::Duration;

use thiserror::Error;

/// A bounded operation exceeded its per-chunk deadline.
///
/// Each variant names the operation that was in flight and carries the
/// configured deadline. This is distinct from both I/O failure and normal
/// end-of-stream, so callers can apply different recovery policy to each.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("recv timed out after {} microseconds", .0.as_micros())]
    Recv(Duration),
    #[error("demand recv timed out after {} microseconds", .0.as_micros())]
    DemandRecv(Duration),
    #[error("send timed out after {} microseconds", .0.as_micros())]
    Send(Duration),
}

impl TimeoutError {
    pub fn duration(&self) -> Duration {
        match self {
            TimeoutError::Recv(d) => *d,
            TimeoutError::DemandRecv(d) => *d,
            TimeoutError::Send(d) => *d,
        }
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("recv failed: {0:?}")]
    RecvFailed(io::Error),
    #[error("send failed: {0:?}")]
    SendFailed(io::Error),
    #[error("{0}")]
    Timeout(TimeoutError),
}

impl StreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StreamError::Timeout(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, StreamError::RecvFailed(_) | StreamError::SendFailed(_))
    }
}

impl From<TimeoutError> for StreamError {
    fn from(e: TimeoutError) -> Self {
        StreamError::Timeout(e)
    }
}
