/*
 * SPDX-License-Identifier: Apache-2.0
 */

mod debug;
pub use debug::{STREAM_DEBUG_LOG_LEVEL, STREAM_DEBUG_LOG_TARGET};

mod error;
pub use error::{StreamError, TimeoutError};

mod init;
pub use init::setup_sockets;

mod io;
pub use io::{AsyncChunkRecvExt, AsyncChunkSendExt, RecvChunk, SendChunk};

mod read;
pub use read::{DemandRecvStream, RecvStream};

mod write;
pub use write::{SendSink, SendStream};

mod timeout;
pub use timeout::{TimedDemandRecvStream, TimedRecvStream, TimedSendSink, TimedSendStream};
