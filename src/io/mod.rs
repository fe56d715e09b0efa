/*
 * SPDX-License-Identifier: Apache-2.0
 */

mod recv_chunk;
pub use recv_chunk::RecvChunk;
pub(crate) use recv_chunk::poll_recv_once;

mod send_chunk;
pub use send_chunk::SendChunk;

mod ext;
pub use ext::{AsyncChunkRecvExt, AsyncChunkSendExt};
