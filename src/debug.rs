/*
 * SPDX-License-Identifier: Apache-2.0
 */

use log::Level;

pub const STREAM_DEBUG_LOG_LEVEL: Level = Level::Debug;
pub const STREAM_DEBUG_LOG_TARGET: &str = "";

#[macro_export]
macro_rules! log_msg {
    ($s:literal, $($arg:tt)+) => (
        log::log!(target: $crate::STREAM_DEBUG_LOG_TARGET, $crate::STREAM_DEBUG_LOG_LEVEL, concat!(": ", $s), $($arg)+)
    )
}

#[cfg(feature = "log-raw-io")]
#[inline]
pub(crate) fn log_recv(size: usize) {
    log::log!(
        target: STREAM_DEBUG_LOG_TARGET,
        STREAM_DEBUG_LOG_LEVEL,
        "< {} bytes",
        size
    );
}

#[cfg(feature = "log-raw-io")]
#[inline]
pub(crate) fn log_send(size: usize) {
    log::log!(
        target: STREAM_DEBUG_LOG_TARGET,
        STREAM_DEBUG_LOG_LEVEL,
        "> {} bytes",
        size
    );
}
