/*
 * SPDX-License-Identifier: Apache-2.0
 */

use std::sync::Once;

static SETUP_SOCKETS: Once = Once::new();

/// Initialize the platform socket subsystem.
///
/// Call once before the first connection is created. Safe to call more than
/// once and from multiple threads; repeated calls are no-ops. On Unix there
/// is nothing to do. On Windows this forces Winsock startup up front instead
/// of leaving it to the first socket call.
pub fn setup_sockets() {
    SETUP_SOCKETS.call_once(|| {
        #[cfg(windows)]
        {
            // std runs WSAStartup on first socket use, binding a throwaway
            // socket makes that happen here
            let _ = std::net::UdpSocket::bind(("127.0.0.1", 0));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent() {
        setup_sockets();
        setup_sockets();
    }
}
