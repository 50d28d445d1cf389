//! Service-manager readiness notification
//!
//! Speaks the NOTIFY_SOCKET datagram protocol: the launcher passes the
//! name of a unix datagram socket in the environment and waits for a
//! packet with a "READY=1" line. The protocol comes from systemd but
//! any service launcher can implement it.

use std::env;
use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{SocketAddr, UnixDatagram};

/// Tell the launcher how startup is going. Does nothing when no
/// notification socket was configured; delivery failures are ignored
/// because the launcher may be long gone.
pub fn notify(ready: bool, status: &str) {
    let Ok(path) = env::var("NOTIFY_SOCKET") else {
        return;
    };
    let Ok(sock) = UnixDatagram::unbound() else {
        return;
    };

    let mut message = String::new();
    if ready {
        message.push_str("READY=1\n");
    }
    message.push_str("STATUS=");
    message.push_str(status);
    message.push('\n');

    // A leading '@' means an abstract socket name
    let _ = if let Some(name) = path.strip_prefix('@') {
        SocketAddr::from_abstract_name(name.as_bytes())
            .and_then(|addr| sock.send_to_addr(message.as_bytes(), &addr))
    } else {
        sock.send_to(message.as_bytes(), &path)
    };
}
