//! Shared test helpers.

use std::net::TcpListener;

/// An address nothing listens on, for connection-refused cases.
pub(crate) fn unused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
