//! The one exit path for unrecoverable errors.
//!
//! Library code never terminates the process; it returns a [`StoreError`]
//! (or another typed error). `main` hands whatever reaches it to [`die`],
//! which reports it, releases the connection and exits with status 1.
//!
//! [`StoreError`]: crate::StoreError

use anyhow::Error;
use connection::Connection;
use std::io;
use std::process;
use tracing::{error, warn};

/// Logs `err`, closes `conn` if there is one, and returns the diagnostic
/// line that [`die`] prints.
///
/// When an operating-system error is in the chain its kind is attached to
/// the log event.
pub fn report(err: &Error, conn: Option<&mut Connection>) -> String {
    let message = err.to_string();
    match err.chain().find_map(|e| e.downcast_ref::<io::Error>()) {
        Some(os) => error!(kind = ?os.kind(), "{}", message),
        None => error!("{}", message),
    }

    match conn {
        Some(conn) => conn.close(),
        None => warn!("attempted to close the database, but no connection was open"),
    }
    message
}

/// Reports `err`, closes `conn` and exits the process with status 1.
pub fn die(err: Error, conn: Option<&mut Connection>) -> ! {
    let message = report(&err, conn);
    eprintln!("ERROR: {}", message);
    process::exit(1)
}
