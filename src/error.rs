// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation was called in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A socket or system call failed, or an expected property was
    /// missing from the daemon's reply.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The Bluetooth daemon reported a failure.
    #[error("Bluetooth daemon error: {0}")]
    Bus(#[source] bluer::Error),

    /// The operation was aborted, either by a disconnect/cancel call
    /// or by a cancellation the daemon reported.
    #[error("{0} cancelled")]
    Cancelled(&'static str),

    /// The system bus session could not be established.
    #[error("Bluetooth service unavailable: {0}")]
    Unavailable(bluer::Error),
}

impl Error {
    /// True for errors caused by a cancellation, whether through an
    /// explicit disconnect/cancel call or reported by the daemon.
    /// Callers use this to map aborted blocking operations onto the
    /// cooperative cancellation mechanism of their own runtime.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

/// The daemon reports cancellations either with a dedicated kind or,
/// for its generic `org.bluez.Error.Canceled` reply, as an unmapped
/// D-Bus error name.
fn is_daemon_cancellation(err: &bluer::Error) -> bool {
    match &err.kind {
        bluer::ErrorKind::AuthenticationCanceled => true,
        bluer::ErrorKind::Internal(bluer::InternalErrorKind::DBus(name)) => {
            name.ends_with(".Canceled") || name.ends_with(".Cancelled")
        }
        _ => false,
    }
}

impl From<bluer::Error> for Error {
    fn from(err: bluer::Error) -> Self {
        if is_daemon_cancellation(&err) {
            Error::Cancelled("Bluetooth operation")
        } else {
            Error::Bus(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_cancelled() {
        assert!(Error::Cancelled("connect").is_cancelled());
        assert!(!Error::InvalidState("already connected").is_cancelled());
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(!io.is_cancelled());
    }

    #[test]
    fn test_display() {
        let err = Error::Cancelled("send");
        assert_eq!(err.to_string(), "send cancelled");
        let err = Error::InvalidArgument("duration out of range".into());
        assert_eq!(err.to_string(), "invalid argument: duration out of range");
    }

    #[test]
    fn test_daemon_cancellation_maps_to_cancelled() {
        let cancelled = bluer::Error {
            kind: bluer::ErrorKind::AuthenticationCanceled,
            message: String::new(),
        };
        assert!(Error::from(cancelled).is_cancelled());

        let dbus_cancelled = bluer::Error {
            kind: bluer::ErrorKind::Internal(bluer::InternalErrorKind::DBus(
                "org.bluez.Error.Canceled".into(),
            )),
            message: String::new(),
        };
        assert!(Error::from(dbus_cancelled).is_cancelled());
    }

    #[test]
    fn test_other_daemon_errors_map_to_bus() {
        let failed = bluer::Error {
            kind: bluer::ErrorKind::Failed,
            message: "went sideways".into(),
        };
        assert!(matches!(Error::from(failed), Error::Bus(_)));

        let unknown = bluer::Error {
            kind: bluer::ErrorKind::Internal(bluer::InternalErrorKind::DBus(
                "org.bluez.Error.NotReady".into(),
            )),
            message: String::new(),
        };
        assert!(matches!(Error::from(unknown), Error::Bus(_)));
    }
}
