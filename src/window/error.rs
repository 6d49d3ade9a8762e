use thiserror::Error;
use tracing::warn;
use x11rb::connection::Connection;
use x11rb::cookie::{Cookie, VoidCookie};
use x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::x11_utils::{TryParse, X11Error};

// Core protocol error codes we downgrade: the target window raced away
// between the triggering event and our request.
const BAD_WINDOW: u8 = 3;
const BAD_MATCH: u8 = 8;
const BAD_DRAWABLE: u8 = 9;

/// Classified failure of a protocol operation. Leaf operations only build
/// these; whether one tears the connection down is decided by the dispatch
/// loop via [`WmError::severity`].
#[derive(Debug, Error)]
pub enum WmError {
    #[error("{op}: connection failed while sending: {source}")]
    Send {
        op: &'static str,
        #[source]
        source: ConnectionError,
    },

    #[error("{op}: connection failed while waiting for reply: {source}")]
    Conn {
        op: &'static str,
        #[source]
        source: ConnectionError,
    },

    #[error("{op}: X11 error code {code} (resource {bad_value:#x})")]
    Protocol {
        op: &'static str,
        code: u8,
        bad_value: u32,
    },

    #[error("{op}: failed to allocate resource id: {source}")]
    Id {
        op: &'static str,
        #[source]
        source: ReplyOrIdError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The registry can no longer be trusted to match server state.
    Fatal,
    /// Known-benign: log and keep dispatching.
    Ignorable,
}

impl WmError {
    pub fn send(op: &'static str, source: ConnectionError) -> Self {
        WmError::Send { op, source }
    }

    pub fn reply(op: &'static str, source: ReplyError) -> Self {
        match source {
            ReplyError::ConnectionError(source) => WmError::Conn { op, source },
            ReplyError::X11Error(e) => Self::protocol(op, &e),
        }
    }

    pub fn protocol(op: &'static str, e: &X11Error) -> Self {
        WmError::Protocol { op, code: e.error_code, bad_value: e.bad_value }
    }

    pub fn id(op: &'static str, source: ReplyOrIdError) -> Self {
        match source {
            ReplyOrIdError::ConnectionError(source) => WmError::Conn { op, source },
            ReplyOrIdError::X11Error(e) => Self::protocol(op, &e),
            other => WmError::Id { op, source: other },
        }
    }

    /// Default policy is fatal: a silently failed reparent or configure
    /// leaves the registry inconsistent with the server, which is worse
    /// than exiting cleanly. Operations aimed at a window that has already
    /// been destroyed are the one recoverable case.
    pub fn severity(&self) -> Severity {
        match self {
            WmError::Protocol { code, .. }
                if matches!(*code, BAD_WINDOW | BAD_MATCH | BAD_DRAWABLE) =>
            {
                Severity::Ignorable
            }
            _ => Severity::Fatal,
        }
    }
}

/// Check a fire-and-forget request, folding both failure paths (send error,
/// deferred X11 error) into a classified [`WmError`].
pub fn check_void<C: Connection>(
    cookie: Result<VoidCookie<'_, C>, ConnectionError>,
    op: &'static str,
) -> Result<(), WmError> {
    cookie
        .map_err(|e| WmError::send(op, e))?
        .check()
        .map_err(|e| WmError::reply(op, e))
}

/// Check a query, folding send and reply failures into a classified
/// [`WmError`].
pub fn check_reply<C: Connection, R: TryParse>(
    cookie: Result<Cookie<'_, C, R>, ConnectionError>,
    op: &'static str,
) -> Result<R, WmError> {
    cookie
        .map_err(|e| WmError::send(op, e))?
        .reply()
        .map_err(|e| WmError::reply(op, e))
}

/// Log and swallow errors on cleanup paths where the resource may already
/// be gone.
pub fn log_warn<T, E: std::fmt::Display>(result: Result<T, E>, operation: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Warning in {}: {}", operation, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_window_is_ignorable() {
        let err = WmError::Protocol { op: "configure frame", code: BAD_WINDOW, bad_value: 0x2a };
        assert_eq!(err.severity(), Severity::Ignorable);
    }

    #[test]
    fn bad_access_is_fatal() {
        // BadAccess (10): a second manager is fighting us for the screen.
        let err = WmError::Protocol { op: "grab button", code: 10, bad_value: 0 };
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn connection_errors_are_fatal() {
        let err = WmError::Send {
            op: "map window",
            source: ConnectionError::UnknownError,
        };
        assert_eq!(err.severity(), Severity::Fatal);
    }
}
