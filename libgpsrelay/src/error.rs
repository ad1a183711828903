//! Errors for caller-supplied configuration values.
//!
//! Runtime failures of listeners, sessions and dial attempts are never
//! returned to the caller. They are logged and surface as [`Event`]s only.
//!
//! [`Event`]: crate::event::Event


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid channel {0}, expected -1 (default) or 0 to 255")]
    InvalidChannel(i64),

    #[error("invalid update interval, must be greater than zero")]
    InvalidInterval,

    #[error("invalid peer address '{0}'")]
    InvalidPeer(String),
}
