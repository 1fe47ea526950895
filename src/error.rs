//! Error taxonomy shared by every subsystem (§7).
//!
//! `AgError` is the single error type returned from the core; narrow
//! external interfaces (the MS RPC client, the specfile XML parser, the
//! HTTP server library) convert their own errors into it at the boundary.

use thiserror::Error;

/// The client-visible outcome of an error, per §7's HTTP-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHint {
    NotFound,
    PermissionDenied,
    BadRequest,
    Redirect,
    TryAgain,
    CoordinatorMismatch,
    NotImplemented,
    Internal,
}

/// The internal handling class, per §7's taxonomy. Determines whether a
/// caller (reversioner, reload loop, HTTP handler) should retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Structural,
    DataIntegrity,
    Resource,
}

#[derive(Debug, Error)]
pub enum AgError {
    #[error("no such path: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotDirectory(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("entry is stale, reversion in progress")]
    TryAgain,

    #[error("certificate for gateway {0} is not yet known")]
    CertUnknown(String),

    #[error("this gateway is not the coordinator for {0}")]
    NotCoordinator(String),

    #[error("operation not implemented by driver")]
    NotImplemented,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("driver worker is dead")]
    WorkerDead,

    #[error("driver worker frame was malformed: {0}")]
    FrameError(String),

    #[error("no driver registered for query type {0}")]
    NoSuchDriver(String),

    #[error("invalid specfile: {0}")]
    InvalidSpecfile(String),

    #[error("ancestor invariant violated at {0}")]
    AncestorInvariant(String),

    #[error("write permission requested on read-only entry: {0}")]
    WritePermission(String),

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("payload hash mismatch")]
    HashMismatch,

    #[error("MS error: {0}")]
    Ms(String),

    #[error("serialization error: {0}")]
    Codec(String),

    #[error("duplicate path in persisted state: {0}")]
    DuplicatePath(String),

    #[error("cache error: {0}")]
    Cache(String),
}

impl AgError {
    pub fn status_hint(&self) -> StatusHint {
        match self {
            AgError::NotFound(_) | AgError::NotDirectory(_) => StatusHint::NotFound,
            AgError::PermissionDenied(_) | AgError::WritePermission(_) => {
                StatusHint::PermissionDenied
            }
            AgError::BadRequest(_) | AgError::InvalidSpecfile(_) => StatusHint::BadRequest,
            AgError::TryAgain | AgError::CertUnknown(_) => StatusHint::TryAgain,
            AgError::NotCoordinator(_) => StatusHint::CoordinatorMismatch,
            AgError::NotImplemented => StatusHint::NotImplemented,
            _ => StatusHint::Internal,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AgError::Ms(_) | AgError::WorkerDead | AgError::CertUnknown(_) | AgError::TryAgain => {
                ErrorClass::Transient
            }
            AgError::InvalidSpecfile(_)
            | AgError::NoSuchDriver(_)
            | AgError::AncestorInvariant(_)
            | AgError::WritePermission(_) => ErrorClass::Structural,
            AgError::VerificationFailed | AgError::HashMismatch => ErrorClass::DataIntegrity,
            AgError::Io(_) | AgError::Cache(_) => ErrorClass::Resource,
            _ => ErrorClass::Resource,
        }
    }
}

pub type AgResult<T> = Result<T, AgError>;
