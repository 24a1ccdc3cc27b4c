use crate::link::LinkError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to bus clients. Every failed request maps to exactly one
/// of these; hardware and storage failures are translated at the point of the
/// call and never retried here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid arguments.")]
    InvalidArguments,
    #[error("Adapter is not ready.")]
    NotReady,
    #[error("No such adapter.")]
    NoSuchAdapter,
    #[error("Operation failed with code {}.", code)]
    Failed { code: i32 },
    #[error("Not available.")]
    NotAvailable,
    #[error("Not authorized.")]
    NotAuthorized,
    #[error("Device is not connected.")]
    NotConnected,
    #[error("Discovery is already in progress.")]
    DiscoveryInProgress,
    #[error("A bonding process is already in progress.")]
    BondingInProgress,
    #[error("A bonding already exists for this device.")]
    BondingAlreadyExists,
    #[error("No bonding exists for this device.")]
    BondingDoesNotExist,
    #[error("Unsupported major device class.")]
    UnsupportedMajorClass,
    #[error("Record does not exist.")]
    RecordDoesNotExist,
    #[error("Method not supported.")]
    NotSupported,
    #[error("Connection attempt failed with code {}.", code)]
    ConnectionAttemptFailed { code: i32 },
    #[error("Authentication failed with status {:#04x}.", status)]
    AuthenticationFailed { status: u8 },
    #[error("Authentication was canceled.")]
    AuthenticationCanceled,
}

impl Error {
    pub fn failed(code: i32) -> Error {
        Error::Failed { code }
    }
}

impl From<LinkError> for Error {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::NoDevice => Error::NoSuchAdapter,
            LinkError::Io { code } => Error::Failed { code },
            LinkError::TimedOut => Error::Failed { code: libc::ETIMEDOUT },
            LinkError::Status { status } => Error::Failed {
                code: status as i32,
            },
        }
    }
}
