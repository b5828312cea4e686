use mavlink::common::MavMessage;
use tokio::task::JoinError;

/// [Result] alias for return types of the crate API
pub type Result<T> = std::result::Result<T, Error>;

/// Error enum type
#[derive(Debug)]
pub enum Error {
    /// The system address could not be understood. The String contains the address.
    AddressError(String),
    /// The MAVLink connection could not be opened. The String contains the reason.
    ConnectionError(String),
    /// A command was rejected by the vehicle. The String names the command and the result.
    CommandDenied(String),
    /// Mission transfer or mission control error. The String contains the reason.
    MissionError(String),
    /// Parameter error. The String contains the reason.
    ParamError(String),
    /// An argument is out of range or malformed.
    InvalidArgument(String),
    /// The link to the vehicle is closed.
    Disconnected,
    /// Operation timed out waiting for response.
    Timeout,
    /// Error with the async runtime.
    SystemError(String),
    /// A monitored task ended with a failure other than cancellation.
    TaskFailed(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AddressError(address) => write!(f, "invalid system address: {}", address),
            Error::ConnectionError(reason) => write!(f, "connection error: {}", reason),
            Error::CommandDenied(reason) => write!(f, "command denied: {}", reason),
            Error::MissionError(reason) => write!(f, "mission error: {}", reason),
            Error::ParamError(reason) => write!(f, "param error: {}", reason),
            Error::InvalidArgument(reason) => write!(f, "invalid argument: {}", reason),
            Error::Disconnected => write!(f, "vehicle disconnected"),
            Error::Timeout => write!(f, "timed out waiting for the vehicle"),
            Error::SystemError(reason) => write!(f, "system error: {}", reason),
            Error::TaskFailed(reason) => write!(f, "task failed: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl From<JoinError> for Error {
    fn from(error: JoinError) -> Self {
        Self::SystemError(format!("{}", error))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        self::Error::Timeout
    }
}

impl From<flume::RecvError> for Error {
    fn from(_: flume::RecvError) -> Self {
        self::Error::Disconnected
    }
}

impl From<flume::SendError<MavMessage>> for Error {
    fn from(_: flume::SendError<MavMessage>) -> Self {
        self::Error::Disconnected
    }
}
