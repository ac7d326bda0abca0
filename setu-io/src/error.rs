//! Error types for SetuIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes, one per session-fatal failure class
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const USAGE: i32 = 1;
    pub const DRIVER_ALLOCATION: i32 = 2;
    pub const CONNECT: i32 = 3;
    pub const HEALTH: i32 = 4;
    pub const SEND_INIT: i32 = 5;
    pub const CONFIG: i32 = 6;
    pub const RUNTIME: i32 = 7;
}

/// SetuIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed command line
    #[error("Usage error: {0}")]
    Usage(String),

    /// Driver could not be created for the configured device type
    #[error("Unknown device driver: {0}")]
    UnknownDevice(String),

    /// No channel could be connected
    #[error("Cannot connect to lidar on {0}")]
    Connect(String),

    /// Device identity query failed after connect
    #[error("Device query failed: {0}")]
    DeviceQuery(String),

    /// Device reported an internal error
    #[error("Lidar internal error detected (code {0:#06x}), reboot the device to retry")]
    Health(u16),

    /// Datagram sender could not be initialized
    #[error("Failed to initialize UDP sender: {0}")]
    SendInit(String),

    /// Scan acquisition failed (transient)
    #[error("Scan acquisition failed: {0}")]
    Acquire(String),

    /// Datagram transmit failed (transient)
    #[error("UDP send failed: {0}")]
    Send(String),

    /// Datagram sender used before `init()` or after `close()`
    #[error("UDP sender not initialized")]
    NotInitialized,

    /// Driver used without a connected channel
    #[error("Lidar not connected")]
    NotConnected,

    /// Communication timeout
    #[error("Communication timeout")]
    Timeout,

    /// Invalid packet or response
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation not supported
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map a session-fatal error to the process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) => exit_code::USAGE,
            Error::UnknownDevice(_) => exit_code::DRIVER_ALLOCATION,
            Error::Connect(_) | Error::DeviceQuery(_) => exit_code::CONNECT,
            Error::Health(_) => exit_code::HEALTH,
            Error::SendInit(_) => exit_code::SEND_INIT,
            Error::Config(_) | Error::Toml(_) => exit_code::CONFIG,
            _ => exit_code::RUNTIME,
        }
    }

    /// Transient errors are logged by the acquisition loop and never end the session
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Acquire(_)
                | Error::Timeout
                | Error::InvalidPacket(_)
                | Error::Send(_)
                | Error::NotInitialized
        )
    }
}
