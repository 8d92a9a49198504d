use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum MonitorError {
    #[error("Failed to load config from {path}: {reason}")]
    ConfigLoad { path: String, reason: String },

    #[error("No lines configured")]
    NoLinesConfigured,

    #[error("No lines were successfully initialized")]
    NoLinesInitialized,

    #[error("GPIO {pin}: {reason}")]
    Gpio { pin: u32, reason: String },

    #[error("GPIO line is already being watched")]
    AlreadyWatched,

    #[error("Built without hardware-gpio support, use --simulate or rebuild with --features hardware-gpio")]
    GpioUnavailable,

    #[error("Invalid broker address: {0}")]
    InvalidBroker(String),

    #[error("Reporter error: {0}")]
    Reporter(String),

    #[error("MQTT connection timeout")]
    ConnectTimeout,

    #[error(transparent)]
    MqttClient(#[from] rumqttc::ClientError),

    #[error(transparent)]
    InstanceLock(#[from] crate::instance_lock::InstanceLockError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
