use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ThresholdsError {
    #[error("Thresholds must satisfy s_minus_minus < s_minus < s_plus < s_plus_plus")]
    InvalidThresholds,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Already configured: {0}")]
    AlreadyConfigured(String),

    #[error("Setup entry does not exist yet")]
    NotSetUp,

    #[error("Setup entry has no options")]
    NoOptions,

    #[error("Config entry not found: {0}")]
    EntryNotFound(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("MQTT connection not established: {0}")]
    MqttConnection(String),

    #[error(transparent)]
    MqttClientError(#[from] rumqttc::ClientError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ThresholdsError>;
