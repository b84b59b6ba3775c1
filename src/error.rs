// src/error.rs

use crate::types::InstanceId;

/// Result type used throughout the autoscaler
pub type AutoscalerResult<T> = Result<T, AutoscalerError>;

/// All possible errors that can occur in the autoscaler
#[derive(thiserror::Error, Debug)]
pub enum AutoscalerError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The workload could not be found by the orchestration tool
    #[error("Service '{service}' not found in project '{project}'. Available services:\n  {available}")]
    ServiceNotFound {
        project: String,
        service: String,
        available: String,
    },

    /// Listing or sampling instances failed
    #[error("Failed to sample '{target}': {message}")]
    Sampling { target: String, message: String },

    /// No instance produced a usable CPU or memory reading
    #[error("No valid readings from {instances} sampled instance(s)")]
    NoValidReadings { instances: usize },

    /// An external command exited unsuccessfully
    #[error("Command '{command}' failed with status {status}:\n{output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    /// Neither compose flavour is installed
    #[error("Neither 'docker compose' (v2) nor 'docker-compose' (v1) could be found")]
    ComposeNotFound,

    /// Engine is not running or has stopped
    #[error("Autoscaler engine is not running: {message}")]
    EngineNotRunning { message: String },

    /// Channel communication error (internal)
    #[error("Internal channel error: {message}")]
    ChannelError { message: String },

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed
    #[cfg(feature = "config-toml")]
    #[error("Failed to parse configuration: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },

    /// Docker engine API errors
    #[cfg(feature = "docker")]
    #[error("Docker API error: {source}")]
    Docker {
        #[from]
        source: bollard::errors::Error,
    },
}

/// Helper methods for creating common errors
impl AutoscalerError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn sampling<T: Into<String>, S: Into<String>>(target: T, message: S) -> Self {
        Self::Sampling {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn instance_sampling<S: Into<String>>(instance: &InstanceId, message: S) -> Self {
        Self::sampling(instance.short(), message)
    }

    pub fn no_valid_readings(instances: usize) -> Self {
        Self::NoValidReadings { instances }
    }

    pub fn command_failed<C: Into<String>, S: Into<String>, O: Into<String>>(
        command: C,
        status: S,
        output: O,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            status: status.into(),
            output: output.into(),
        }
    }

    pub fn engine_not_running<S: Into<String>>(message: S) -> Self {
        Self::EngineNotRunning {
            message: message.into(),
        }
    }
}

/// Convert from channel send errors
impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AutoscalerError {
    fn from(error: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ChannelError {
            message: format!("Failed to send on channel: {}", error),
        }
    }
}

/// Convert from channel receive errors
impl From<tokio::sync::oneshot::error::RecvError> for AutoscalerError {
    fn from(error: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelError {
            message: format!("Failed to receive on channel: {}", error),
        }
    }
}
