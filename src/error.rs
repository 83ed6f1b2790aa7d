use crate::config::PriorityTier;
use crate::representation::DeviceID;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device {:?} not connected", device)]
    DeviceNotConnected { device: DeviceID },
    #[error("Device {:?} error: {}", device, error)]
    Other { device: DeviceID, error: String },
}

#[derive(Error, Debug)]
pub enum FlowRuleError {
    #[error("Flow rule rejected by device {:?}: {}", device, reason)]
    Rejected { device: DeviceID, reason: String },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Intent rejected: {}", reason)]
    IntentRejected { reason: String },
    #[error("Failed to add queue {} on device {:?}", queue, device)]
    QueueConfigFailed { device: DeviceID, queue: u32 },
    #[error("Device {:?} does not support {}", device, behaviour)]
    NotSupported {
        device: DeviceID,
        behaviour: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file {} error: {:?}", path, error)]
    Io { path: String, error: std::io::Error },
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(
        "Priority {:?}={} must be strictly lower than {:?}={}",
        lower,
        lower_value,
        higher,
        higher_value
    )]
    PriorityOrder {
        lower: PriorityTier,
        lower_value: u32,
        higher: PriorityTier,
        higher_value: u32,
    },
    #[error("MAC fallback delta {} must be positive and not exceed the flow priority {}", delta, flow)]
    InvalidMacDelta { delta: u32, flow: u32 },
    #[error("Invalid controller address {0}")]
    InvalidAddress(String),
}

#[derive(Error, Debug)]
pub enum ReactiveError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    FlowRule(#[from] FlowRuleError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub type Result<T> = std::result::Result<T, ReactiveError>;
