use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

pub const DEFAULT_APP_NAME: &str = "org.l3reactive.L3Reactive";
pub const DEFAULT_UPLINK_PORT_NAME: &str = "sw1-onos";
pub const GTPU_UDP_PORT: u16 = 2152;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ReactiveConfig {
    pub app_name: String,
    pub controller_ip: IpAddr,
    /// Administrative name of the port leading toward the controller.
    pub uplink_port_name: String,
    pub priorities: PriorityConfig,
    /// 0 = permanent rules.
    pub flow_timeout_secs: u32,
    pub ipv6: bool,
    pub policy: ForwardingPolicy,
    pub processor_priority: u8,
    pub log_level: String,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        ReactiveConfig {
            app_name: DEFAULT_APP_NAME.to_string(),
            controller_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 71, 168)),
            uplink_port_name: DEFAULT_UPLINK_PORT_NAME.to_string(),
            priorities: PriorityConfig::default(),
            flow_timeout_secs: 0,
            ipv6: false,
            policy: ForwardingPolicy::PerFlowRule,
            processor_priority: 2,
            log_level: "info".to_string(),
        }
    }
}

impl ReactiveConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ReactiveConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            error,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<ReactiveConfig, ConfigError> {
        let config: ReactiveConfig = serde_json::from_str(content)?;
        if config.controller_ip.is_unspecified() || config.controller_ip.is_multicast() {
            return Err(ConfigError::InvalidAddress(config.controller_ip.to_string()));
        }
        config.priority_scheme()?;
        Ok(config)
    }

    pub fn priority_scheme(&self) -> Result<PriorityScheme, ConfigError> {
        PriorityScheme::new(&self.priorities)
    }
}

/// Forwarding strategy applied to each IP packet-in.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForwardingPolicy {
    /// Exact src/dst/protocol/in-port rule with an output action.
    PerFlowRule,
    /// Ethernet src/dst/in-port rule below the per-flow tier.
    MacFallback,
    /// Host-to-host intent instead of a raw rule.
    HostIntent,
    /// Per-flow rules plus a queue rule for GTP-U traffic.
    QueueAssignment {
        #[serde(default = "default_queue_id")]
        queue_id: u32,
        #[serde(default = "default_gtpu_port")]
        gtpu_port: u16,
    },
}

fn default_queue_id() -> u32 {
    1
}

fn default_gtpu_port() -> u16 {
    GTPU_UDP_PORT
}

impl Default for ForwardingPolicy {
    fn default() -> Self {
        ForwardingPolicy::PerFlowRule
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(default)]
pub struct PriorityConfig {
    pub reachability: u32,
    pub flow: u32,
    pub mac_fallback_delta: u32,
    pub non_ip: u32,
    pub intent: u32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        PriorityConfig {
            reachability: 10000,
            flow: 5000,
            mac_fallback_delta: 1000,
            non_ip: 500,
            intent: 400,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PriorityTier {
    Intent,
    NonIp,
    MacFallback,
    Flow,
    Reachability,
}

impl PriorityTier {
    pub const ALL: [PriorityTier; 5] = [
        PriorityTier::Intent,
        PriorityTier::NonIp,
        PriorityTier::MacFallback,
        PriorityTier::Flow,
        PriorityTier::Reachability,
    ];
}

/// Rule priorities whose values follow the [PriorityTier] order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PriorityScheme {
    values: [u32; 5],
}

impl PriorityScheme {
    pub fn new(raw: &PriorityConfig) -> Result<PriorityScheme, ConfigError> {
        let mac_fallback = match raw.flow.checked_sub(raw.mac_fallback_delta) {
            Some(v) if raw.mac_fallback_delta > 0 => v,
            _ => {
                return Err(ConfigError::InvalidMacDelta {
                    delta: raw.mac_fallback_delta,
                    flow: raw.flow,
                })
            }
        };
        let values = [
            raw.intent,
            raw.non_ip,
            mac_fallback,
            raw.flow,
            raw.reachability,
        ];
        for (i, pair) in values.windows(2).enumerate() {
            if pair[0] >= pair[1] {
                return Err(ConfigError::PriorityOrder {
                    lower: PriorityTier::ALL[i],
                    lower_value: pair[0],
                    higher: PriorityTier::ALL[i + 1],
                    higher_value: pair[1],
                });
            }
        }
        Ok(PriorityScheme { values })
    }

    pub fn of(&self, tier: PriorityTier) -> u32 {
        self.values[tier as usize]
    }
}

impl Default for PriorityScheme {
    fn default() -> Self {
        PriorityScheme {
            values: [400, 500, 4000, 5000, 10000],
        }
    }
}
