//! Collaborators the engine consumes. The surrounding platform owns topology,
//! host tracking, path computation and rule installation; the engine only
//! reads snapshots through these traits and submits requests.

use crate::error::{DeviceError, FlowRuleError, ServiceError};
use crate::event::DeviceEvent;
use crate::representation::{ConnectPoint, DeviceID, Host, HostId, Path, Port};
use crate::util::flow::{AppId, FlowRule};
use crate::util::publisher::{Handler, Subscription};
use crate::util::value::MAC;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

pub type QueueId = u32;

pub trait DeviceService: Send + Sync {
    fn devices(&self) -> Vec<DeviceID>;

    fn ports_of(&self, device: DeviceID) -> Vec<Port>;

    fn subscribe(&self, handler: Arc<dyn Handler<DeviceEvent>>) -> Subscription;
}

pub trait HostService: Send + Sync {
    fn hosts(&self) -> Vec<Host>;

    fn hosts_by_ip(&self, ip: IpAddr) -> Vec<Host> {
        self.hosts().into_iter().filter(|h| h.has_ip(ip)).collect()
    }

    fn hosts_by_mac(&self, mac: MAC) -> Vec<Host> {
        self.hosts().into_iter().filter(|h| h.mac == mac).collect()
    }
}

pub trait PathService: Send + Sync {
    fn paths(&self, src: DeviceID, dst: DeviceID) -> Vec<Path>;
}

#[async_trait]
pub trait FlowRuleService: Send + Sync {
    /// Adds the rule, or replaces the one with the same device, match,
    /// priority and owner.
    async fn apply_flow_rule(&self, rule: FlowRule) -> Result<(), FlowRuleError>;
}

#[async_trait]
pub trait PacketService: Send + Sync {
    async fn emit(&self, to: ConnectPoint, packet: Bytes) -> Result<(), DeviceError>;
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct HostToHostIntent {
    pub app: AppId,
    pub one: HostId,
    pub two: HostId,
    pub priority: u32,
}

#[async_trait]
pub trait IntentService: Send + Sync {
    async fn submit(&self, intent: HostToHostIntent) -> Result<(), ServiceError>;
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub queue_config: bool,
}

#[async_trait]
pub trait DriverService: Send + Sync {
    /// `None` when no driver handler exists for the device.
    fn capabilities_of(&self, device: DeviceID) -> Option<Capabilities>;

    async fn configure_queue(&self, device: DeviceID, queue: QueueId) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct Services {
    pub device: Arc<dyn DeviceService>,
    pub host: Arc<dyn HostService>,
    pub path: Arc<dyn PathService>,
    pub flow_rule: Arc<dyn FlowRuleService>,
    pub packet: Arc<dyn PacketService>,
    pub intent: Arc<dyn IntentService>,
    pub driver: Arc<dyn DriverService>,
}
