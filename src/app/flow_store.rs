use crate::error::{DeviceError, FlowRuleError, ServiceError};
use crate::representation::{ConnectPoint, DeviceID, HostId};
use crate::service::{FlowRuleService, HostToHostIntent, IntentService, PacketService};
use crate::util::flow::{FlowRule, FlowRuleKey};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Rule sink keyed by (device, match, priority, owner). Re-applying a rule
/// with the same key replaces the stored one.
#[derive(Default)]
pub struct FlowRuleStore {
    flows: DashMap<FlowRuleKey, FlowRule>,
    disconnected: DashSet<DeviceID>,
}

impl FlowRuleStore {
    pub fn new() -> FlowRuleStore {
        Default::default()
    }

    pub fn set_connected(&self, device: DeviceID, connected: bool) {
        if connected {
            self.disconnected.remove(&device);
        } else {
            self.disconnected.insert(device);
        }
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn rules(&self) -> Vec<FlowRule> {
        let mut rules: Vec<FlowRule> = self.flows.iter().map(|r| r.value().clone()).collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.device.cmp(&b.device)));
        rules
    }

    pub fn rules_of(&self, device: DeviceID) -> Vec<FlowRule> {
        self.rules()
            .into_iter()
            .filter(|r| r.device == device)
            .collect()
    }
}

#[async_trait]
impl FlowRuleService for FlowRuleStore {
    async fn apply_flow_rule(&self, rule: FlowRule) -> Result<(), FlowRuleError> {
        if self.disconnected.contains(&rule.device) {
            warn!(target: "flow_store", "rejecting rule for disconnected device {}", rule.device);
            return Err(DeviceError::DeviceNotConnected {
                device: rule.device,
            }
            .into());
        }
        let key = rule.key();
        if self.flows.insert(key, rule).is_some() {
            debug!(target: "flow_store", "replaced existing rule");
        }
        Ok(())
    }
}

/// Records packet-outs instead of sending them.
#[derive(Default)]
pub struct PacketOutRecorder {
    sent: Mutex<Vec<(ConnectPoint, Bytes)>>,
}

impl PacketOutRecorder {
    pub fn new() -> PacketOutRecorder {
        Default::default()
    }

    pub fn sent(&self) -> Vec<(ConnectPoint, Bytes)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl PacketService for PacketOutRecorder {
    async fn emit(&self, to: ConnectPoint, packet: Bytes) -> Result<(), DeviceError> {
        debug!(target: "flow_store", "packet-out to {:?}, {} bytes", to, packet.len());
        self.sent.lock().push((to, packet));
        Ok(())
    }
}

#[derive(Default)]
pub struct IntentStore {
    intents: DashMap<(HostId, HostId), HostToHostIntent>,
    reject: AtomicBool,
}

impl IntentStore {
    pub fn new() -> IntentStore {
        Default::default()
    }

    /// Makes every later submission fail.
    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn intents(&self) -> Vec<HostToHostIntent> {
        self.intents.iter().map(|i| i.value().clone()).collect()
    }
}

#[async_trait]
impl IntentService for IntentStore {
    async fn submit(&self, intent: HostToHostIntent) -> Result<(), ServiceError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ServiceError::IntentRejected {
                reason: "intent store is read-only".to_string(),
            });
        }
        self.intents.insert((intent.one, intent.two), intent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::flow::{AppId, Criterion, FlowAction, FlowMatch, Permanence, PortNumber};

    fn rule(port: u32, priority: u32) -> FlowRule {
        FlowRule {
            device: DeviceID(1),
            selector: FlowMatch::new().with(Criterion::EthType(0x800)),
            treatment: FlowAction::output(PortNumber::Physical(port)),
            priority,
            app: AppId::of("test"),
            permanence: Permanence::Permanent,
        }
    }

    #[tokio::test]
    async fn same_key_replaces() {
        let store = FlowRuleStore::new();
        store.apply_flow_rule(rule(1, 10)).await.unwrap();
        store.apply_flow_rule(rule(2, 10)).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.rules()[0].treatment.output_port(),
            Some(PortNumber::Physical(2))
        );

        store.apply_flow_rule(rule(2, 20)).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.rules()[0].priority, 20);
    }

    #[tokio::test]
    async fn disconnected_device_rejects() {
        let store = FlowRuleStore::new();
        store.set_connected(DeviceID(1), false);
        let result = store.apply_flow_rule(rule(1, 10)).await;
        assert!(matches!(
            result,
            Err(FlowRuleError::Device(DeviceError::DeviceNotConnected { .. }))
        ));
        assert!(store.is_empty());
    }
}
