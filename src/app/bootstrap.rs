use crate::app::rules::RuleBuilder;
use crate::event::DeviceEvent;
use crate::representation::DeviceID;
use crate::service::{QueueId, Services};
use crate::util::flow::FlowRule;
use crate::util::publisher::Handler;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::net::IpAddr;

/// Installs the controller-reachability rule on switches as they become known,
/// optionally configuring the GTP-U queue first.
///
/// Holds no state between invocations, so bootstrapping a switch again simply
/// re-submits an identical rule.
pub struct Bootstrapper {
    services: Services,
    rules: RuleBuilder,
    controller_ip: IpAddr,
    uplink_port_name: String,
    queue: Option<QueueId>,
}

impl Bootstrapper {
    pub fn new(
        services: Services,
        rules: RuleBuilder,
        controller_ip: IpAddr,
        uplink_port_name: String,
        queue: Option<QueueId>,
    ) -> Bootstrapper {
        Bootstrapper {
            services,
            rules,
            controller_ip,
            uplink_port_name,
            queue,
        }
    }

    /// Returns the reachability rule when one was accepted by the sink.
    pub async fn bootstrap(&self, device: DeviceID) -> Option<FlowRule> {
        let rule = self.install_reachability(device).await;
        if let Some(queue) = self.queue {
            self.configure_queue(device, queue).await;
        }
        rule
    }

    pub async fn install_reachability(&self, device: DeviceID) -> Option<FlowRule> {
        let controller = match self
            .services
            .host
            .hosts_by_ip(self.controller_ip)
            .into_iter()
            .next()
        {
            Some(host) => host,
            None => {
                warn!(target: "bootstrap", "Controller host {} not found in topology", self.controller_ip);
                return None;
            }
        };

        // Only the switch the controller hangs off gets a rule.
        if controller.location.device != device {
            debug!(
                target: "bootstrap",
                "Controller is reachable via another device {}, no reachability rule on {}",
                controller.location.device,
                device
            );
            return None;
        }

        let uplink = match self
            .services
            .device
            .ports_of(device)
            .into_iter()
            .find(|p| p.name == self.uplink_port_name)
        {
            Some(port) => port.number,
            None => {
                warn!(
                    target: "bootstrap",
                    "Uplink port {} not found on device {}",
                    self.uplink_port_name,
                    device
                );
                return None;
            }
        };

        let rule = self.rules.reachability_rule(device, self.controller_ip, uplink);
        match self.services.flow_rule.apply_flow_rule(rule.clone()).await {
            Ok(()) => {
                info!(
                    target: "bootstrap",
                    "Installed controller reachability flow on {} via port {}",
                    device,
                    uplink
                );
                Some(rule)
            }
            Err(e) => {
                warn!(target: "bootstrap", "Failed to install reachability flow on {}: {}", device, e);
                None
            }
        }
    }

    /// Never fails the caller; every miss is logged and skipped.
    pub async fn configure_queue(&self, device: DeviceID, queue: QueueId) -> bool {
        let capabilities = match self.services.driver.capabilities_of(device) {
            Some(c) => c,
            None => {
                warn!(target: "bootstrap", "No driver handler for device {}", device);
                return false;
            }
        };
        if !capabilities.queue_config {
            warn!(target: "bootstrap", "Device {} does not support QueueConfigBehaviour", device);
            return false;
        }
        match self.services.driver.configure_queue(device, queue).await {
            Ok(()) => {
                info!(target: "bootstrap", "Configured queue on device {}", device);
                true
            }
            Err(e) => {
                warn!(target: "bootstrap", "Failed to add queue on device {}: {}", device, e);
                false
            }
        }
    }
}

#[async_trait]
impl Handler<DeviceEvent> for Bootstrapper {
    async fn handle(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::DeviceAdded(device) => {
                info!(target: "bootstrap", "Device connected: {}", device);
                self.bootstrap(device).await;
            }
            DeviceEvent::DeviceRemoved(device) => {
                debug!(target: "bootstrap", "ignoring removal of {}", device);
            }
        }
    }
}
