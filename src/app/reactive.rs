use crate::app::bootstrap::Bootstrapper;
use crate::app::processor::{PacketProcessor, ProcessorChain};
use crate::app::resolver::resolve_output_port;
use crate::app::rules::RuleBuilder;
use crate::app::App;
use crate::config::{ForwardingPolicy, PriorityTier, ReactiveConfig};
use crate::error::Result;
use crate::event::PacketContext;
use crate::representation::{ConnectPoint, DeviceID};
use crate::service::{HostToHostIntent, Services};
use crate::util::flow::{AppId, FlowRule, Permanence, PortNumber};
use crate::util::publisher::Subscription;
use crate::util::value::MAC;
use crate::util::FinishSignal;
use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use futures::future::{FutureExt, Shared};
use l3_reactive_packet::packet::{
    Ethernet, Ipv4, Ipv6, Packet, Udp, ETHERNET_TYPE_IPV4, ETHERNET_TYPE_IPV6, IP_PROTOCOL_UDP,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;

/// Header fields the forwarding decision needs, copied out of the frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IpFlow {
    pub src_mac: MAC,
    pub dst_mac: MAC,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: u8,
    pub udp_dst: Option<u16>,
}

impl IpFlow {
    /// `None` for anything that is not IPv4, or IPv6 when `ipv6` is set.
    /// An 802.1Q tag is looked through.
    pub fn parse(frame: &[u8], ipv6: bool) -> Option<IpFlow> {
        let eth = Ethernet::<&[u8]>::from_bytes(frame)?;
        let src_mac = MAC(eth.get_src_mac());
        let dst_mac = MAC(eth.get_dst_mac());
        let (src, dst, protocol, l4, first_fragment) = match eth.ether_type {
            ETHERNET_TYPE_IPV4 => {
                let ip = Ipv4::<&[u8]>::from_bytes(eth.payload)?;
                (
                    IpAddr::V4(ip.src_addr()),
                    IpAddr::V4(ip.dst_addr()),
                    ip.protocol(),
                    ip.payload,
                    ip.frag_offset() == 0,
                )
            }
            ETHERNET_TYPE_IPV6 if ipv6 => {
                let ip = Ipv6::<&[u8]>::from_bytes(eth.payload)?;
                (
                    IpAddr::V6(ip.src_addr()),
                    IpAddr::V6(ip.dst_addr()),
                    ip.next_header(),
                    ip.payload,
                    true,
                )
            }
            _ => return None,
        };
        // Later fragments carry no transport header.
        let udp_dst = if protocol == IP_PROTOCOL_UDP && first_fragment {
            Udp::<()>::from_bytes(l4).map(|udp| udp.dst_port)
        } else {
            None
        };
        Some(IpFlow {
            src_mac,
            dst_mac,
            src,
            dst,
            protocol,
            udp_dst,
        })
    }

    fn family(&self) -> &'static str {
        match self.src {
            IpAddr::V4(_) => "IPv4",
            IpAddr::V6(_) => "IPv6",
        }
    }
}

/// Per-packet forwarding decision. Stateless between packets.
pub struct ReactiveProcessor {
    services: Services,
    rules: RuleBuilder,
    policy: ForwardingPolicy,
    ipv6: bool,
}

impl ReactiveProcessor {
    pub fn new(
        services: Services,
        rules: RuleBuilder,
        policy: ForwardingPolicy,
        ipv6: bool,
    ) -> ReactiveProcessor {
        ReactiveProcessor {
            services,
            rules,
            policy,
            ipv6,
        }
    }

    pub async fn handle_packet(&self, context: &mut PacketContext) {
        let flow = match IpFlow::parse(&context.packet, self.ipv6) {
            Some(flow) => flow,
            None => return,
        };
        let ingress = context.from;
        debug!(
            target: "l3reactive",
            "{} packet-in: {} -> {} proto={} on {}",
            flow.family(),
            flow.src,
            flow.dst,
            flow.protocol,
            ingress.device
        );

        self.install(ingress, &flow).await;

        // The rule is not active yet for the packet already in flight.
        let dst_host = self.services.host.hosts_by_ip(flow.dst).into_iter().next();
        if let Some(host) = dst_host {
            if host.location.device == ingress.device {
                context.set_handled();
                let out = ConnectPoint {
                    device: ingress.device,
                    port: host.location.port,
                };
                if let Err(e) = self.services.packet.emit(out, context.packet.clone()).await {
                    warn!(target: "l3reactive", "Failed to emit packet to {:?}: {}", out, e);
                }
            }
        }
    }

    fn output_port(&self, device: DeviceID, dst_mac: MAC) -> PortNumber {
        resolve_output_port(
            self.services.host.as_ref(),
            self.services.path.as_ref(),
            device,
            dst_mac,
        )
    }

    async fn install(&self, ingress: ConnectPoint, flow: &IpFlow) {
        let device = ingress.device;
        match &self.policy {
            ForwardingPolicy::PerFlowRule => self.install_ip_flow(ingress, flow).await,
            ForwardingPolicy::MacFallback => {
                let out = self.output_port(device, flow.dst_mac);
                let rule =
                    self.rules
                        .mac_flow_rule(device, ingress.port, flow.src_mac, flow.dst_mac, out);
                if self.apply(rule).await {
                    info!(
                        target: "l3reactive",
                        "Installed Eth flow on {}: {} -> {} (inPort={})",
                        device,
                        flow.src_mac,
                        flow.dst_mac,
                        ingress.port
                    );
                }
            }
            ForwardingPolicy::HostIntent => self.submit_intent(flow).await,
            ForwardingPolicy::QueueAssignment {
                queue_id,
                gtpu_port,
            } => {
                self.install_ip_flow(ingress, flow).await;
                if flow.protocol == IP_PROTOCOL_UDP && flow.udp_dst == Some(*gtpu_port) {
                    let rule = self.rules.queue_rule(
                        device,
                        ingress.port,
                        flow.src,
                        flow.dst,
                        *gtpu_port,
                        *queue_id,
                    );
                    if self.apply(rule).await {
                        info!(
                            target: "l3reactive",
                            "Installed GTP-U queue flow ({}) on {}: {} -> {} queue={}",
                            flow.family(),
                            device,
                            flow.src,
                            flow.dst,
                            queue_id
                        );
                    }
                }
            }
        }
    }

    async fn install_ip_flow(&self, ingress: ConnectPoint, flow: &IpFlow) {
        let device = ingress.device;
        let out = self.output_port(device, flow.dst_mac);
        let rule = self
            .rules
            .ip_flow_rule(device, ingress.port, flow.src, flow.dst, flow.protocol, out);
        if self.apply(rule).await {
            info!(
                target: "l3reactive",
                "Installed {} L3 flow on {}: {} -> {} proto={} (inPort={})",
                flow.family(),
                device,
                flow.src,
                flow.dst,
                flow.protocol,
                ingress.port
            );
        }
    }

    async fn submit_intent(&self, flow: &IpFlow) {
        let host = &self.services.host;
        let dst = match host.hosts_by_ip(flow.dst).into_iter().next() {
            Some(h) => h,
            None => {
                debug!(target: "l3reactive", "No destination host found for IP {}", flow.dst);
                return;
            }
        };
        let src = match host.hosts_by_ip(flow.src).into_iter().next() {
            Some(h) => h,
            None => {
                debug!(target: "l3reactive", "No source host found for IP {}, skipping intent", flow.src);
                return;
            }
        };
        let intent = HostToHostIntent {
            app: self.rules.app,
            one: src.id(),
            two: dst.id(),
            priority: self.rules.priorities.of(PriorityTier::Intent),
        };
        match self.services.intent.submit(intent).await {
            Ok(()) => debug!(target: "l3reactive", "Submitted HostToHostIntent {} -> {}", src.id(), dst.id()),
            Err(e) => warn!(target: "l3reactive", "Failed to submit intent: {}", e),
        }
    }

    async fn apply(&self, rule: FlowRule) -> bool {
        let device = rule.device;
        match self.services.flow_rule.apply_flow_rule(rule).await {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "l3reactive", "Failed to apply flow rule on {}: {}", device, e);
                false
            }
        }
    }
}

#[async_trait]
impl PacketProcessor for ReactiveProcessor {
    async fn process(&self, context: &mut PacketContext) {
        if context.is_handled() {
            return;
        }
        self.handle_packet(context).await;
    }
}

/// A running engine. Holds the processor registration and the device
/// subscription; both are released on [L3Reactive::deactivate] or drop.
pub struct L3Reactive {
    app: AppId,
    processor: Arc<ReactiveProcessor>,
    bootstrapper: Arc<Bootstrapper>,
    registrations: Mutex<Vec<Subscription>>,
    finish_signal_sender: AtomicCell<Option<tokio::sync::oneshot::Sender<()>>>,
    finish_signal: Shared<FinishSignal>,
}

impl L3Reactive {
    pub async fn activate(
        config: &ReactiveConfig,
        services: Services,
        chain: &ProcessorChain,
    ) -> Result<L3Reactive> {
        let app = AppId::of(&config.app_name);
        let rules = RuleBuilder::new(
            app,
            config.priority_scheme()?,
            Permanence::from_timeout(config.flow_timeout_secs),
        );
        let queue = match config.policy {
            ForwardingPolicy::QueueAssignment { queue_id, .. } => Some(queue_id),
            _ => None,
        };
        let processor = Arc::new(ReactiveProcessor::new(
            services.clone(),
            rules,
            config.policy.clone(),
            config.ipv6,
        ));
        let bootstrapper = Arc::new(Bootstrapper::new(
            services.clone(),
            rules,
            config.controller_ip,
            config.uplink_port_name.clone(),
            queue,
        ));

        let registrations = vec![
            chain.add(config.processor_priority, Self::Name, processor.clone()),
            services.device.subscribe(bootstrapper.clone()),
        ];

        for device in services.device.devices() {
            bootstrapper.bootstrap(device).await;
        }

        let (sender, receiver) = tokio::sync::oneshot::channel();
        info!(target: "l3reactive", "Started L3Reactive (appId={})", app.0);
        Ok(L3Reactive {
            app,
            processor,
            bootstrapper,
            registrations: Mutex::new(registrations),
            finish_signal_sender: AtomicCell::new(Some(sender)),
            finish_signal: FinishSignal::new(receiver).shared(),
        })
    }

    /// Idempotent.
    pub fn deactivate(&self) {
        if let Some(sender) = self.finish_signal_sender.swap(None) {
            self.registrations.lock().clear();
            let _ = sender.send(());
            info!(target: "l3reactive", "Stopped L3Reactive");
        }
    }

    pub fn app_id(&self) -> AppId {
        self.app
    }

    pub fn processor(&self) -> &ReactiveProcessor {
        &self.processor
    }

    pub fn bootstrapper(&self) -> &Bootstrapper {
        &self.bootstrapper
    }
}

impl Drop for L3Reactive {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[async_trait]
impl App for L3Reactive {
    const Name: &'static str = "L3Reactive";

    async fn run(&self) {
        self.finish_signal.clone().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ether_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        f.extend_from_slice(&ether_type.to_be_bytes());
        f.extend_from_slice(payload);
        f
    }

    fn ipv4(protocol: u8, l4: &[u8]) -> Vec<u8> {
        let mut ip = vec![
            0x45, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x40, protocol, 0x00, 0x00, 10, 0, 0, 1,
            10, 0, 0, 2,
        ];
        ip.extend_from_slice(l4);
        ip
    }

    #[test]
    fn parse_ipv4_udp() {
        let udp = [0x08, 0x68, 0x08, 0x68, 0x00, 0x08, 0x00, 0x00];
        let flow = IpFlow::parse(&frame(0x800, &ipv4(17, &udp)), false).unwrap();
        assert_eq!(flow.src, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(flow.dst, "10.0.0.2".parse::<IpAddr>().unwrap());
        assert_eq!(flow.protocol, 17);
        assert_eq!(flow.udp_dst, Some(2152));
        assert_eq!(flow.dst_mac, "00:00:00:00:00:02".parse::<MAC>().unwrap());
    }

    #[test]
    fn vlan_tagged_ipv4_is_parsed() {
        let mut tagged = vec![0x00, 0x0a, 0x08, 0x00];
        tagged.extend_from_slice(&ipv4(6, &[0u8; 20]));
        let flow = IpFlow::parse(&frame(0x8100, &tagged), false).unwrap();
        assert_eq!(flow.src, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(flow.dst, "10.0.0.2".parse::<IpAddr>().unwrap());
        assert_eq!(flow.protocol, 6);
    }

    #[test]
    fn later_fragment_has_no_udp_port() {
        let udp = [0x08, 0x68, 0x08, 0x68, 0x00, 0x08, 0x00, 0x00];
        let mut ip = ipv4(17, &udp);
        ip[6] = 0x00;
        ip[7] = 0x01;
        let flow = IpFlow::parse(&frame(0x800, &ip), false).unwrap();
        assert_eq!(flow.protocol, 17);
        assert_eq!(flow.udp_dst, None);
    }

    #[test]
    fn tcp_has_no_udp_port() {
        let flow = IpFlow::parse(&frame(0x800, &ipv4(6, &[0u8; 20])), false).unwrap();
        assert_eq!(flow.udp_dst, None);
    }

    #[test]
    fn ipv6_only_when_enabled() {
        let mut ip = vec![0x60, 0, 0, 0, 0, 0, 6, 64];
        ip.extend_from_slice(&"2001:db8::1".parse::<std::net::Ipv6Addr>().unwrap().octets());
        ip.extend_from_slice(&"2001:db8::2".parse::<std::net::Ipv6Addr>().unwrap().octets());
        let f = frame(0x86dd, &ip);
        assert!(IpFlow::parse(&f, false).is_none());
        let flow = IpFlow::parse(&f, true).unwrap();
        assert_eq!(flow.dst, "2001:db8::2".parse::<IpAddr>().unwrap());
        assert_eq!(flow.protocol, 6);
    }

    #[test]
    fn arp_and_garbage_are_ignored() {
        assert!(IpFlow::parse(&frame(0x806, &[0u8; 28]), true).is_none());
        assert!(IpFlow::parse(&[0u8; 6], true).is_none());
        assert!(IpFlow::parse(&frame(0x800, &[0x45, 0x00]), true).is_none());
    }
}
