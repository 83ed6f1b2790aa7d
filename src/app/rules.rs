use crate::config::{PriorityScheme, PriorityTier};
use crate::representation::DeviceID;
use crate::util::flow::{
    AppId, Criterion, FlowAction, FlowMatch, FlowRule, IpPrefix, Permanence, PortNumber,
};
use crate::util::value::MAC;
use l3_reactive_packet::packet::{ETHERNET_TYPE_IPV4, ETHERNET_TYPE_IPV6, IP_PROTOCOL_UDP};
use std::net::IpAddr;

/// Builds every rule shape the engine installs. Pure: the same inputs always
/// produce the same rule.
#[derive(Copy, Clone, Debug)]
pub struct RuleBuilder {
    pub app: AppId,
    pub priorities: PriorityScheme,
    /// Applied to learned rules; bootstrap and queue rules are always permanent.
    pub permanence: Permanence,
}

fn ether_type_of(ip: IpAddr) -> u16 {
    match ip {
        IpAddr::V4(_) => ETHERNET_TYPE_IPV4,
        IpAddr::V6(_) => ETHERNET_TYPE_IPV6,
    }
}

impl RuleBuilder {
    pub fn new(app: AppId, priorities: PriorityScheme, permanence: Permanence) -> RuleBuilder {
        RuleBuilder {
            app,
            priorities,
            permanence,
        }
    }

    fn rule(
        &self,
        device: DeviceID,
        selector: FlowMatch,
        treatment: FlowAction,
        tier: PriorityTier,
        permanence: Permanence,
    ) -> FlowRule {
        FlowRule {
            device,
            selector,
            treatment,
            priority: self.priorities.of(tier),
            app: self.app,
            permanence,
        }
    }

    fn ip_flow_match(src: IpAddr, dst: IpAddr, protocol: u8, in_port: u32) -> FlowMatch {
        FlowMatch::new()
            .with(Criterion::EthType(ether_type_of(dst)))
            .with(Criterion::IpSrc(IpPrefix::host(src)))
            .with(Criterion::IpDst(IpPrefix::host(dst)))
            .with(Criterion::IpProtocol(protocol))
            .with(Criterion::InPort(in_port))
    }

    /// `{ethType, src/32|128, dst/32|128, proto, inPort} -> output(out)`.
    pub fn ip_flow_rule(
        &self,
        device: DeviceID,
        in_port: u32,
        src: IpAddr,
        dst: IpAddr,
        protocol: u8,
        out: PortNumber,
    ) -> FlowRule {
        self.rule(
            device,
            Self::ip_flow_match(src, dst, protocol, in_port),
            FlowAction::output(out),
            PriorityTier::Flow,
            self.permanence,
        )
    }

    /// `{ethSrc, ethDst, inPort} -> output(out)`, one tier below IP rules.
    pub fn mac_flow_rule(
        &self,
        device: DeviceID,
        in_port: u32,
        src: MAC,
        dst: MAC,
        out: PortNumber,
    ) -> FlowRule {
        let selector = FlowMatch::new()
            .with(Criterion::EthSrc(src))
            .with(Criterion::EthDst(dst))
            .with(Criterion::InPort(in_port));
        self.rule(
            device,
            selector,
            FlowAction::output(out),
            PriorityTier::MacFallback,
            self.permanence,
        )
    }

    /// UDP flow to `udp_dst` assigned to `queue`.
    pub fn queue_rule(
        &self,
        device: DeviceID,
        in_port: u32,
        src: IpAddr,
        dst: IpAddr,
        udp_dst: u16,
        queue: u32,
    ) -> FlowRule {
        let selector =
            Self::ip_flow_match(src, dst, IP_PROTOCOL_UDP, in_port).with(Criterion::UdpDst(udp_dst));
        self.rule(
            device,
            selector,
            FlowAction::queue(queue),
            PriorityTier::Flow,
            Permanence::Permanent,
        )
    }

    /// `{ethType=IPv4, dst=controller/32} -> output(uplink)`.
    pub fn reachability_rule(&self, device: DeviceID, controller: IpAddr, uplink: u32) -> FlowRule {
        let selector = FlowMatch::new()
            .with(Criterion::EthType(ether_type_of(controller)))
            .with(Criterion::IpDst(IpPrefix::host(controller)));
        self.rule(
            device,
            selector,
            FlowAction::output(PortNumber::Physical(uplink)),
            PriorityTier::Reachability,
            Permanence::Permanent,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::flow::Instruction;

    fn builder(permanence: Permanence) -> RuleBuilder {
        RuleBuilder::new(AppId::of("test"), PriorityScheme::default(), permanence)
    }

    #[test]
    fn ipv4_rule_shape() {
        let rule = builder(Permanence::Permanent).ip_flow_rule(
            DeviceID(1),
            3,
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
            6,
            PortNumber::Physical(5),
        );
        let expected = FlowMatch::new()
            .with(Criterion::EthType(0x800))
            .with(Criterion::IpSrc(IpPrefix::host("10.0.0.1".parse().unwrap())))
            .with(Criterion::IpDst(IpPrefix::host("10.0.0.2".parse().unwrap())))
            .with(Criterion::IpProtocol(6))
            .with(Criterion::InPort(3));
        assert_eq!(rule.selector, expected);
        assert_eq!(rule.treatment, FlowAction::output(PortNumber::Physical(5)));
        assert_eq!(rule.priority, 5000);
        assert_eq!(rule.permanence, Permanence::Permanent);
    }

    #[test]
    fn ipv6_rule_uses_full_prefix() {
        let src: IpAddr = "2001:db8::1".parse().unwrap();
        let rule = builder(Permanence::from_timeout(10)).ip_flow_rule(
            DeviceID(1),
            1,
            src,
            "2001:db8::2".parse().unwrap(),
            17,
            PortNumber::Flood,
        );
        assert!(rule.selector.criteria().contains(&Criterion::EthType(0x86dd)));
        assert!(rule
            .selector
            .criteria()
            .contains(&Criterion::IpSrc(IpPrefix { address: src, len: 128 })));
        assert_eq!(rule.permanence, Permanence::Temporary { timeout: 10 });
    }

    #[test]
    fn reachability_outranks_every_learned_rule() {
        let b = builder(Permanence::Permanent);
        let device = DeviceID(1);
        let reach = b.reachability_rule(device, "192.168.71.168".parse().unwrap(), 1);
        let ip = b.ip_flow_rule(
            device,
            1,
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
            6,
            PortNumber::Physical(2),
        );
        let mac = b.mac_flow_rule(device, 1, MAC::zero(), MAC::broadcast(), PortNumber::Flood);
        let queue = b.queue_rule(
            device,
            1,
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
            2152,
            1,
        );
        for learned in &[ip.clone(), mac.clone(), queue] {
            assert!(reach.priority > learned.priority);
        }
        assert!(ip.priority > mac.priority);
        assert_eq!(reach.permanence, Permanence::Permanent);
    }

    #[test]
    fn queue_rule_matches_udp_port_and_sets_queue() {
        let rule = builder(Permanence::from_timeout(5)).queue_rule(
            DeviceID(1),
            1,
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
            2152,
            1,
        );
        assert!(rule.selector.criteria().contains(&Criterion::UdpDst(2152)));
        assert!(rule.selector.criteria().contains(&Criterion::IpProtocol(17)));
        assert_eq!(rule.treatment.instructions.as_slice(), &[Instruction::SetQueue(1)]);
        assert_eq!(rule.permanence, Permanence::Permanent);
    }
}
