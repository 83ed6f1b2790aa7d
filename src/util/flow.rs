use crate::representation::DeviceID;
use crate::util::value::MAC;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt::{Debug, Display, Formatter};
use std::net::IpAddr;

/// Owner of a rule, derived from the registered application name.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct AppId(pub u64);

impl AppId {
    pub fn of(name: &str) -> AppId {
        AppId(crate::util::hash(name))
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum PortNumber {
    Physical(u32),
    /// All ports except the ingress one.
    Flood,
}

impl Debug for PortNumber {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        match self {
            PortNumber::Physical(p) => write!(f, "{}", p),
            PortNumber::Flood => write!(f, "FLOOD"),
        }
    }
}

impl Display for PortNumber {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct IpPrefix {
    pub address: IpAddr,
    pub len: u8,
}

impl IpPrefix {
    /// Full-length prefix: /32 for IPv4, /128 for IPv6.
    pub fn host(address: IpAddr) -> IpPrefix {
        let len = match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        IpPrefix { address, len }
    }
}

impl Display for IpPrefix {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}/{}", self.address, self.len)
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Criterion {
    InPort(u32),
    EthType(u16),
    EthSrc(MAC),
    EthDst(MAC),
    IpSrc(IpPrefix),
    IpDst(IpPrefix),
    IpProtocol(u8),
    UdpDst(u16),
}

impl Criterion {
    fn kind(&self) -> u8 {
        match self {
            Criterion::InPort(_) => 0,
            Criterion::EthType(_) => 1,
            Criterion::EthSrc(_) => 2,
            Criterion::EthDst(_) => 3,
            Criterion::IpSrc(_) => 4,
            Criterion::IpDst(_) => 5,
            Criterion::IpProtocol(_) => 6,
            Criterion::UdpDst(_) => 7,
        }
    }
}

/// Exact-value criteria; an absent field matches anything.
/// Criteria are kept sorted by field so equal matches compare and hash equal
/// regardless of the order they were added in.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FlowMatch {
    criteria: SmallVec<[Criterion; 6]>,
}

impl FlowMatch {
    pub fn new() -> FlowMatch {
        Default::default()
    }

    /// Adds a criterion, replacing any existing one on the same field.
    pub fn with(mut self, criterion: Criterion) -> FlowMatch {
        self.criteria.retain(|c| c.kind() != criterion.kind());
        self.criteria.push(criterion);
        self.criteria.sort_by_key(|c| c.kind());
        self
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn in_port(&self) -> Option<u32> {
        self.criteria.iter().find_map(|c| match c {
            Criterion::InPort(p) => Some(*p),
            _ => None,
        })
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    Output(PortNumber),
    SetQueue(u32),
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FlowAction {
    pub instructions: SmallVec<[Instruction; 2]>,
}

impl FlowAction {
    pub fn output(port: PortNumber) -> FlowAction {
        let mut instructions = SmallVec::new();
        instructions.push(Instruction::Output(port));
        FlowAction { instructions }
    }

    pub fn queue(queue: u32) -> FlowAction {
        let mut instructions = SmallVec::new();
        instructions.push(Instruction::SetQueue(queue));
        FlowAction { instructions }
    }

    pub fn output_port(&self) -> Option<PortNumber> {
        self.instructions.iter().find_map(|i| match i {
            Instruction::Output(p) => Some(*p),
            _ => None,
        })
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Permanence {
    Permanent,
    /// Expiry semantics belong to whoever installs the rule.
    Temporary { timeout: u32 },
}

impl Permanence {
    /// `0` means permanent.
    pub fn from_timeout(secs: u32) -> Permanence {
        if secs > 0 {
            Permanence::Temporary { timeout: secs }
        } else {
            Permanence::Permanent
        }
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FlowRule {
    pub device: DeviceID,
    pub selector: FlowMatch,
    pub treatment: FlowAction,
    pub priority: u32,
    pub app: AppId,
    pub permanence: Permanence,
}

/// Identity under which a sink replaces an existing rule.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct FlowRuleKey {
    pub device: DeviceID,
    pub selector: FlowMatch,
    pub priority: u32,
    pub app: AppId,
}

impl FlowRule {
    pub fn key(&self) -> FlowRuleKey {
        FlowRuleKey {
            device: self.device,
            selector: self.selector.clone(),
            priority: self.priority,
            app: self.app,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn match_is_order_independent() {
        let a = FlowMatch::new()
            .with(Criterion::EthType(0x800))
            .with(Criterion::InPort(3));
        let b = FlowMatch::new()
            .with(Criterion::InPort(3))
            .with(Criterion::EthType(0x800));
        assert_eq!(a, b);
        assert_eq!(crate::util::hash(&a), crate::util::hash(&b));
    }

    #[test]
    fn same_field_is_replaced() {
        let m = FlowMatch::new()
            .with(Criterion::InPort(3))
            .with(Criterion::InPort(4));
        assert_eq!(m.criteria(), &[Criterion::InPort(4)]);
        assert_eq!(m.in_port(), Some(4));
    }

    #[test]
    fn host_prefix_length() {
        let v4 = IpPrefix::host(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(v4.len, 32);
        assert_eq!(v4.to_string(), "10.0.0.1/32");
        let v6 = IpPrefix::host("2001:db8::1".parse().unwrap());
        assert_eq!(v6.len, 128);
    }

    #[test]
    fn zero_timeout_is_permanent() {
        assert_eq!(Permanence::from_timeout(0), Permanence::Permanent);
        assert_eq!(
            Permanence::from_timeout(30),
            Permanence::Temporary { timeout: 30 }
        );
    }
}
