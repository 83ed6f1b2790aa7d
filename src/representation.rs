use crate::util::value::MAC;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::net::IpAddr;

#[derive(Hash, Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Ord, PartialOrd)]
pub struct DeviceID(pub u64);

impl DeviceID {
    pub fn of(name: &str) -> DeviceID {
        DeviceID(crate::util::hash(name))
    }
}

impl Display for DeviceID {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceID,
    pub name: String,
    pub ports: Vec<Port>,
}

impl Device {
    pub fn new(name: &str) -> Device {
        Device {
            id: DeviceID::of(name),
            name: name.to_string(),
            ports: Vec::new(),
        }
    }

    pub fn with_port(mut self, name: &str, number: u32) -> Device {
        self.ports.push(Port {
            name: name.to_string(),
            number,
        });
        self
    }
}

#[derive(Eq, PartialEq, Hash, Clone, Debug, Serialize, Deserialize)]
pub struct Port {
    /// Administrative name, e.g. `sw1-eth1`.
    pub name: String,
    pub number: u32,
}

#[derive(Eq, Hash, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectPoint {
    pub device: DeviceID,
    pub port: u32,
}

impl Debug for ConnectPoint {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{:?}[{}]", self.device, self.port)
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct HostId(pub MAC);

impl Display for HostId {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub mac: MAC,
    #[serde(default)]
    pub ips: Vec<IpAddr>,
    pub location: ConnectPoint,
}

impl Host {
    pub fn id(&self) -> HostId {
        HostId(self.mac)
    }

    pub fn has_ip(&self, ip: IpAddr) -> bool {
        self.ips.contains(&ip)
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
}

impl Debug for Link {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{:?}->{:?}", self.src, self.dst)
    }
}

/// Transient answer to a path query, never stored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Path {
    pub links: Vec<Link>,
    pub weight: u32,
}
