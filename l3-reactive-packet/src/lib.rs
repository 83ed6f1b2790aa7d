pub mod packet;

pub use packet::{Ethernet, Ipv4, Ipv6, Packet, Udp};
