use crate::representation::{ConnectPoint, DeviceID};
use bytes::Bytes;

/// An unmatched packet handed to the processor chain.
#[derive(Debug, Clone)]
pub struct PacketContext {
    pub packet: Bytes,
    pub from: ConnectPoint,
    handled: bool,
}

impl PacketContext {
    pub fn new(packet: Bytes, from: ConnectPoint) -> PacketContext {
        PacketContext {
            packet,
            from,
            handled: false,
        }
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Marks the packet as consumed for lower-priority processors.
    pub fn set_handled(&mut self) {
        self.handled = true;
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeviceEvent {
    DeviceAdded(DeviceID),
    DeviceRemoved(DeviceID),
}
