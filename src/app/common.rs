use crate::app::graph::DefaultGraph;
use crate::error::ServiceError;
use crate::event::DeviceEvent;
use crate::representation::{Device, DeviceID, Host, Link, Path, Port};
use crate::service::{
    Capabilities, DeviceService, DriverService, HostService, PathService, QueueId,
};
use crate::util::publisher::{Handler, Publisher, Subscription};
use crate::util::value::MAC;
use async_trait::async_trait;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// In-memory topology and host oracle.
#[derive(Clone)]
pub struct CommonState {
    pub inner: Arc<Mutex<CommonStateInner>>,
    events: Arc<Publisher<DeviceEvent>>,
}

#[derive(Default)]
pub struct CommonStateInner {
    pub devices: BTreeMap<DeviceID, Device>,
    pub hosts: BTreeMap<MAC, Host>,
    pub graph: DefaultGraph,
    pub links: HashSet<Link>,
    pub capabilities: HashMap<DeviceID, Capabilities>,
    pub queues: HashSet<(DeviceID, QueueId)>,
}

impl CommonState {
    pub fn new() -> CommonState {
        CommonState {
            inner: Arc::new(Mutex::new(CommonStateInner::default())),
            events: Arc::new(Publisher::default()),
        }
    }

    /// Merges the device and announces it when it is new.
    pub async fn add_device(&self, device: Device) -> MergeResult<DeviceID> {
        let result = self.inner.lock().merge_device(&device);
        if let MergeResult::ADDED(id) = result {
            info!(target: "topology", "device added {} ({})", device.name, id);
            self.events.emit(DeviceEvent::DeviceAdded(id)).await;
        }
        result
    }

    pub async fn remove_device(&self, device: DeviceID) -> bool {
        let removed = self.inner.lock().remove_device(device);
        if removed {
            info!(target: "topology", "device removed {}", device);
            self.events.emit(DeviceEvent::DeviceRemoved(device)).await;
        } else {
            warn!(target: "topology", "duplicated device lost event {}", device);
        }
        removed
    }

    pub fn add_host(&self, host: Host) -> MergeResult<Host> {
        self.inner.lock().merge_host(&host)
    }

    /// Replaces the host record wholesale, e.g. after it moved.
    pub fn update_host(&self, host: Host) {
        self.inner.lock().hosts.insert(host.mac, host);
    }

    pub fn remove_host(&self, mac: MAC) -> Option<Host> {
        self.inner.lock().hosts.remove(&mac)
    }

    pub fn add_link(&self, link: Link, cost: u32) -> MergeResult<()> {
        self.inner.lock().add_link(link, cost)
    }

    pub fn remove_link(&self, link: &Link) -> bool {
        let mut inner = self.inner.lock();
        if inner.links.remove(link) {
            inner.graph.remove_link(link);
            true
        } else {
            false
        }
    }

    pub fn set_capabilities(&self, device: DeviceID, capabilities: Capabilities) {
        self.inner.lock().capabilities.insert(device, capabilities);
    }

    pub fn configured_queues(&self) -> HashSet<(DeviceID, QueueId)> {
        self.inner.lock().queues.clone()
    }
}

impl Default for CommonState {
    fn default() -> Self {
        Self::new()
    }
}

impl CommonStateInner {
    pub fn merge_device(&mut self, info: &Device) -> MergeResult<DeviceID> {
        let id = info.id;
        if let Some(pre) = self.devices.get_mut(&id) {
            // merge ports
            for port in &info.ports {
                if !pre.ports.contains(port) {
                    pre.ports.push(port.clone());
                }
            }
            MergeResult::MERGED
        } else {
            self.graph.add_device(id);
            self.devices.insert(id, info.clone());
            MergeResult::ADDED(id)
        }
    }

    pub fn remove_device(&mut self, device: DeviceID) -> bool {
        if self.devices.remove(&device).is_none() {
            return false;
        }
        self.graph.remove_device(&device);
        self.links
            .retain(|l| l.src.device != device && l.dst.device != device);
        self.capabilities.remove(&device);
        true
    }

    pub fn merge_host(&mut self, info: &Host) -> MergeResult<Host> {
        if let Some(other) = self.hosts.get_mut(&info.mac) {
            if other.location != info.location {
                MergeResult::CONFLICT
            } else {
                for ip in &info.ips {
                    if !other.ips.contains(ip) {
                        other.ips.push(*ip);
                    }
                }
                MergeResult::MERGED
            }
        } else {
            self.hosts.insert(info.mac, info.clone());
            MergeResult::ADDED(info.clone())
        }
    }

    pub fn add_link(&mut self, link: Link, cost: u32) -> MergeResult<()> {
        let result = self.graph.add_link(&link, cost);
        if let MergeResult::ADDED(()) = result {
            self.links.insert(link);
        }
        result
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum MergeResult<T> {
    ADDED(T),
    MERGED,
    CONFLICT,
}

impl DeviceService for CommonState {
    fn devices(&self) -> Vec<DeviceID> {
        self.inner.lock().devices.keys().copied().collect()
    }

    fn ports_of(&self, device: DeviceID) -> Vec<Port> {
        self.inner
            .lock()
            .devices
            .get(&device)
            .map(|d| d.ports.clone())
            .unwrap_or_default()
    }

    fn subscribe(&self, handler: Arc<dyn Handler<DeviceEvent>>) -> Subscription {
        self.events.subscribe(handler)
    }
}

impl HostService for CommonState {
    fn hosts(&self) -> Vec<Host> {
        self.inner.lock().hosts.values().cloned().collect()
    }

    fn hosts_by_mac(&self, mac: MAC) -> Vec<Host> {
        self.inner.lock().hosts.get(&mac).cloned().into_iter().collect()
    }
}

impl PathService for CommonState {
    fn paths(&self, src: DeviceID, dst: DeviceID) -> Vec<Path> {
        self.inner.lock().graph.get_path(src, dst).into_iter().collect()
    }
}

#[async_trait]
impl DriverService for CommonState {
    fn capabilities_of(&self, device: DeviceID) -> Option<Capabilities> {
        self.inner.lock().capabilities.get(&device).copied()
    }

    async fn configure_queue(&self, device: DeviceID, queue: QueueId) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock();
        match inner.capabilities.get(&device) {
            Some(c) if c.queue_config => {
                inner.queues.insert((device, queue));
                Ok(())
            }
            _ => Err(ServiceError::NotSupported {
                device,
                behaviour: "QueueConfigBehaviour",
            }),
        }
    }
}
