use crate::representation::{DeviceID, Path};
use crate::service::{HostService, PathService};
use crate::util::flow::PortNumber;
use crate::util::value::MAC;
use log::{debug, warn};

/// One of the available paths; the first one offered wins.
pub fn first_path(paths: &dyn PathService, src: DeviceID, dst: DeviceID) -> Option<Path> {
    paths.paths(src, dst).into_iter().next()
}

/// Source port of the first link leaving `from`.
pub fn egress_port(from: DeviceID, path: &Path) -> Option<u32> {
    path.links
        .iter()
        .find(|l| l.src.device == from)
        .map(|l| l.src.port)
}

/// Decides where a packet for `dst_mac` leaves `ingress`. Every lookup miss
/// degrades to [PortNumber::Flood].
pub fn resolve_output_port(
    hosts: &dyn HostService,
    paths: &dyn PathService,
    ingress: DeviceID,
    dst_mac: MAC,
) -> PortNumber {
    let host = match hosts.hosts_by_mac(dst_mac).into_iter().next() {
        Some(host) => host,
        None => {
            debug!(target: "resolver", "Unknown destination MAC {}, flooding", dst_mac);
            return PortNumber::Flood;
        }
    };

    let location = host.location;
    if location.device == ingress {
        debug!(target: "resolver", "Destination on same device, direct output to port {}", location.port);
        return PortNumber::Physical(location.port);
    }

    let path = match first_path(paths, ingress, location.device) {
        Some(path) if !path.links.is_empty() => path,
        _ => {
            warn!(target: "resolver", "No path found from {} to {}, flooding", ingress, location.device);
            return PortNumber::Flood;
        }
    };

    match egress_port(ingress, &path) {
        Some(port) => PortNumber::Physical(port),
        None => {
            warn!(target: "resolver", "Cannot determine next hop port, flooding");
            PortNumber::Flood
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representation::{ConnectPoint, Host, Link};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Hosts(Vec<Host>);

    impl HostService for Hosts {
        fn hosts(&self) -> Vec<Host> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct Paths {
        offered: Vec<Path>,
        queries: AtomicUsize,
    }

    impl PathService for Paths {
        fn paths(&self, _src: DeviceID, _dst: DeviceID) -> Vec<Path> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.offered.clone()
        }
    }

    fn cp(device: u64, port: u32) -> ConnectPoint {
        ConnectPoint {
            device: DeviceID(device),
            port,
        }
    }

    fn host(mac: &str, location: ConnectPoint) -> Host {
        Host {
            mac: mac.parse().unwrap(),
            ips: vec![],
            location,
        }
    }

    fn path(links: &[(ConnectPoint, ConnectPoint)]) -> Path {
        Path {
            links: links.iter().map(|(src, dst)| Link { src: *src, dst: *dst }).collect(),
            weight: links.len() as u32,
        }
    }

    #[test]
    fn egress_port_scans_for_source_device() {
        let p = path(&[(cp(2, 9), cp(3, 1)), (cp(1, 7), cp(2, 3))]);
        assert_eq!(egress_port(DeviceID(1), &p), Some(7));
        assert_eq!(egress_port(DeviceID(4), &p), None);
    }

    #[test]
    fn first_path_takes_first_offered() {
        let paths = Paths {
            offered: vec![path(&[(cp(1, 7), cp(2, 3))]), path(&[(cp(1, 8), cp(2, 4))])],
            ..Default::default()
        };
        let chosen = first_path(&paths, DeviceID(1), DeviceID(2)).unwrap();
        assert_eq!(egress_port(DeviceID(1), &chosen), Some(7));
        assert!(first_path(&Paths::default(), DeviceID(1), DeviceID(2)).is_none());
    }

    #[test]
    fn empty_path_floods() {
        let hosts = Hosts(vec![host("00:00:00:00:00:02", cp(2, 2))]);
        let paths = Paths {
            offered: vec![path(&[])],
            ..Default::default()
        };
        let port = resolve_output_port(&hosts, &paths, DeviceID(1), "00:00:00:00:00:02".parse().unwrap());
        assert_eq!(port, PortNumber::Flood);
    }

    #[test]
    fn path_not_leaving_ingress_floods() {
        let hosts = Hosts(vec![host("00:00:00:00:00:02", cp(2, 2))]);
        let paths = Paths {
            offered: vec![path(&[(cp(5, 1), cp(2, 3))])],
            ..Default::default()
        };
        let port = resolve_output_port(&hosts, &paths, DeviceID(1), "00:00:00:00:00:02".parse().unwrap());
        assert_eq!(port, PortNumber::Flood);
    }

    #[test]
    fn same_switch_skips_path_query() {
        let hosts = Hosts(vec![host("aa:bb:00:00:00:01", cp(1, 4))]);
        let paths = Paths::default();
        let port = resolve_output_port(&hosts, &paths, DeviceID(1), "aa:bb:00:00:00:01".parse().unwrap());
        assert_eq!(port, PortNumber::Physical(4));
        assert_eq!(paths.queries.load(Ordering::SeqCst), 0);
    }
}
