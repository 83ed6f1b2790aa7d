use anyhow::{anyhow, Context as _};
use bytes::Bytes;
use l3_reactive::app::common::CommonState;
use l3_reactive::app::flow_store::{FlowRuleStore, IntentStore, PacketOutRecorder};
use l3_reactive::app::processor::ProcessorChain;
use l3_reactive::app::App;
use l3_reactive::event::PacketContext;
use l3_reactive::representation::{ConnectPoint, Device, DeviceID, Host, Link, Port};
use l3_reactive::service::{Capabilities, Services};
use l3_reactive::util::value::MAC;
use l3_reactive::{L3Reactive, ReactiveConfig};
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "l3reactive", about = "replay packet-ins through the reactive L3 engine")]
struct Opt {
    /// Engine configuration (JSON).
    #[structopt(parse(from_os_str))]
    config: PathBuf,
    /// Devices, links, hosts and driver capabilities (JSON).
    #[structopt(parse(from_os_str))]
    topology: PathBuf,
    /// Packet-ins to replay (JSON list of location + hex frame).
    #[structopt(parse(from_os_str))]
    packets: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
struct Topology {
    devices: Vec<TopologyDevice>,
    #[serde(default)]
    links: Vec<TopologyLink>,
    #[serde(default)]
    hosts: Vec<TopologyHost>,
    #[serde(default)]
    capabilities: HashMap<String, Capabilities>,
}

#[derive(Deserialize, Debug)]
struct TopologyDevice {
    name: String,
    #[serde(default)]
    ports: Vec<Port>,
}

#[derive(Deserialize, Debug)]
struct Endpoint {
    device: String,
    port: u32,
}

impl Endpoint {
    fn connect_point(&self) -> ConnectPoint {
        ConnectPoint {
            device: DeviceID::of(&self.device),
            port: self.port,
        }
    }
}

#[derive(Deserialize, Debug)]
struct TopologyLink {
    src: Endpoint,
    dst: Endpoint,
    #[serde(default = "default_cost")]
    cost: u32,
}

fn default_cost() -> u32 {
    1
}

#[derive(Deserialize, Debug)]
struct TopologyHost {
    mac: MAC,
    #[serde(default)]
    ips: Vec<IpAddr>,
    location: Endpoint,
}

#[derive(Deserialize, Debug)]
struct PacketIn {
    location: Endpoint,
    /// Hex-encoded Ethernet frame.
    frame: String,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Hosts and capabilities go in before devices so that join bootstrap
/// sees them.
async fn load_topology(state: &CommonState, topology: Topology) {
    for h in topology.hosts {
        state.add_host(Host {
            mac: h.mac,
            ips: h.ips,
            location: h.location.connect_point(),
        });
    }
    for (name, capabilities) in topology.capabilities {
        state.set_capabilities(DeviceID::of(&name), capabilities);
    }
    for d in topology.devices {
        let mut device = Device::new(&d.name);
        device.ports = d.ports;
        state.add_device(device).await;
    }
    for l in topology.links {
        let (src, dst) = (l.src.connect_point(), l.dst.connect_point());
        state.add_link(Link { src, dst }, l.cost);
        state.add_link(Link { src: dst, dst: src }, l.cost);
    }
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    let config = ReactiveConfig::from_file(&opt.config)?;
    flexi_logger::Logger::with_str(&config.log_level)
        .start()
        .map_err(|e| anyhow!("logger init failed: {}", e))?;

    let state = CommonState::new();
    let flows = Arc::new(FlowRuleStore::new());
    let packets = Arc::new(PacketOutRecorder::new());
    let intents = Arc::new(IntentStore::new());
    let services = Services {
        device: Arc::new(state.clone()),
        host: Arc::new(state.clone()),
        path: Arc::new(state.clone()),
        flow_rule: flows.clone(),
        packet: packets.clone(),
        intent: intents.clone(),
        driver: Arc::new(state.clone()),
    };

    let topology: Topology = read_json(&opt.topology)?;
    let chain = ProcessorChain::new();
    let app = Arc::new(L3Reactive::activate(&config, services, &chain).await?);
    load_topology(&state, topology).await;

    if let Some(path) = &opt.packets {
        let packet_ins: Vec<PacketIn> = read_json(path)?;
        for p in packet_ins {
            let frame = hex::decode(&p.frame).with_context(|| format!("bad frame {}", p.frame))?;
            let context = PacketContext::new(Bytes::from(frame), p.location.connect_point());
            let context = chain.process(context).await;
            info!(target: "l3reactive", "packet-in at {:?} handled={}", context.from, context.is_handled());
        }
    }

    println!("{}", serde_json::to_string_pretty(&flows.rules())?);
    for (to, packet) in packets.sent() {
        println!("packet-out {:?}: {} bytes", to, packet.len());
    }
    for intent in intents.intents() {
        println!("intent {} -> {} priority={}", intent.one, intent.two, intent.priority);
    }

    let runner = app.clone();
    let running = tokio::spawn(async move { runner.run().await });
    app.deactivate();
    running.await?;
    Ok(())
}
