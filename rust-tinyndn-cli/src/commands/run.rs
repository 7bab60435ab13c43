//! UDP forwarder node
//!
//! Hosts a [`Forwarder`] on a single UDP socket. Each configured peer
//! becomes a face; datagrams from unknown peers get a face on first contact,
//! reclaimed from the least recently heard such peer once the table is full.
//! The forwarder's alarm is backed by the host monotonic clock and polled
//! from the same task that reads the socket, so the forwarder is never
//! entered concurrently.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rust_tinyndn_common::{Data, Error, FaceId, FaceType, Name};
use rust_tinyndn_fwd::mempool::MemoryPool;
use rust_tinyndn_fwd::{Alarm, Face, Forwarder, ForwarderConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

/// Default NDN UDP port.
const DEFAULT_LISTEN: &str = "0.0.0.0:6363";

/// Idle wake-up when no timer is armed.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Node configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address to listen on
    pub listen: String,

    /// Forwarder table sizes and policy
    pub forwarder: ForwarderConfig,

    /// Statically configured UDP peers
    pub faces: Vec<FaceConfig>,

    /// Routes over the configured peers
    pub routes: Vec<RouteConfig>,

    /// Prefixes answered by this node
    pub serve: Vec<ServeConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            forwarder: ForwarderConfig::default(),
            faces: Vec::new(),
            routes: Vec::new(),
            serve: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceConfig {
    /// Label used by routes
    pub name: String,

    /// Peer address
    pub remote: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,
    pub face: String,
    #[serde(default)]
    pub cost: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    pub prefix: String,
    pub content: String,
    #[serde(default)]
    pub freshness_ms: Option<u64>,
}

/// Load the node configuration from `path` (if any) and `TINYNDN__*` variables.
pub fn load_config(path: Option<&PathBuf>) -> Result<NodeConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("TINYNDN")
            .separator("__")
            .try_parsing(true),
    );

    let node: NodeConfig = builder
        .build()
        .context("Failed to read node configuration")?
        .try_deserialize()
        .context("Invalid node configuration")?;
    node.forwarder.validate()?;
    Ok(node)
}

/// Alarm backed by the host monotonic clock.
#[derive(Debug)]
pub struct MonotonicAlarm {
    epoch: Instant,
    deadline: Option<Instant>,
}

impl MonotonicAlarm {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            deadline: None,
        }
    }

    /// When the alarm is armed to go off.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for MonotonicAlarm {
    fn default() -> Self {
        Self::new()
    }
}

impl Alarm for MonotonicAlarm {
    fn start(&mut self, now: u32, delta: u32) {
        let elapsed = self.now().wrapping_sub(now);
        let remaining = delta.saturating_sub(elapsed);
        self.deadline = Some(Instant::now() + Duration::from_millis(u64::from(remaining)));
    }

    fn stop(&mut self) {
        self.deadline = None;
    }

    fn now(&self) -> u32 {
        // Ticks wrap at u32, as the scheduler expects.
        self.epoch.elapsed().as_millis() as u32
    }
}

/// A peer reached through the shared socket.
struct UdpFace {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
}

impl Face for UdpFace {
    fn send(&mut self, packet: &[u8]) -> rust_tinyndn_common::Result<()> {
        self.socket.try_send_to(packet, self.remote)?;
        Ok(())
    }

    fn face_type(&self) -> FaceType {
        FaceType::Udp
    }

    fn on_timeout(&mut self, name: &Name) {
        debug!("[Face {}] Interest {} timed out", self.remote, name);
    }
}

enum Event {
    Datagram(std::io::Result<(usize, SocketAddr)>),
    Alarm,
    Interrupted,
}

/// Peers known to the node.
///
/// Configured peers are pinned for the lifetime of the node. Peers that
/// showed up on their own get a face on first contact; when the face table
/// is full the one heard from least recently gives up its face.
#[derive(Debug, Default)]
struct Peers {
    faces: HashMap<SocketAddr, FaceId>,
    last_heard: HashMap<SocketAddr, Instant>,
}

impl Peers {
    fn pin(&mut self, remote: SocketAddr, face: FaceId) {
        self.faces.insert(remote, face);
    }

    fn face_for(
        &mut self,
        fwd: &mut Forwarder<MonotonicAlarm>,
        socket: &Arc<UdpSocket>,
        from: SocketAddr,
        now: Instant,
    ) -> rust_tinyndn_common::Result<FaceId> {
        if let Some(face) = self.faces.get(&from).copied() {
            if let Some(heard) = self.last_heard.get_mut(&from) {
                *heard = now;
            }
            return Ok(face);
        }

        if fwd.faces().len() >= fwd.faces().capacity() {
            let idle = self.least_recently_heard().ok_or(Error::FaceTableFull)?;
            self.evict(fwd, idle)?;
        }
        let face = fwd.add_face(UdpFace {
            socket: socket.clone(),
            remote: from,
        })?;
        info!("New peer {} -> {}", from, face);
        self.faces.insert(from, face);
        self.last_heard.insert(from, now);
        Ok(face)
    }

    fn least_recently_heard(&self) -> Option<SocketAddr> {
        self.last_heard
            .iter()
            .min_by_key(|(_, heard)| **heard)
            .map(|(remote, _)| *remote)
    }

    fn evict(
        &mut self,
        fwd: &mut Forwarder<MonotonicAlarm>,
        remote: SocketAddr,
    ) -> rust_tinyndn_common::Result<()> {
        self.last_heard.remove(&remote);
        if let Some(face) = self.faces.remove(&remote) {
            fwd.remove_face(face)?;
            info!("Evicted idle peer {} ({})", remote, face);
        }
        Ok(())
    }
}

/// Run a forwarder node until interrupted or `duration` seconds pass
pub async fn run_node(
    config_path: Option<PathBuf>,
    listen: Option<String>,
    duration: Option<u64>,
) -> Result<()> {
    let mut node = load_config(config_path.as_ref())?;
    if let Some(listen) = listen {
        node.listen = listen;
    }

    let socket = Arc::new(
        UdpSocket::bind(&node.listen)
            .await
            .with_context(|| format!("Failed to bind {}", node.listen))?,
    );
    info!("Listening on {}", socket.local_addr()?);

    let mut fwd = Forwarder::new(node.forwarder.clone(), MonotonicAlarm::new())?;
    let mut peers = Peers::default();
    let mut labels: HashMap<String, FaceId> = HashMap::new();

    for face in &node.faces {
        let id = fwd.add_face(UdpFace {
            socket: socket.clone(),
            remote: face.remote,
        })?;
        info!("Face {} ({}) -> {}", face.name, face.remote, id);
        peers.pin(face.remote, id);
        labels.insert(face.name.clone(), id);
    }

    for route in &node.routes {
        let face = *labels
            .get(&route.face)
            .with_context(|| format!("Route {} names unknown face {}", route.prefix, route.face))?;
        let prefix = Name::from_uri(&route.prefix)?;
        fwd.add_route_with_cost(face, &prefix, route.cost)?;
        info!("Route {} -> {} (cost {})", prefix, face, route.cost);
    }

    for serve in &node.serve {
        let prefix = Name::from_uri(&serve.prefix)?;
        let content = serve.content.clone();
        let freshness = serve.freshness_ms;
        fwd.register_prefix(&prefix, move |interest, _raw| {
            let mut data = Data::new(interest.name.clone(), content.clone().into_bytes());
            if let Some(ms) = freshness {
                data = data.with_freshness_period(ms);
            }
            data.to_bytes().ok()
        })?;
        info!("Serving {}", prefix);
    }

    // One receive buffer, separate from the forwarder's outgoing pool.
    let mut rx_pool = MemoryPool::new(1, node.forwarder.pool_block_size);
    let stop_at = duration.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

    loop {
        let wake = fwd
            .alarm()
            .deadline()
            .map(tokio::time::Instant::from_std)
            .unwrap_or_else(|| tokio::time::Instant::now() + IDLE_POLL);
        let wake = match stop_at {
            Some(stop) if stop < wake => stop,
            _ => wake,
        };

        let block = rx_pool.alloc().context("Receive pool exhausted")?;
        let event = tokio::select! {
            result = socket.recv_from(rx_pool.block_mut(block)) => Event::Datagram(result),
            _ = tokio::time::sleep_until(wake) => Event::Alarm,
            _ = tokio::signal::ctrl_c() => Event::Interrupted,
        };

        match event {
            Event::Datagram(Ok((len, from))) => {
                match peers.face_for(&mut fwd, &socket, from, Instant::now()) {
                    Ok(face) => match fwd.receive(face, &rx_pool.block(block)[..len]) {
                        Ok(outcome) => debug!("{} bytes from {}: {:?}", len, from, outcome),
                        Err(e) => debug!("{} bytes from {} not forwarded: {}", len, from, e),
                    },
                    Err(e) => warn!("Dropping datagram from {}: {}", from, e),
                }
            }
            Event::Datagram(Err(e)) => warn!("Receive failed: {}", e),
            Event::Alarm => {}
            Event::Interrupted => {
                info!("Interrupted");
                rx_pool.free_block(block)?;
                break;
            }
        }
        rx_pool.free_block(block)?;

        let expired = fwd.process_timers();
        if expired > 0 {
            debug!("{} Interests expired", expired);
        }
        if stop_at.map_or(false, |stop| tokio::time::Instant::now() >= stop) {
            info!("Run duration elapsed");
            break;
        }
    }

    println!("{}", serde_json::to_string_pretty(&fwd.metrics().snapshot())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
listen = "127.0.0.1:0"

[forwarder]
cs_capacity = 4

[[faces]]
name = "up"
remote = "127.0.0.1:6363"

[[routes]]
prefix = "/aaa"
face = "up"
cost = 3
"#
        )
        .unwrap();

        let node = load_config(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(node.listen, "127.0.0.1:0");
        assert_eq!(node.forwarder.cs_capacity, 4);
        assert_eq!(node.forwarder.pit_capacity, 128);
        assert_eq!(node.faces[0].name, "up");
        assert_eq!(node.routes[0].cost, 3);
    }

    #[test]
    fn test_invalid_forwarder_section_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "forwarder": {{ "pit_capacity": 0 }} }}"#).unwrap();
        assert!(load_config(Some(&file.path().to_path_buf())).is_err());
    }

    #[tokio::test]
    async fn test_idle_peer_gives_up_its_face() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let config = ForwarderConfig {
            max_faces: 4,
            ..Default::default()
        };
        let mut fwd = Forwarder::new(config, MonotonicAlarm::new()).unwrap();
        let mut peers = Peers::default();
        let addr = |port: u16| SocketAddr::from(([127, 0, 0, 1], port));

        let pinned = fwd
            .add_face(UdpFace { socket: socket.clone(), remote: addr(1) })
            .unwrap();
        peers.pin(addr(1), pinned);

        let t0 = Instant::now();
        let a = peers.face_for(&mut fwd, &socket, addr(2), t0).unwrap();
        let b = peers
            .face_for(&mut fwd, &socket, addr(3), t0 + Duration::from_millis(10))
            .unwrap();
        // Hearing from the first peer again makes the second one the idlest.
        assert_eq!(
            peers.face_for(&mut fwd, &socket, addr(2), t0 + Duration::from_millis(20)).unwrap(),
            a
        );

        let c = peers
            .face_for(&mut fwd, &socket, addr(4), t0 + Duration::from_millis(30))
            .unwrap();
        assert_eq!(c, b);
        assert_eq!(fwd.faces().len(), 4);
        assert!(!peers.faces.contains_key(&addr(3)));
        assert_eq!(peers.faces.get(&addr(1)), Some(&pinned));
    }

    #[tokio::test]
    async fn test_pinned_peers_are_never_evicted() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let config = ForwarderConfig {
            max_faces: 2,
            ..Default::default()
        };
        let mut fwd = Forwarder::new(config, MonotonicAlarm::new()).unwrap();
        let mut peers = Peers::default();
        let pinned_addr = SocketAddr::from(([127, 0, 0, 1], 1));
        let pinned = fwd
            .add_face(UdpFace { socket: socket.clone(), remote: pinned_addr })
            .unwrap();
        peers.pin(pinned_addr, pinned);

        let stranger = SocketAddr::from(([127, 0, 0, 1], 2));
        assert!(matches!(
            peers.face_for(&mut fwd, &socket, stranger, Instant::now()),
            Err(Error::FaceTableFull)
        ));
        assert_eq!(peers.faces.get(&pinned_addr), Some(&pinned));
    }

    #[test]
    fn test_monotonic_alarm() {
        let mut alarm = MonotonicAlarm::new();
        assert!(alarm.deadline().is_none());
        let now = alarm.now();
        alarm.start(now, 50);
        assert!(alarm.deadline().is_some());
        alarm.stop();
        assert!(alarm.deadline().is_none());
    }
}
