//! Server network layer handling UDP communications and the authoritative loop

use crate::client_manager::ClientManager;
use crate::world::WorldState;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    ActorId, EntityId, ObjectSnapshot, Packet, Tuning, WorldClock, MAX_PACKET_SIZE,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        actor_id: ActorId,
    },
    /// Operator edit of a resource's respawn timer field
    SetRespawnTimer {
        entity: EntityId,
        seconds: Option<f64>,
    },
    Shutdown,
}

/// Messages sent from the world loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
    },
}

/// Session-level settings for the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub client_timeout: Duration,
    /// How often the full world state is rebroadcast so replicas that lost a
    /// datagram converge again
    pub resync_interval: Duration,
    pub tuning: Tuning,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(33),
            max_clients: 32,
            client_timeout: Duration::from_secs(5),
            resync_interval: Duration::from_secs(1),
            tuning: Tuning::default(),
        }
    }
}

/// Authoritative world server
///
/// All dispatches from all actors funnel through the single loop in
/// [`Server::run`], which is what serializes every object's action stream.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: WorldState,
    clock: WorldClock,
    config: ServerConfig,
    tick: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        world: WorldState,
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            world,
            clock: WorldClock::start(),
            config,
            tick: 0,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Address the server socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender for operator messages into the world loop.
    pub fn operator(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (actor_id, addr) in client_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to actor {}: {}", actor_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that sweeps quiet actors
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.config.client_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for actor_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { actor_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        if data.len() > MAX_PACKET_SIZE {
            return Err(format!("packet of {} bytes exceeds one datagram", data.len()).into());
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Fans authoritative changes out to every replica
    fn broadcast_snapshots(&self, snapshots: Vec<ObjectSnapshot>) {
        let time = self.clock.now();
        for snapshot in snapshots {
            self.broadcast_packet(Packet::StateChanged { time, snapshot });
        }
    }

    fn depart(&mut self, actor_id: ActorId) {
        let snapshots = self.world.handle_departure(actor_id, self.clock.now());
        self.broadcast_snapshots(snapshots);
    }

    /// Processes incoming packets and runs requests on the world
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Join { client_version } => {
                info!("Actor joining from {} (version: {})", addr, client_version);

                if client_version != PROTOCOL_VERSION {
                    let reason = "Protocol version mismatch".to_string();
                    self.send_packet(Packet::Rejected { reason }, addr);
                    return;
                }

                // A rejoin from the same address is a departure of the old actor
                let existing = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing {
                    info!("Replacing actor {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(&existing_id);
                    self.depart(existing_id);
                }

                let actor_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                match actor_id {
                    Some(actor_id) => {
                        let welcome = Packet::Welcome {
                            actor_id,
                            time: self.clock.now(),
                            tuning: self.config.tuning,
                            objects: self.world.snapshots(),
                        };
                        self.send_packet(welcome, addr);
                    }
                    None => {
                        let reason = "Server full".to_string();
                        self.send_packet(Packet::Rejected { reason }, addr);
                    }
                }
            }

            Packet::Dispatch { request } => {
                let actor_id = self.clients.write().await.touch(addr);
                let Some(actor_id) = actor_id else {
                    debug!("Dispatch from unknown address {}", addr);
                    return;
                };

                if let Some(snapshot) =
                    self.world
                        .dispatch(Some(actor_id), request, self.clock.now())
                {
                    self.broadcast_snapshots(vec![snapshot]);
                }
            }

            Packet::Heartbeat => {
                let known = self.clients.write().await.touch(addr).is_some();
                if known {
                    let time = self.clock.now();
                    self.send_packet(Packet::Clock { time }, addr);
                }
            }

            Packet::Leave => {
                let actor_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(actor_id) = actor_id {
                    self.clients.write().await.remove_client(&actor_id);
                    self.depart(actor_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from actor at {}", addr);
            }
        }
    }

    /// Runs one message from the network tasks or the operator. Returns false on shutdown.
    async fn handle_message(&mut self, message: Option<ServerMessage>) -> bool {
        match message {
            Some(ServerMessage::PacketReceived { packet, addr }) => {
                self.handle_packet(packet, addr).await;
            }
            Some(ServerMessage::ClientTimeout { actor_id }) => {
                info!("Actor {} timed out", actor_id);
                self.depart(actor_id);
            }
            Some(ServerMessage::SetRespawnTimer { entity, seconds }) => {
                if self.world.set_respawn_timer(entity, seconds) {
                    info!("Resource {} respawn timer set to {:?}", entity, seconds);
                } else {
                    warn!("No resource {} to set a respawn timer on", entity);
                }
            }
            Some(ServerMessage::Shutdown) | None => {
                info!("Server shutting down");
                return false;
            }
        }
        true
    }

    /// Ticks between two full-state rebroadcasts
    fn resync_every(&self) -> u64 {
        let ticks = self.config.resync_interval.as_secs_f64()
            / self.config.tick_duration.as_secs_f64().max(f64::EPSILON);
        (ticks.round() as u64).max(1)
    }

    fn on_tick(&mut self) {
        let snapshots = self.world.tick(self.clock.now());
        self.broadcast_snapshots(snapshots);
        self.tick += 1;

        if self.tick % self.resync_every() == 0 {
            self.broadcast_snapshots(self.world.snapshots());
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.config.tick_duration);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    if !self.handle_message(message).await {
                        break;
                    }
                },

                _ = tick_interval.tick() => {
                    self.on_tick();

                    if self.tick % 300 == 0 {
                        let actor_count = self.clients.read().await.len();
                        debug!("Tick {}: {} actors, world time {:.1}",
                               self.tick, actor_count, self.clock.now());
                    }
                },
            }
        }

        Ok(())
    }
}
