use crate::host::ConsoleHost;
use crate::input::{parse_command, Command};
use crate::world::ClientWorld;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connected: bool,
    running: bool,

    host: ConsoleHost,
    world: Option<ClientWorld>,

    ping_ms: u64,
    fake_ping_ms: u64,
    last_heartbeat: Instant,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            connected: false,
            running: true,
            host: ConsoleHost::default(),
            world: None,
            ping_ms: 0,
            fake_ping_ms,
            last_heartbeat: Instant::now(),
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Joining world session...");

        let packet = Packet::Join {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Waits for one datagram from the server and decodes it.
    async fn receive(&self, buffer: &mut [u8]) -> Result<Packet, Box<dyn std::error::Error>> {
        let (len, _) = self.socket.recv_from(buffer).await?;
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }
        Ok(deserialize::<Packet>(&buffer[0..len])?)
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Welcome {
                actor_id,
                time,
                tuning,
                objects,
            } => {
                info!(
                    "Joined as actor {} at world time {:.2} ({} objects)",
                    actor_id,
                    time,
                    objects.len()
                );
                self.host.actor = Some(actor_id);
                self.host.clock.sync(time);
                self.connected = true;

                let mut world = ClientWorld::new(tuning);
                world.load(&mut self.host, objects);
                self.world = Some(world);
            }

            Packet::StateChanged { time, snapshot } => {
                self.host.clock.sync(time);
                match self.world.as_mut() {
                    Some(world) => world.apply(&mut self.host, snapshot),
                    None => debug!("State change for {} before welcome", snapshot.entity),
                }
            }

            Packet::Clock { time } => {
                self.ping_ms = self.last_heartbeat.elapsed().as_millis() as u64;
                self.host.clock.sync(time);
            }

            Packet::Rejected { reason } => {
                warn!("Rejected: {}", reason);
                self.connected = false;
                self.running = false;
                self.host.actor = None;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    fn handle_command(&mut self, line: &str) {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        if command == Command::Quit {
            self.running = false;
            return;
        }

        let Some(world) = self.world.as_mut() else {
            warn!("Not joined yet");
            return;
        };

        match command {
            Command::Click(event) => world.pointer_down(&mut self.host, event),
            Command::Respawn(entity) => {
                if !world.force_respawn(&mut self.host, entity) {
                    warn!("No resource {}", entity);
                }
            }
            Command::Dispatch { entity, name, args } => {
                match world.dispatch_named(&mut self.host, entity, &name, &args) {
                    Ok(true) => {}
                    Ok(false) => warn!("No object {}", entity),
                    Err(e) => error!("Dispatch on {} aborted: {}", entity, e),
                }
            }
            Command::Status => {
                println!(
                    "actor {:?}, world time {:.2}, ping {}ms",
                    self.host.actor,
                    self.host.clock.now(),
                    self.ping_ms
                );
                for line in world.status() {
                    println!("  {}", line);
                }
            }
            Command::Quit => {}
        }
    }

    /// Sends every request the views queued since the last flush.
    async fn flush_outbox(&mut self) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        for request in world.take_outbox() {
            debug!("-> {:?}", request);
            if let Err(e) = self.send_packet(&Packet::Dispatch { request }).await {
                error!("Error sending dispatch: {}", e);
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        while self.running {
            tokio::select! {
                result = self.receive(&mut buffer) => {
                    match result {
                        Ok(packet) => self.handle_packet(packet),
                        Err(e) => warn!("Dropped packet: {}", e),
                    }
                },

                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => self.handle_command(&line),
                        Ok(None) => self.running = false,
                        Err(e) => {
                            error!("Error reading input: {}", e);
                            self.running = false;
                        }
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        self.last_heartbeat = Instant::now();
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },
            }

            self.flush_outbox().await;
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Leave).await;
        }

        Ok(())
    }
}
