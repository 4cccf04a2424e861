//! Actor session management for the world server
//!
//! This module tracks which actors are present in the session:
//! - Session lifecycle (join, leave, timeout)
//! - Address to actor lookup for incoming packets
//! - Liveness tracking from any packet the actor sends
//! - Capacity limits
//!
//! Sessions that go quiet for longer than the timeout are swept and reported
//! as departures, which the presence monitor turns into tool releases.

use log::info;
use shared::ActorId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected actor
#[derive(Debug)]
pub struct ActorSession {
    /// Actor identifier assigned by the server
    pub id: ActorId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this actor
    pub last_seen: Instant,
}

impl ActorSession {
    pub fn new(id: ActorId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing was heard from this actor within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all actors present in the session
///
/// Actor IDs are never reused within a session, so a rejoining avatar is a
/// new actor and can never inherit a hold from its previous connection.
pub struct ClientManager {
    /// Connected actors indexed by ID
    clients: HashMap<ActorId, ActorSession>,
    /// Next available actor ID
    next_actor_id: ActorId,
    /// Maximum number of concurrent actors allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Actor IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_actor_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new actor
    ///
    /// Returns Some(actor_id) if successful, None if the session is full.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ActorId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let actor_id = self.next_actor_id;
        self.next_actor_id += 1;

        info!("Actor {} joined from {}", actor_id, addr);
        self.clients
            .insert(actor_id, ActorSession::new(actor_id, addr));

        Some(actor_id)
    }

    /// Removes an actor from the session
    ///
    /// Returns true if the actor was found and removed, false if they were already gone.
    pub fn remove_client(&mut self, actor_id: &ActorId) -> bool {
        if let Some(session) = self.clients.remove(actor_id) {
            info!("Actor {} left", session.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ActorId> {
        self.clients
            .iter()
            .find(|(_, session)| session.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks the actor at `addr` as alive and returns its ID.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<ActorId> {
        self.clients
            .values_mut()
            .find(|session| session.addr == addr)
            .map(|session| {
                session.touch();
                session.id
            })
    }

    /// Removes and returns every actor that has gone quiet for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ActorId> {
        let timed_out: Vec<ActorId> = self
            .clients
            .iter()
            .filter(|(_, session)| session.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for actor_id in &timed_out {
            self.remove_client(actor_id);
        }

        timed_out
    }

    /// Gets all actor IDs and their network addresses for broadcasting
    pub fn get_client_addrs(&self) -> Vec<(ActorId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, session)| (*id, session.addr))
            .collect()
    }

    /// Returns the number of actors currently present
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no actors are present
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
