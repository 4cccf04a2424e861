//! Protocol, tuning and replicated object state shared by the world server
//! and every observing client.

pub mod resource;
pub mod store;
pub mod tool;

use resource::{ResourceAction, ResourceState};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tool::{ToolAction, ToolState};

/// Identifies a participant (avatar) in the world session.
pub type ActorId = u32;
/// Identifies an object instance in the world session.
pub type EntityId = u32;
/// World-clock time in seconds.
pub type Timestamp = f64;

/// Far-past sentinel for "never happened".
pub const NEVER: Timestamp = -99_999.0;

pub const PROTOCOL_VERSION: u32 = 1;

/// Largest UDP payload over IPv4. Receive buffers on both sides use this size.
pub const MAX_PACKET_SIZE: usize = 65_507;

pub const TAKE_DISTANCE: f32 = 5.0;
pub const CHOP_DISTANCE: f32 = 1.5;
pub const USE_COOLDOWN: f64 = 0.5;
pub const FRESHNESS_WINDOW: f64 = 1.5;
pub const LATE_SPAWN_AFTER: f64 = 3.0;
pub const DEFAULT_RESPAWN_SECONDS: f64 = 30.0;

/// Interaction constants every participant must agree on.
///
/// The server owns the values and hands them to each client on join.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Maximum pointer distance for taking or placing a tool
    pub take_distance: f32,
    /// Maximum pointer distance for a swing to land on a trunk
    pub chop_distance: f32,
    /// Minimum world time between two accepted uses by the holder
    pub use_cooldown: f64,
    /// Events older than this are replayed silently to new observers
    pub freshness_window: f64,
    /// Resources spawned after this world time ask tools for the local loadout
    pub late_spawn_after: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            take_distance: TAKE_DISTANCE,
            chop_distance: CHOP_DISTANCE,
            use_cooldown: USE_COOLDOWN,
            freshness_window: FRESHNESS_WINDOW,
            late_spawn_after: LATE_SPAWN_AFTER,
        }
    }
}

/// Monotonic world clock with an offset that observers align to the server.
#[derive(Debug, Clone)]
pub struct WorldClock {
    origin: Instant,
    offset: f64,
}

impl WorldClock {
    /// Starts a clock reading zero now.
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            offset: 0.0,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.offset + self.origin.elapsed().as_secs_f64()
    }

    /// Aligns this clock with an authoritative reading.
    pub fn sync(&mut self, authoritative: Timestamp) {
        self.offset = authoritative - self.origin.elapsed().as_secs_f64();
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::start()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectState {
    Tool(ToolState),
    Resource(ResourceState),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectAction {
    Tool(ToolAction),
    Resource(ResourceAction),
}

/// Authoritative state of one object at a given version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub entity: EntityId,
    pub version: u64,
    pub state: ObjectState,
}

/// An action a participant asks the authority to run on an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub entity: EntityId,
    pub action: ObjectAction,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Join {
        client_version: u32,
    },
    Dispatch {
        request: Request,
    },
    Heartbeat,
    Leave,

    Welcome {
        actor_id: ActorId,
        time: Timestamp,
        tuning: Tuning,
        objects: Vec<ObjectSnapshot>,
    },
    StateChanged {
        time: Timestamp,
        snapshot: ObjectSnapshot,
    },
    Clock {
        time: Timestamp,
    },
    Rejected {
        reason: String,
    },
}
