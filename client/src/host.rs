//! Narrow interface to the hosting runtime
//!
//! Views never render, play audio or read devices themselves. They ask the
//! host who the local actor is and what time it is, and hand presentation
//! back as [`Effect`]s.

use log::info;
use shared::{ActorId, EntityId, Timestamp, WorldClock};

/// Shown to an actor who tries to chop without holding a tool.
pub const NEED_TOOL_MESSAGE: &str = "You need a tool.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Follow `actor`'s right hand every frame
    AttachToHand { actor: ActorId },
    /// Rest on the stand
    ReturnToStand,
    SwingEmote,
    SwingSound,
    ChopSound,
    FallSound,
    ShowStanding,
    ShowFallen,
}

/// Which part of an object a pointer ray hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mesh {
    /// The tool model resting on its stand
    Tool,
    /// The stand the tool rests on
    Stand,
    /// A resource trunk
    Trunk,
    Other,
}

/// A pointer-down with its hit-test result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub mesh: Mesh,
    pub distance: f32,
    pub entity: Option<EntityId>,
}

impl PointerEvent {
    pub fn on(entity: EntityId, mesh: Mesh, distance: f32) -> Self {
        Self {
            mesh,
            distance,
            entity: Some(entity),
        }
    }

    /// A click that hit nothing interactive.
    pub fn miss() -> Self {
        Self {
            mesh: Mesh::Other,
            distance: f32::INFINITY,
            entity: None,
        }
    }
}

pub trait Host {
    fn local_actor(&self) -> Option<ActorId>;
    fn now(&self) -> Timestamp;
    /// Transient message to the local actor only.
    fn chat(&mut self, message: &str);
    fn present(&mut self, entity: EntityId, effect: Effect);
}

/// Host for the headless console client: effects go to the log.
#[derive(Debug, Default)]
pub struct ConsoleHost {
    pub actor: Option<ActorId>,
    pub clock: WorldClock,
}

impl Host for ConsoleHost {
    fn local_actor(&self) -> Option<ActorId> {
        self.actor
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn chat(&mut self, message: &str) {
        println!("{}", message);
    }

    fn present(&mut self, entity: EntityId, effect: Effect) {
        info!("[{}] {:?}", entity, effect);
    }
}

/// Host driven by an explicit clock that records everything presented.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub actor: Option<ActorId>,
    pub time: Timestamp,
    pub chats: Vec<String>,
    pub effects: Vec<(EntityId, Effect)>,
}

impl RecordingHost {
    pub fn new(actor: ActorId, time: Timestamp) -> Self {
        Self {
            actor: Some(actor),
            time,
            ..Self::default()
        }
    }

    pub fn saw(&self, entity: EntityId, effect: Effect) -> bool {
        self.effects.contains(&(entity, effect))
    }

    pub fn clear(&mut self) {
        self.chats.clear();
        self.effects.clear();
    }
}

impl Host for RecordingHost {
    fn local_actor(&self) -> Option<ActorId> {
        self.actor
    }

    fn now(&self) -> Timestamp {
        self.time
    }

    fn chat(&mut self, message: &str) {
        self.chats.push(message.to_string());
    }

    fn present(&mut self, entity: EntityId, effect: Effect) {
        self.effects.push((entity, effect));
    }
}
