//! # World Client Library
//!
//! The observing side of a world session. Each participant keeps a replica
//! of every tool and resource, sends requests to the authoritative server
//! and reacts to the snapshots it broadcasts.
//!
//! ## Architecture Overview
//!
//! Nothing changes locally until the server says so. A click on a tool
//! queues a `hold` request; only when the snapshot naming the new holder
//! arrives does the tool attach to the avatar's hand. This keeps every
//! participant converging on the same state no matter how requests race.
//!
//! ### Replicas
//! Each object view wraps a replica store. Snapshots carry a per-object
//! version, and older or duplicate ones are dropped on arrival.
//!
//! ### Interaction Bus
//! Tools and resources never reference each other. A tool announces that
//! it was taken, picked up, dropped or swung at a trunk; a resource
//! announces it spawned late and needs to know what the local actor holds.
//! The bus is local to one participant and carries no authority.
//!
//! ### Reactions
//! Sounds, emotes and model swaps are reactions to replicated changes. A
//! change older than the freshness window is applied silently, so a
//! participant joining late sees a fallen resource without hearing it fall.
//!
//! ## Module Organization
//!
//! ### Bus Module (`bus`)
//! Participant-local broadcast of interaction signals.
//!
//! ### Host Module (`host`)
//! Local actor, world clock, chat and effect presentation.
//!
//! ### Tool Module (`tool`)
//! Take/place affordance, swing throttle, hand attachment.
//!
//! ### Resource Module (`resource`)
//! Tool-in-hand tracking, chop handling, standing/fallen presentation.
//!
//! ### World Module (`world`)
//! All views of one participant, input routing and bus draining.
//!
//! ### Input Module (`input`)
//! Console commands that stand in for pointer input.
//!
//! ### Network Module (`network`)
//! UDP session with the server: join, heartbeats, requests and snapshots.
//!
//! ## Usage Example
//!
//! ```rust
//! use client::host::{Mesh, PointerEvent, RecordingHost};
//! use client::world::ClientWorld;
//! use shared::{ObjectSnapshot, ObjectState, Tuning};
//! use shared::tool::ToolState;
//!
//! let mut host = RecordingHost::new(1, 10.0);
//! let mut world = ClientWorld::new(Tuning::default());
//! world.load(&mut host, vec![ObjectSnapshot {
//!     entity: 1,
//!     version: 0,
//!     state: ObjectState::Tool(ToolState::default()),
//! }]);
//!
//! // Clicking the resting tool queues a hold request for the server
//! world.pointer_down(&mut host, PointerEvent::on(1, Mesh::Tool, 2.0));
//! assert_eq!(world.take_outbox().len(), 1);
//! ```

pub mod bus;
pub mod host;
pub mod input;
pub mod network;
pub mod resource;
pub mod tool;
pub mod world;
