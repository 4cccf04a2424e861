//! # World Server Library
//!
//! The authoritative side of a world session containing pick-up tools and
//! choppable resources. It owns the canonical state of every object, decides
//! which requests take effect, and broadcasts each change so every observer
//! converges on the same state.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Dispatch
//! Clients never mutate object state themselves. They send a named action
//! (`hold`, `use`, `release`, `hit`, `respawn`) for one object; the server
//! validates it against the current state, runs it through the object's
//! replicated store, and broadcasts the resulting snapshot. Requests that
//! lost a race are dropped without a reply.
//!
//! ### Ownership Arbitration
//! A tool has at most one holder. Whichever `hold` the server executes first
//! wins; later holds by other actors are refused until the tool is released.
//!
//! ### Presence
//! When an actor leaves, explicitly or by going quiet past the heartbeat
//! timeout, any tool it still holds is released by the server.
//!
//! ### Respawn Timers
//! A resource whose health reaches zero gets a one-shot respawn deadline read
//! from its operator field at that moment. Deadlines are checked every tick;
//! a manual respawn cancels the pending deadline.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Actor sessions: ID assignment, address lookup, liveness and capacity.
//!
//! ### World Module (`world`)
//! Authoritative object stores, request validation and scene layout.
//!
//! ### Presence Module (`presence`)
//! Departure handling that returns orphaned tools.
//!
//! ### Respawn Module (`respawn`)
//! Deadline bookkeeping for fallen resources.
//!
//! ### Console Module (`console`)
//! Operator commands read from stdin, such as editing a respawn timer.
//!
//! ### Network Module (`network`)
//! UDP transport, the packet protocol and the single-threaded event loop that
//! serializes every dispatch.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use server::world::{SceneConfig, WorldState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let world = WorldState::from_scene(&SceneConfig::default());
//!     let mut server = Server::new("127.0.0.1:8080", world, ServerConfig::default()).await?;
//!
//!     // Accepts joins, runs dispatches in arrival order, fires respawn
//!     // timers on each tick and releases tools of departed actors.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod console;
pub mod network;
pub mod presence;
pub mod respawn;
pub mod world;
