//! Presence monitor
//!
//! Runs only on the server. When an actor leaves the session (explicit leave
//! or heartbeat timeout) every tool still held by that actor is released by
//! the authority, so no tool stays attached to an avatar that is gone.

use crate::world::WorldState;
use log::{debug, info};
use shared::tool::ToolAction;
use shared::{ActorId, ObjectAction, ObjectSnapshot, Request, Timestamp};

impl WorldState {
    /// Releases every tool held by `actor` and returns the snapshots to broadcast.
    pub fn handle_departure(&mut self, actor: ActorId, now: Timestamp) -> Vec<ObjectSnapshot> {
        let held = self.tools_held_by(actor);
        if held.is_empty() {
            debug!("Actor {} left holding nothing", actor);
            return Vec::new();
        }

        held.into_iter()
            .filter_map(|entity| {
                info!("Actor {} left holding tool {}, returning it", actor, entity);
                let request = Request {
                    entity,
                    action: ObjectAction::Tool(ToolAction::Release),
                };
                self.dispatch(None, request, now)
            })
            .collect()
    }
}
