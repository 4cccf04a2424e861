//! Authoritative world state
//!
//! The server is the only participant whose stores run as `Role::Authority`.
//! Every request passes through one `dispatch` call on the server's event
//! loop, so each object's actions are serialized. Requests that lose a race
//! (taking a tool someone else already holds, swinging a tool you no longer
//! hold, chopping a fallen resource) are dropped here without reaching the
//! store; the requester learns the outcome from the next snapshot.

use crate::respawn::RespawnScheduler;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use shared::resource::{Phase, ResourceAction, ResourceField, ResourceState};
use shared::store::{Action, Dispatched, ReplicatedStore, Role};
use shared::tool::{ToolAction, ToolField, ToolState};
use shared::{
    ActorId, EntityId, ObjectAction, ObjectSnapshot, ObjectState, Request, Timestamp,
    DEFAULT_RESPAWN_SECONDS,
};
use std::collections::BTreeMap;

/// Operator-editable fields of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceFields {
    /// Seconds between falling and respawning; unset or non-positive means the default
    pub respawn_timer_seconds: Option<f64>,
}

impl ResourceFields {
    pub fn respawn_delay(&self) -> f64 {
        self.respawn_timer_seconds
            .filter(|seconds| *seconds > 0.0)
            .unwrap_or(DEFAULT_RESPAWN_SECONDS)
    }
}

/// Upper bound on tools and on resources in a scene, so a full `Welcome`
/// still fits in one datagram.
pub const MAX_OBJECTS_PER_KIND: u32 = 800;

/// Objects placed in the world when the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub tools: u32,
    pub resources: u32,
    pub resource_fields: ResourceFields,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            tools: 1,
            resources: 1,
            resource_fields: ResourceFields::default(),
        }
    }
}

#[derive(Debug)]
struct ResourceSlot {
    store: ReplicatedStore<ResourceState>,
    fields: ResourceFields,
}

#[derive(Debug)]
pub struct WorldState {
    tools: BTreeMap<EntityId, ReplicatedStore<ToolState>>,
    resources: BTreeMap<EntityId, ResourceSlot>,
    respawns: RespawnScheduler,
    next_entity: EntityId,
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            resources: BTreeMap::new(),
            respawns: RespawnScheduler::new(),
            next_entity: 1,
        }
    }

    pub fn from_scene(scene: &SceneConfig) -> Self {
        let mut world = Self::new();
        for _ in 0..scene.tools {
            world.spawn_tool();
        }
        for _ in 0..scene.resources {
            world.spawn_resource(scene.resource_fields);
        }
        world
    }

    pub fn spawn_tool(&mut self) -> EntityId {
        let entity = self.allocate_entity();
        self.tools
            .insert(entity, ReplicatedStore::new(entity, Role::Authority));
        info!("Spawned tool {}", entity);
        entity
    }

    pub fn spawn_resource(&mut self, fields: ResourceFields) -> EntityId {
        let entity = self.allocate_entity();
        self.resources.insert(
            entity,
            ResourceSlot {
                store: ReplicatedStore::new(entity, Role::Authority),
                fields,
            },
        );
        info!(
            "Spawned resource {} (respawn after {:.1}s)",
            entity,
            fields.respawn_delay()
        );
        entity
    }

    fn allocate_entity(&mut self) -> EntityId {
        let entity = self.next_entity;
        self.next_entity += 1;
        entity
    }

    /// Updates the operator field. A timer that is already running keeps its deadline.
    pub fn set_respawn_timer(&mut self, entity: EntityId, seconds: Option<f64>) -> bool {
        match self.resources.get_mut(&entity) {
            Some(slot) => {
                slot.fields.respawn_timer_seconds = seconds;
                true
            }
            None => false,
        }
    }

    pub fn tool(&self, entity: EntityId) -> Option<&ToolState> {
        self.tools.get(&entity).map(|store| store.state())
    }

    pub fn resource(&self, entity: EntityId) -> Option<&ResourceState> {
        self.resources.get(&entity).map(|slot| slot.store.state())
    }

    pub fn tool_ids(&self) -> Vec<EntityId> {
        self.tools.keys().copied().collect()
    }

    pub fn resource_ids(&self) -> Vec<EntityId> {
        self.resources.keys().copied().collect()
    }

    pub fn tools_held_by(&self, actor: ActorId) -> Vec<EntityId> {
        self.tools
            .iter()
            .filter(|(_, store)| store.state().is_held_by(actor))
            .map(|(entity, _)| *entity)
            .collect()
    }

    pub fn pending_respawn(&self, entity: EntityId) -> Option<Timestamp> {
        self.respawns.deadline(entity)
    }

    pub fn snapshot(&self, entity: EntityId) -> Option<ObjectSnapshot> {
        if let Some(store) = self.tools.get(&entity) {
            return Some(tool_snapshot(store));
        }
        self.resources
            .get(&entity)
            .map(|slot| resource_snapshot(&slot.store))
    }

    /// Full state for an observer that is just joining.
    pub fn snapshots(&self) -> Vec<ObjectSnapshot> {
        let mut snapshots: Vec<ObjectSnapshot> = self.tools.values().map(tool_snapshot).collect();
        snapshots.extend(
            self.resources
                .values()
                .map(|slot| resource_snapshot(&slot.store)),
        );
        snapshots
    }

    /// Runs a request on behalf of `sender`, or of the server itself when `None`.
    ///
    /// Returns the new snapshot to broadcast if the object changed.
    pub fn dispatch(
        &mut self,
        sender: Option<ActorId>,
        request: Request,
        now: Timestamp,
    ) -> Option<ObjectSnapshot> {
        match request.action {
            ObjectAction::Tool(action) => self.dispatch_tool(sender, request.entity, action),
            ObjectAction::Resource(action) => self.dispatch_resource(request.entity, action, now),
        }
    }

    fn dispatch_tool(
        &mut self,
        sender: Option<ActorId>,
        entity: EntityId,
        action: ToolAction,
    ) -> Option<ObjectSnapshot> {
        let Some(store) = self.tools.get_mut(&entity) else {
            warn!("Tool action '{}' for unknown tool {}", action.name(), entity);
            return None;
        };

        if let Err(reason) = authorize_tool(store.state(), sender, &action) {
            debug!(
                "Dropping '{}' on tool {} from {:?}: {}",
                action.name(),
                entity,
                sender,
                reason
            );
            return None;
        }

        match store.dispatch(action) {
            Dispatched::Applied(change) => {
                if change.touches(ToolField::Holder) {
                    match store.state().holder {
                        Some(actor) => info!("Tool {} taken by actor {}", entity, actor),
                        None => info!("Tool {} returned to its stand", entity),
                    }
                }
                Some(tool_snapshot(store))
            }
            Dispatched::Unchanged | Dispatched::Forwarded(_) => None,
        }
    }

    fn dispatch_resource(
        &mut self,
        entity: EntityId,
        action: ResourceAction,
        now: Timestamp,
    ) -> Option<ObjectSnapshot> {
        let Some(slot) = self.resources.get_mut(&entity) else {
            warn!(
                "Resource action '{}' for unknown resource {}",
                action.name(),
                entity
            );
            return None;
        };

        let before = slot.store.state().phase();
        if before == Phase::Fallen && matches!(action, ResourceAction::Hit { .. }) {
            debug!("Dropping hit on fallen resource {}", entity);
            return None;
        }

        let change = match slot.store.dispatch(action) {
            Dispatched::Applied(change) => change,
            Dispatched::Unchanged | Dispatched::Forwarded(_) => return None,
        };

        if change.touches(ResourceField::Health) {
            match (before, slot.store.state().phase()) {
                (Phase::Standing, Phase::Fallen) => {
                    let delay = slot.fields.respawn_delay();
                    info!("Resource {} fell, respawning in {:.1}s", entity, delay);
                    self.respawns.schedule(entity, now + delay);
                }
                (Phase::Fallen, Phase::Standing) => {
                    if self.respawns.cancel(entity) {
                        debug!("Manual respawn of {} superseded its timer", entity);
                    }
                    info!("Resource {} respawned", entity);
                }
                _ => {}
            }
        }

        Some(resource_snapshot(&slot.store))
    }

    /// Fires every respawn timer that is due.
    pub fn tick(&mut self, now: Timestamp) -> Vec<ObjectSnapshot> {
        self.respawns
            .due(now)
            .into_iter()
            .filter_map(|entity| {
                let request = Request {
                    entity,
                    action: ObjectAction::Resource(ResourceAction::Respawn),
                };
                self.dispatch(None, request, now)
            })
            .collect()
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

/// First committer wins: a held tool only accepts requests from its holder.
fn authorize_tool(
    state: &ToolState,
    sender: Option<ActorId>,
    action: &ToolAction,
) -> Result<(), &'static str> {
    match action {
        ToolAction::Hold { actor, .. } => {
            if sender.is_some_and(|sender| sender != *actor) {
                return Err("hold on behalf of another actor");
            }
            match state.holder {
                Some(holder) if holder != *actor => Err("already held"),
                _ => Ok(()),
            }
        }
        ToolAction::Use { .. } => match (state.holder, sender) {
            (None, _) => Err("tool is idle"),
            (Some(holder), Some(sender)) if holder != sender => Err("not the holder"),
            _ => Ok(()),
        },
        ToolAction::Release => match (state.holder, sender) {
            (Some(holder), Some(sender)) if holder != sender => Err("not the holder"),
            _ => Ok(()),
        },
    }
}

fn tool_snapshot(store: &ReplicatedStore<ToolState>) -> ObjectSnapshot {
    ObjectSnapshot {
        entity: store.entity(),
        version: store.version(),
        state: ObjectState::Tool(store.state().clone()),
    }
}

fn resource_snapshot(store: &ReplicatedStore<ResourceState>) -> ObjectSnapshot {
    ObjectSnapshot {
        entity: store.entity(),
        version: store.version(),
        state: ObjectState::Resource(store.state().clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::resource::MAX_HEALTH;

    fn hold(entity: EntityId, actor: ActorId, time: Timestamp) -> Request {
        Request {
            entity,
            action: ObjectAction::Tool(ToolAction::Hold { actor, time }),
        }
    }

    fn tool_request(entity: EntityId, action: ToolAction) -> Request {
        Request {
            entity,
            action: ObjectAction::Tool(action),
        }
    }

    fn hit(entity: EntityId, time: Timestamp) -> Request {
        Request {
            entity,
            action: ObjectAction::Resource(ResourceAction::Hit { time }),
        }
    }

    #[test]
    fn test_scene_layout() {
        let world = WorldState::from_scene(&SceneConfig {
            tools: 2,
            resources: 3,
            resource_fields: ResourceFields::default(),
        });

        assert_eq!(world.tool_ids(), vec![1, 2]);
        assert_eq!(world.resource_ids(), vec![3, 4, 5]);
        assert_eq!(world.snapshots().len(), 5);
    }

    #[test]
    fn test_first_hold_wins() {
        let mut world = WorldState::new();
        let tool = world.spawn_tool();

        assert!(world.dispatch(Some(1), hold(tool, 1, 1.0), 1.0).is_some());
        assert!(world.dispatch(Some(2), hold(tool, 2, 1.1), 1.1).is_none());

        assert_eq!(world.tool(tool).unwrap().holder, Some(1));
    }

    #[test]
    fn test_hold_on_behalf_of_other_dropped() {
        let mut world = WorldState::new();
        let tool = world.spawn_tool();

        assert!(world.dispatch(Some(1), hold(tool, 2, 1.0), 1.0).is_none());
        assert!(!world.tool(tool).unwrap().is_held());
    }

    #[test]
    fn test_use_requires_holder() {
        let mut world = WorldState::new();
        let tool = world.spawn_tool();

        let swing = tool_request(tool, ToolAction::Use { time: 2.0 });
        assert!(world.dispatch(Some(1), swing.clone(), 2.0).is_none());

        world.dispatch(Some(1), hold(tool, 1, 1.0), 1.0);
        assert!(world.dispatch(Some(2), swing.clone(), 2.0).is_none());

        let snapshot = world.dispatch(Some(1), swing, 2.0).unwrap();
        match snapshot.state {
            ObjectState::Tool(state) => assert_approx_eq!(state.last_used_at, 2.0),
            _ => panic!("Wrong object kind"),
        }
    }

    #[test]
    fn test_release_by_non_holder_dropped() {
        let mut world = WorldState::new();
        let tool = world.spawn_tool();
        world.dispatch(Some(1), hold(tool, 1, 1.0), 1.0);

        assert!(world
            .dispatch(Some(2), tool_request(tool, ToolAction::Release), 2.0)
            .is_none());
        assert!(world
            .dispatch(None, tool_request(tool, ToolAction::Release), 2.0)
            .is_some());
        assert!(!world.tool(tool).unwrap().is_held());
    }

    #[test]
    fn test_release_idle_tool_unchanged() {
        let mut world = WorldState::new();
        let tool = world.spawn_tool();

        assert!(world
            .dispatch(Some(1), tool_request(tool, ToolAction::Release), 1.0)
            .is_none());
        assert_eq!(world.snapshot(tool).unwrap().version, 0);
    }

    #[test]
    fn test_fall_schedules_respawn() {
        let mut world = WorldState::new();
        let tree = world.spawn_resource(ResourceFields {
            respawn_timer_seconds: Some(30.0),
        });

        world.dispatch(Some(1), hit(tree, 48.0), 48.0);
        world.dispatch(Some(1), hit(tree, 49.0), 49.0);
        assert_eq!(world.pending_respawn(tree), None);
        world.dispatch(Some(1), hit(tree, 50.0), 50.0);

        assert_eq!(world.resource(tree).unwrap().health, 0);
        assert_eq!(world.pending_respawn(tree), Some(80.0));

        assert!(world.tick(79.0).is_empty());
        let respawned = world.tick(80.0);
        assert_eq!(respawned.len(), 1);
        assert_eq!(world.resource(tree).unwrap().health, MAX_HEALTH);
        assert_eq!(world.pending_respawn(tree), None);
    }

    #[test]
    fn test_hit_on_fallen_resource_dropped() {
        let mut world = WorldState::new();
        let tree = world.spawn_resource(ResourceFields::default());
        for t in 0..3 {
            world.dispatch(Some(1), hit(tree, t as f64), t as f64);
        }
        let version = world.snapshot(tree).unwrap().version;

        assert!(world.dispatch(Some(1), hit(tree, 4.0), 4.0).is_none());
        assert_eq!(world.snapshot(tree).unwrap().version, version);
    }

    #[test]
    fn test_manual_respawn_cancels_timer() {
        let mut world = WorldState::new();
        let tree = world.spawn_resource(ResourceFields::default());
        for t in 0..3 {
            world.dispatch(Some(1), hit(tree, t as f64), t as f64);
        }
        assert_eq!(world.pending_respawn(tree), Some(2.0 + DEFAULT_RESPAWN_SECONDS));

        let respawn = Request {
            entity: tree,
            action: ObjectAction::Resource(ResourceAction::Respawn),
        };
        assert!(world.dispatch(Some(2), respawn, 5.0).is_some());
        assert_eq!(world.pending_respawn(tree), None);
        assert!(world.tick(1000.0).is_empty());
    }

    #[test]
    fn test_respawn_timer_read_at_fall_time() {
        let mut world = WorldState::new();
        let tree = world.spawn_resource(ResourceFields {
            respawn_timer_seconds: Some(10.0),
        });
        for t in 0..3 {
            world.dispatch(Some(1), hit(tree, t as f64), t as f64);
        }
        assert!(world.set_respawn_timer(tree, Some(60.0)));

        assert_eq!(world.pending_respawn(tree), Some(12.0));
    }

    #[test]
    fn test_non_positive_timer_uses_default() {
        let fields = ResourceFields {
            respawn_timer_seconds: Some(0.0),
        };
        assert_approx_eq!(fields.respawn_delay(), DEFAULT_RESPAWN_SECONDS);
        assert_approx_eq!(ResourceFields::default().respawn_delay(), 30.0);
    }

    #[test]
    fn test_mismatched_kind_dropped() {
        let mut world = WorldState::new();
        let tool = world.spawn_tool();

        assert!(world.dispatch(Some(1), hit(tool, 1.0), 1.0).is_none());
    }
}
