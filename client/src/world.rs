//! Client-side world: every object view of one participant plus its bus
//!
//! Snapshots from the authority and local pointer input enter here. Each
//! entry point drains the bus afterwards so signal cascades (take, release
//! of the previous tool, pickup acknowledgements) settle before returning.

use crate::bus::Bus;
use crate::host::{Host, PointerEvent};
use crate::resource::ResourceView;
use crate::tool::ToolView;
use log::{debug, warn};
use shared::resource::{ResourceAction, ResourceState};
use shared::store::{Action, ActionArg, StoreError};
use shared::tool::{ToolAction, ToolState};
use shared::{EntityId, ObjectSnapshot, ObjectState, Request, Tuning};
use std::collections::BTreeMap;

/// Upper bound on bus drain rounds per entry point.
const MAX_PUMP_ROUNDS: usize = 32;

pub struct ClientWorld {
    tuning: Tuning,
    bus: Bus,
    tools: BTreeMap<EntityId, ToolView>,
    resources: BTreeMap<EntityId, ResourceView>,
    outbox: Vec<Request>,
}

impl ClientWorld {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            tuning,
            bus: Bus::new(),
            tools: BTreeMap::new(),
            resources: BTreeMap::new(),
            outbox: Vec::new(),
        }
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn tool(&self, entity: EntityId) -> Option<&ToolView> {
        self.tools.get(&entity)
    }

    pub fn resource(&self, entity: EntityId) -> Option<&ResourceView> {
        self.resources.get(&entity)
    }

    /// Starts observing every object in a join welcome.
    pub fn load(&mut self, host: &mut dyn Host, objects: Vec<ObjectSnapshot>) {
        for snapshot in objects {
            self.observe(host, snapshot);
        }
        self.pump(host);
    }

    /// Applies one authoritative snapshot, spawning a view for unseen objects.
    pub fn apply(&mut self, host: &mut dyn Host, snapshot: ObjectSnapshot) {
        self.observe(host, snapshot);
        self.pump(host);
    }

    fn observe(&mut self, host: &mut dyn Host, snapshot: ObjectSnapshot) {
        let ObjectSnapshot {
            entity,
            version,
            state,
        } = snapshot;

        match state {
            ObjectState::Tool(state) => {
                if let Some(view) = self.tools.get_mut(&entity) {
                    view.apply_snapshot(host, version, state);
                } else if self.resources.contains_key(&entity) {
                    warn!("Entity {} is a resource, ignoring tool snapshot", entity);
                } else {
                    debug!("Observing tool {} at v{}", entity, version);
                    let view = ToolView::new(host, entity, version, state, &self.bus, self.tuning);
                    self.tools.insert(entity, view);
                }
            }
            ObjectState::Resource(state) => {
                if let Some(view) = self.resources.get_mut(&entity) {
                    view.apply_snapshot(host, version, state);
                } else if self.tools.contains_key(&entity) {
                    warn!("Entity {} is a tool, ignoring resource snapshot", entity);
                } else {
                    debug!("Observing resource {} at v{}", entity, version);
                    let view =
                        ResourceView::new(host, entity, version, state, &self.bus, self.tuning);
                    self.resources.insert(entity, view);
                }
            }
        }
    }

    /// Routes a pointer-down: first to the object that was hit, then to
    /// every tool so the one in hand can swing.
    pub fn pointer_down(&mut self, host: &mut dyn Host, event: PointerEvent) {
        if let Some(entity) = event.entity {
            if let Some(tool) = self.tools.get_mut(&entity) {
                tool.interact(host, &event, &mut self.outbox);
            } else if let Some(resource) = self.resources.get_mut(&entity) {
                resource.interact(host, &event);
            }
        }

        for tool in self.tools.values_mut() {
            tool.pointer_down(host, &event, &mut self.outbox);
        }

        self.pump(host);
    }

    /// Returns false if `entity` is not a known resource.
    pub fn force_respawn(&mut self, host: &mut dyn Host, entity: EntityId) -> bool {
        let Some(resource) = self.resources.get_mut(&entity) else {
            return false;
        };
        resource.force_respawn(host, &mut self.outbox);
        self.pump(host);
        true
    }

    /// Dispatches an action by name on one object.
    ///
    /// Returns `Ok(false)` for an unknown entity. A name outside the object's
    /// action set is an error and nothing is dispatched.
    pub fn dispatch_named(
        &mut self,
        host: &mut dyn Host,
        entity: EntityId,
        name: &str,
        args: &[ActionArg],
    ) -> Result<bool, StoreError> {
        if let Some(tool) = self.tools.get_mut(&entity) {
            let action = ToolAction::from_call(name, args)?;
            tool.request(host, action, &mut self.outbox);
        } else if let Some(resource) = self.resources.get_mut(&entity) {
            let action = ResourceAction::from_call(name, args)?;
            resource.request(host, action, &mut self.outbox);
        } else {
            return Ok(false);
        }

        self.pump(host);
        Ok(true)
    }

    /// Requests queued for the authority since the last call.
    pub fn take_outbox(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.outbox)
    }

    /// One line per observed object, for the console.
    pub fn status(&self) -> Vec<String> {
        let tools = self.tools.values().map(|view| describe_tool(view.entity(), view.version(), view.state()));
        let resources = self.resources.values().map(|view| {
            describe_resource(view.entity(), view.version(), view.state(), view.has_tool())
        });
        tools.chain(resources).collect()
    }

    /// Delivers pending bus signals until every view is quiet.
    pub fn pump(&mut self, host: &mut dyn Host) {
        for _ in 0..MAX_PUMP_ROUNDS {
            let mut handled = 0;

            for tool in self.tools.values_mut() {
                while let Some(signal) = tool.next_signal() {
                    tool.handle_signal(host, &signal, &mut self.outbox);
                    handled += 1;
                }
            }
            for resource in self.resources.values_mut() {
                while let Some(signal) = resource.next_signal() {
                    resource.handle_signal(host, &signal, &mut self.outbox);
                    handled += 1;
                }
            }

            if handled == 0 {
                return;
            }
        }
        warn!("Bus still busy after {} rounds", MAX_PUMP_ROUNDS);
    }
}

fn describe_tool(entity: EntityId, version: u64, state: &ToolState) -> String {
    match state.holder {
        Some(actor) => format!(
            "tool {} v{}: held by {} since {:.1}",
            entity, version, actor, state.held_since
        ),
        None => format!("tool {} v{}: on stand", entity, version),
    }
}

fn describe_resource(entity: EntityId, version: u64, state: &ResourceState, has_tool: bool) -> String {
    format!(
        "resource {} v{}: health {} ({:?}), tool in hand: {}",
        entity,
        version,
        state.health,
        state.phase(),
        has_tool
    )
}
