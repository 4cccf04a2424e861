//! Observer-side view of a choppable resource
//!
//! Tracks which tools the local actor holds from bus announcements, turns
//! chop signals into `hit` requests and presents the standing/fallen model
//! with chop and fall sounds for recent changes.

use crate::bus::{Bus, Signal, Subscription};
use crate::host::{Effect, Host, Mesh, PointerEvent, NEED_TOOL_MESSAGE};
use log::{debug, trace};
use shared::resource::{Phase, ResourceAction, ResourceField, ResourceState};
use shared::store::{Dispatched, ReplicatedStore, Role, StoreState};
use shared::{EntityId, ObjectAction, Request, Tuning};
use std::collections::HashSet;

pub struct ResourceView {
    store: ReplicatedStore<ResourceState>,
    bus: Bus,
    subscription: Subscription,
    tuning: Tuning,
    /// Tools the local actor currently holds, as last announced on the bus
    tools_in_hand: HashSet<EntityId>,
}

impl ResourceView {
    pub fn new(
        host: &mut dyn Host,
        entity: EntityId,
        version: u64,
        state: ResourceState,
        bus: &Bus,
        tuning: Tuning,
    ) -> Self {
        let mut view = Self {
            store: ReplicatedStore::with_state(entity, Role::Replica, state, version),
            bus: bus.clone(),
            subscription: bus.subscribe(),
            tuning,
            tools_in_hand: HashSet::new(),
        };

        // Tools that announced their pickup before this view existed have to
        // be asked again
        if host.now() > tuning.late_spawn_after {
            if let Some(actor) = host.local_actor() {
                debug!("Resource {} spawned late, querying tools", entity);
                view.bus.publish(Signal::PickupQuery { actor });
            }
        }

        view.react(host, ResourceState::FIELDS);
        view
    }

    pub fn entity(&self) -> EntityId {
        self.store.entity()
    }

    pub fn state(&self) -> &ResourceState {
        self.store.state()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    /// Next bus signal this view has not handled yet.
    pub fn next_signal(&mut self) -> Option<Signal> {
        self.subscription.next()
    }

    pub fn has_tool(&self) -> bool {
        !self.tools_in_hand.is_empty()
    }

    /// Pointer-down aimed at this resource.
    pub fn interact(&mut self, host: &mut dyn Host, event: &PointerEvent) {
        if event.mesh != Mesh::Trunk || event.distance > self.tuning.chop_distance {
            return;
        }
        if self.state().phase() == Phase::Standing && !self.has_tool() {
            host.chat(NEED_TOOL_MESSAGE);
        }
    }

    pub fn handle_signal(&mut self, host: &mut dyn Host, signal: &Signal, outbox: &mut Vec<Request>) {
        let local = host.local_actor();
        match *signal {
            Signal::PickupAck { actor, tool } if local == Some(actor) => {
                self.tools_in_hand.insert(tool);
            }
            Signal::DropAck { actor, tool } if local == Some(actor) => {
                self.tools_in_hand.remove(&tool);
            }
            Signal::Chop { actor, resource } if resource == self.entity() => {
                if local != Some(actor) || self.state().phase() == Phase::Fallen {
                    return;
                }
                if !self.has_tool() {
                    debug!("Resource {}: chop without a tool in hand", resource);
                    return;
                }
                let time = host.now();
                self.request(host, ResourceAction::Hit { time }, outbox);
            }
            _ => {}
        }
    }

    /// Operator-triggered reset to full health.
    pub fn force_respawn(&mut self, host: &mut dyn Host, outbox: &mut Vec<Request>) {
        self.request(host, ResourceAction::Respawn, outbox);
    }

    pub fn apply_snapshot(&mut self, host: &mut dyn Host, version: u64, state: ResourceState) {
        if let Some(change) = self.store.apply_snapshot(version, state) {
            self.react(host, &change.fields);
        }
    }

    /// Runs `action` through the local store, queueing it for the authority on a replica.
    pub fn request(
        &mut self,
        host: &mut dyn Host,
        action: ResourceAction,
        outbox: &mut Vec<Request>,
    ) {
        match self.store.dispatch(action) {
            Dispatched::Forwarded(action) => outbox.push(Request {
                entity: self.entity(),
                action: ObjectAction::Resource(action),
            }),
            Dispatched::Applied(change) => self.react(host, &change.fields),
            Dispatched::Unchanged => {}
        }
    }

    fn react(&mut self, host: &mut dyn Host, fields: &[ResourceField]) {
        let entity = self.entity();
        let state = self.state().clone();

        if fields.contains(&ResourceField::Health) {
            match state.phase() {
                Phase::Standing => host.present(entity, Effect::ShowStanding),
                Phase::Fallen => host.present(entity, Effect::ShowFallen),
            }
        }

        let age = host.now() - state.health_changed_at;
        if age > self.tuning.freshness_window {
            trace!("Resource {}: change {:.2}s old, not replayed", entity, age);
            return;
        }
        if fields.contains(&ResourceField::Health) || fields.contains(&ResourceField::HealthChangedAt) {
            host.present(entity, Effect::ChopSound);
            if state.phase() == Phase::Fallen {
                host.present(entity, Effect::FallSound);
            }
        }
    }
}
