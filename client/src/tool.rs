//! Observer-side view of a pick-up tool
//!
//! Turns pointer input into `hold`/`use`/`release` requests and reacts to
//! replicated holder and usage changes: hand attachment, swing feedback and
//! the pickup/drop announcements resources rely on.

use crate::bus::{Bus, Signal, Subscription};
use crate::host::{Effect, Host, Mesh, PointerEvent};
use log::{debug, trace};
use shared::store::{Dispatched, ReplicatedStore, Role, StoreState};
use shared::tool::{ToolAction, ToolField, ToolState};
use shared::{EntityId, ObjectAction, Request, Timestamp, Tuning, NEVER};

/// What a pointer-down on the tool itself would do for the local actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Take,
    Place,
}

pub struct ToolView {
    store: ReplicatedStore<ToolState>,
    bus: Bus,
    subscription: Subscription,
    tuning: Tuning,
    /// Local swing throttle, world time before which pointer-downs are ignored
    next_use_at: Timestamp,
}

impl ToolView {
    /// Starts observing a tool and replays its current state as if every
    /// field had just changed.
    pub fn new(
        host: &mut dyn Host,
        entity: EntityId,
        version: u64,
        state: ToolState,
        bus: &Bus,
        tuning: Tuning,
    ) -> Self {
        let mut view = Self {
            store: ReplicatedStore::with_state(entity, Role::Replica, state, version),
            bus: bus.clone(),
            subscription: bus.subscribe(),
            tuning,
            next_use_at: NEVER,
        };
        view.react(host, &ToolState::default(), ToolState::FIELDS);
        view
    }

    pub fn entity(&self) -> EntityId {
        self.store.entity()
    }

    pub fn state(&self) -> &ToolState {
        self.store.state()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    /// Next bus signal this view has not handled yet.
    pub fn next_signal(&mut self) -> Option<Signal> {
        self.subscription.next()
    }

    pub fn affordance(&self, host: &dyn Host) -> Option<Affordance> {
        match (self.state().holder, host.local_actor()) {
            (None, Some(_)) => Some(Affordance::Take),
            (Some(holder), Some(local)) if holder == local => Some(Affordance::Place),
            _ => None,
        }
    }

    fn held_by_local(&self, host: &dyn Host) -> bool {
        host.local_actor()
            .map_or(false, |actor| self.state().is_held_by(actor))
    }

    /// Pointer-down aimed at this tool or its stand.
    pub fn interact(&mut self, host: &mut dyn Host, event: &PointerEvent, outbox: &mut Vec<Request>) {
        if event.distance > self.tuning.take_distance {
            trace!("Tool {}: pointer out of reach ({:.2})", self.entity(), event.distance);
            return;
        }
        let Some(actor) = host.local_actor() else {
            return;
        };

        match (self.affordance(host), event.mesh) {
            (Some(Affordance::Take), Mesh::Tool | Mesh::Stand) => {
                // Announce first so any tool already in hand lets go
                self.bus.publish(Signal::Held {
                    actor,
                    tool: self.entity(),
                });
                let time = host.now();
                self.request(host, ToolAction::Hold { actor, time }, outbox);
            }
            (Some(Affordance::Place), Mesh::Stand) => {
                self.request(host, ToolAction::Release, outbox);
            }
            _ => {}
        }
    }

    /// Pointer-down anywhere in the world. Only the holder's view swings.
    pub fn pointer_down(
        &mut self,
        host: &mut dyn Host,
        event: &PointerEvent,
        outbox: &mut Vec<Request>,
    ) {
        if !self.held_by_local(host) {
            return;
        }
        let now = host.now();
        if now < self.next_use_at {
            trace!("Tool {}: swing throttled until {:.2}", self.entity(), self.next_use_at);
            return;
        }

        let within_take = event.distance <= self.tuning.take_distance;
        if within_take && matches!(event.mesh, Mesh::Stand | Mesh::Tool) {
            return;
        }

        if event.mesh == Mesh::Trunk && event.distance <= self.tuning.chop_distance {
            if let (Some(resource), Some(actor)) = (event.entity, host.local_actor()) {
                self.bus.publish(Signal::Chop { actor, resource });
            }
        }

        self.request(host, ToolAction::Use { time: now }, outbox);
        self.next_use_at = now + self.tuning.use_cooldown;
    }

    pub fn handle_signal(&mut self, host: &mut dyn Host, signal: &Signal, outbox: &mut Vec<Request>) {
        match *signal {
            Signal::Held { actor, tool } if tool != self.entity() => {
                if host.local_actor() == Some(actor) && self.state().is_held_by(actor) {
                    debug!("Tool {}: letting go for tool {}", self.entity(), tool);
                    self.request(host, ToolAction::Release, outbox);
                }
            }
            Signal::PickupQuery { actor } => {
                if self.state().is_held_by(actor) {
                    self.bus.publish(Signal::PickupAck {
                        actor,
                        tool: self.entity(),
                    });
                }
            }
            _ => {}
        }
    }

    /// Adopts an authoritative snapshot and reacts to what changed.
    pub fn apply_snapshot(&mut self, host: &mut dyn Host, version: u64, state: ToolState) {
        let previous = self.state().clone();
        if let Some(change) = self.store.apply_snapshot(version, state) {
            self.react(host, &previous, &change.fields);
        }
    }

    /// Runs `action` through the local store, queueing it for the authority on a replica.
    pub fn request(&mut self, host: &mut dyn Host, action: ToolAction, outbox: &mut Vec<Request>) {
        let previous = self.state().clone();
        match self.store.dispatch(action) {
            Dispatched::Forwarded(action) => outbox.push(Request {
                entity: self.entity(),
                action: ObjectAction::Tool(action),
            }),
            Dispatched::Applied(change) => self.react(host, &previous, &change.fields),
            Dispatched::Unchanged => {}
        }
    }

    fn react(&mut self, host: &mut dyn Host, previous: &ToolState, fields: &[ToolField]) {
        let entity = self.entity();
        let local = host.local_actor();

        if fields.contains(&ToolField::Holder) {
            match self.state().holder {
                Some(actor) => {
                    host.present(entity, Effect::AttachToHand { actor });
                    if local == Some(actor) {
                        self.bus.publish(Signal::PickupAck { actor, tool: entity });
                    }
                }
                None => host.present(entity, Effect::ReturnToStand),
            }

            if let Some(actor) = local {
                if previous.is_held_by(actor) && !self.state().is_held_by(actor) {
                    self.bus.publish(Signal::DropAck { actor, tool: entity });
                }
            }
            self.next_use_at = NEVER;
        }

        if fields.contains(&ToolField::LastUsedAt) {
            let age = host.now() - self.state().last_used_at;
            if age <= self.tuning.freshness_window {
                if self.held_by_local(host) {
                    host.present(entity, Effect::SwingEmote);
                }
                host.present(entity, Effect::SwingSound);
            } else {
                trace!("Tool {}: swing {:.2}s old, not replayed", entity, age);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;

    fn held(actor: u32, since: f64) -> ToolState {
        ToolState {
            holder: Some(actor),
            held_since: since,
            last_used_at: NEVER,
        }
    }

    fn view(host: &mut RecordingHost, state: ToolState, bus: &Bus) -> ToolView {
        ToolView::new(host, 1, 1, state, bus, Tuning::default())
    }

    #[test]
    fn test_affordance_follows_holder() {
        let bus = Bus::new();
        let mut host = RecordingHost::new(7, 10.0);

        let idle = view(&mut host, ToolState::default(), &bus);
        assert_eq!(idle.affordance(&host), Some(Affordance::Take));

        let mine = view(&mut host, held(7, 5.0), &bus);
        assert_eq!(mine.affordance(&host), Some(Affordance::Place));

        let theirs = view(&mut host, held(8, 5.0), &bus);
        assert_eq!(theirs.affordance(&host), None);
    }

    #[test]
    fn test_take_announces_then_requests_hold() {
        let bus = Bus::new();
        let mut probe = bus.subscribe();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, ToolState::default(), &bus);
        let mut outbox = Vec::new();

        tool.interact(&mut host, &PointerEvent::on(1, Mesh::Tool, 2.0), &mut outbox);

        assert_eq!(probe.next(), Some(Signal::Held { actor: 7, tool: 1 }));
        assert_eq!(
            outbox,
            vec![Request {
                entity: 1,
                action: ObjectAction::Tool(ToolAction::Hold {
                    actor: 7,
                    time: 10.0
                }),
            }]
        );
        // Nothing changes locally until the authority answers
        assert!(!tool.state().is_held());
    }

    #[test]
    fn test_take_out_of_reach_is_ignored() {
        let bus = Bus::new();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, ToolState::default(), &bus);
        let mut outbox = Vec::new();

        tool.interact(&mut host, &PointerEvent::on(1, Mesh::Tool, 6.0), &mut outbox);

        assert!(outbox.is_empty());
    }

    #[test]
    fn test_place_on_stand_requests_release() {
        let bus = Bus::new();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, held(7, 5.0), &bus);
        let mut outbox = Vec::new();

        tool.interact(&mut host, &PointerEvent::on(1, Mesh::Stand, 1.0), &mut outbox);

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].action, ObjectAction::Tool(ToolAction::Release));
    }

    #[test]
    fn test_swing_is_throttled() {
        let bus = Bus::new();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, held(7, 5.0), &bus);
        let mut outbox = Vec::new();

        tool.pointer_down(&mut host, &PointerEvent::miss(), &mut outbox);
        host.time = 10.2;
        tool.pointer_down(&mut host, &PointerEvent::miss(), &mut outbox);
        host.time = 10.5;
        tool.pointer_down(&mut host, &PointerEvent::miss(), &mut outbox);

        let uses: Vec<_> = outbox
            .iter()
            .map(|request| request.action.clone())
            .collect();
        assert_eq!(
            uses,
            vec![
                ObjectAction::Tool(ToolAction::Use { time: 10.0 }),
                ObjectAction::Tool(ToolAction::Use { time: 10.5 }),
            ]
        );
    }

    #[test]
    fn test_swing_at_trunk_in_range_chops() {
        let bus = Bus::new();
        let mut probe = bus.subscribe();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, held(7, 5.0), &bus);
        let mut outbox = Vec::new();

        tool.pointer_down(&mut host, &PointerEvent::on(2, Mesh::Trunk, 1.0), &mut outbox);

        assert_eq!(probe.next(), Some(Signal::Chop { actor: 7, resource: 2 }));
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_swing_at_distant_trunk_does_not_chop() {
        let bus = Bus::new();
        let mut probe = bus.subscribe();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, held(7, 5.0), &bus);
        let mut outbox = Vec::new();

        tool.pointer_down(&mut host, &PointerEvent::on(2, Mesh::Trunk, 3.0), &mut outbox);

        assert_eq!(probe.next(), None);
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn test_stand_click_is_not_a_swing() {
        let bus = Bus::new();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, held(7, 5.0), &bus);
        let mut outbox = Vec::new();

        tool.pointer_down(&mut host, &PointerEvent::on(1, Mesh::Stand, 2.0), &mut outbox);

        assert!(outbox.is_empty());
    }

    #[test]
    fn test_non_holder_never_swings() {
        let bus = Bus::new();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, held(8, 5.0), &bus);
        let mut outbox = Vec::new();

        tool.pointer_down(&mut host, &PointerEvent::miss(), &mut outbox);

        assert!(outbox.is_empty());
    }

    #[test]
    fn test_other_tool_held_releases_this_one() {
        let bus = Bus::new();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, held(7, 5.0), &bus);
        let mut outbox = Vec::new();

        tool.handle_signal(&mut host, &Signal::Held { actor: 7, tool: 9 }, &mut outbox);
        assert_eq!(outbox[0].action, ObjectAction::Tool(ToolAction::Release));

        outbox.clear();
        tool.handle_signal(&mut host, &Signal::Held { actor: 7, tool: 1 }, &mut outbox);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_holder_change_attaches_and_acks() {
        let bus = Bus::new();
        let mut probe = bus.subscribe();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, ToolState::default(), &bus);
        assert!(host.saw(1, Effect::ReturnToStand));

        tool.apply_snapshot(&mut host, 2, held(7, 10.0));
        assert!(host.saw(1, Effect::AttachToHand { actor: 7 }));
        assert_eq!(probe.next(), Some(Signal::PickupAck { actor: 7, tool: 1 }));

        tool.apply_snapshot(&mut host, 3, ToolState::default());
        assert_eq!(probe.next(), Some(Signal::DropAck { actor: 7, tool: 1 }));
    }

    #[test]
    fn test_fresh_swing_plays_and_stale_swing_is_silent() {
        let bus = Bus::new();
        let mut host = RecordingHost::new(7, 10.0);
        let mut tool = view(&mut host, held(7, 5.0), &bus);

        let mut swung = held(7, 5.0);
        swung.last_used_at = 9.5;
        tool.apply_snapshot(&mut host, 2, swung.clone());
        assert!(host.saw(1, Effect::SwingSound));
        assert!(host.saw(1, Effect::SwingEmote));

        host.clear();
        let mut late = RecordingHost::new(8, 20.0);
        let _observer = view(&mut late, swung, &bus);
        assert!(!late.saw(1, Effect::SwingSound));
        assert!(late.saw(1, Effect::AttachToHand { actor: 7 }));
    }
}
