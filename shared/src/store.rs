//! Replicated state store
//!
//! Every object instance owns one small state record and a closed set of
//! named actions. Any participant may dispatch an action, but only the
//! authority executes it; replicas forward the action and later adopt the
//! authoritative snapshot. Each accepted mutation bumps a per-object version
//! so replicas apply one object's changes in the authority's order and drop
//! stale or duplicate snapshots.
//!
//! Actions are pure `(state, args) -> state` transitions. Sounds, emotes and
//! attachment are reactions to the replicated change, never part of the
//! action itself.

use crate::{ActorId, EntityId, Timestamp};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Loosely typed argument for dispatching an action by name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActionArg {
    Actor(ActorId),
    Time(Timestamp),
}

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("unknown action '{name}' for {kind} store")]
    UnknownAction { kind: &'static str, name: String },
    #[error("action '{name}' expects ({expected}), got {got:?}")]
    BadArguments {
        name: &'static str,
        expected: &'static str,
        got: Vec<ActionArg>,
    },
}

/// A member of an object's closed action set.
pub trait Action: Sized + Clone + Debug {
    fn name(&self) -> &'static str;

    /// Resolves a named call into a typed action.
    ///
    /// Unknown names are programming errors on the caller's side and must
    /// abort the calling operation.
    fn from_call(name: &str, args: &[ActionArg]) -> Result<Self, StoreError>;
}

/// A replicated state record with its action set.
pub trait StoreState: Clone + Debug + Default + PartialEq {
    type Action: Action;
    type Field: Copy + Debug + PartialEq + Eq + 'static;

    const KIND: &'static str;
    /// Every field of the record, used when an observer starts watching.
    const FIELDS: &'static [Self::Field];

    fn apply(&mut self, action: &Self::Action);

    /// Fields whose value differs from `previous`.
    fn changed_fields(&self, previous: &Self) -> Vec<Self::Field>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authority,
    Replica,
}

/// Notification that an object's replicated state moved to a new version.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<F> {
    pub entity: EntityId,
    pub version: u64,
    pub fields: Vec<F>,
}

impl<F: PartialEq> Change<F> {
    pub fn touches(&self, field: F) -> bool {
        self.fields.contains(&field)
    }
}

/// Outcome of a dispatch on one participant.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched<A, F> {
    /// The authority ran the action and the state changed.
    Applied(Change<F>),
    /// The authority ran the action and nothing changed.
    Unchanged,
    /// A replica handed the action on to the authority.
    Forwarded(A),
}

#[derive(Debug, Clone)]
pub struct ReplicatedStore<S: StoreState> {
    entity: EntityId,
    role: Role,
    state: S,
    version: u64,
}

impl<S: StoreState> ReplicatedStore<S> {
    /// Creates a store holding the initial state of a freshly spawned object.
    pub fn new(entity: EntityId, role: Role) -> Self {
        Self::with_state(entity, role, S::default(), 0)
    }

    pub fn with_state(entity: EntityId, role: Role, state: S, version: u64) -> Self {
        Self {
            entity,
            role,
            state,
            version,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn dispatch(&mut self, action: S::Action) -> Dispatched<S::Action, S::Field> {
        if self.role == Role::Replica {
            return Dispatched::Forwarded(action);
        }

        let previous = self.state.clone();
        self.state.apply(&action);
        let fields = self.state.changed_fields(&previous);

        if fields.is_empty() {
            debug!(
                "{} {}: '{}' left state unchanged",
                S::KIND,
                self.entity,
                action.name()
            );
            return Dispatched::Unchanged;
        }

        self.version += 1;
        Dispatched::Applied(Change {
            entity: self.entity,
            version: self.version,
            fields,
        })
    }

    pub fn dispatch_named(
        &mut self,
        name: &str,
        args: &[ActionArg],
    ) -> Result<Dispatched<S::Action, S::Field>, StoreError> {
        let action = S::Action::from_call(name, args)?;
        Ok(self.dispatch(action))
    }

    /// Adopts an authoritative snapshot on a replica.
    ///
    /// Returns `None` for snapshots that are not newer than what this replica
    /// already holds.
    pub fn apply_snapshot(&mut self, version: u64, state: S) -> Option<Change<S::Field>> {
        if self.role == Role::Authority {
            warn!(
                "{} {}: authority ignoring snapshot v{}",
                S::KIND,
                self.entity,
                version
            );
            return None;
        }
        if version <= self.version {
            debug!(
                "{} {}: dropping stale snapshot v{} (have v{})",
                S::KIND,
                self.entity,
                version,
                self.version
            );
            return None;
        }

        let fields = state.changed_fields(&self.state);
        self.state = state;
        self.version = version;

        Some(Change {
            entity: self.entity,
            version,
            fields,
        })
    }
}
