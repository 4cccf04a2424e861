use crate::store::{Action, ActionArg, StoreError, StoreState};
use crate::{ActorId, Timestamp, NEVER};
use serde::{Deserialize, Serialize};

/// Replicated state of a pick-up tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    /// Actor holding the tool, `None` while it rests on its stand
    pub holder: Option<ActorId>,
    /// World time the current hold began
    pub held_since: Timestamp,
    /// World time of the holder's latest swing
    pub last_used_at: Timestamp,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            holder: None,
            held_since: NEVER,
            last_used_at: NEVER,
        }
    }
}

impl ToolState {
    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    pub fn is_held_by(&self, actor: ActorId) -> bool {
        self.holder == Some(actor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolAction {
    Hold { actor: ActorId, time: Timestamp },
    Use { time: Timestamp },
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolField {
    Holder,
    HeldSince,
    LastUsedAt,
}

impl Action for ToolAction {
    fn name(&self) -> &'static str {
        match self {
            ToolAction::Hold { .. } => "hold",
            ToolAction::Use { .. } => "use",
            ToolAction::Release => "release",
        }
    }

    fn from_call(name: &str, args: &[ActionArg]) -> Result<Self, StoreError> {
        match (name, args) {
            ("hold", [ActionArg::Actor(actor), ActionArg::Time(time)]) => Ok(ToolAction::Hold {
                actor: *actor,
                time: *time,
            }),
            ("hold", _) => Err(StoreError::BadArguments {
                name: "hold",
                expected: "actor, time",
                got: args.to_vec(),
            }),
            ("use", [ActionArg::Time(time)]) => Ok(ToolAction::Use { time: *time }),
            ("use", _) => Err(StoreError::BadArguments {
                name: "use",
                expected: "time",
                got: args.to_vec(),
            }),
            ("release", []) => Ok(ToolAction::Release),
            ("release", _) => Err(StoreError::BadArguments {
                name: "release",
                expected: "",
                got: args.to_vec(),
            }),
            _ => Err(StoreError::UnknownAction {
                kind: ToolState::KIND,
                name: name.to_string(),
            }),
        }
    }
}

impl StoreState for ToolState {
    type Action = ToolAction;
    type Field = ToolField;

    const KIND: &'static str = "tool";
    const FIELDS: &'static [ToolField] =
        &[ToolField::Holder, ToolField::HeldSince, ToolField::LastUsedAt];

    fn apply(&mut self, action: &ToolAction) {
        match *action {
            ToolAction::Hold { actor, time } => {
                self.holder = Some(actor);
                self.held_since = time;
                self.last_used_at = NEVER;
            }
            ToolAction::Use { time } => {
                self.last_used_at = time;
            }
            ToolAction::Release => {
                self.holder = None;
                self.held_since = NEVER;
                self.last_used_at = NEVER;
            }
        }
    }

    fn changed_fields(&self, previous: &Self) -> Vec<ToolField> {
        let mut fields = Vec::new();
        if self.holder != previous.holder {
            fields.push(ToolField::Holder);
        }
        if self.held_since != previous.held_since {
            fields.push(ToolField::HeldSince);
        }
        if self.last_used_at != previous.last_used_at {
            fields.push(ToolField::LastUsedAt);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Dispatched, ReplicatedStore, Role};
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_initial_tool_state() {
        let state = ToolState::default();
        assert!(!state.is_held());
        assert_eq!(state.held_since, NEVER);
        assert_eq!(state.last_used_at, NEVER);
    }

    #[test]
    fn test_hold_use_release() {
        let mut state = ToolState::default();

        state.apply(&ToolAction::Hold { actor: 3, time: 10.0 });
        assert!(state.is_held_by(3));
        assert!(!state.is_held_by(4));
        assert_approx_eq!(state.held_since, 10.0);

        state.apply(&ToolAction::Use { time: 10.1 });
        assert_approx_eq!(state.last_used_at, 10.1);

        state.apply(&ToolAction::Release);
        assert_eq!(state, ToolState::default());
    }

    #[test]
    fn test_hold_clears_previous_use() {
        let mut state = ToolState::default();
        state.apply(&ToolAction::Hold { actor: 1, time: 1.0 });
        state.apply(&ToolAction::Use { time: 2.0 });
        state.apply(&ToolAction::Hold { actor: 1, time: 5.0 });

        assert_eq!(state.last_used_at, NEVER);
        assert_approx_eq!(state.held_since, 5.0);
    }

    #[test]
    fn test_release_on_idle_tool_is_noop() {
        let mut store = ReplicatedStore::<ToolState>::new(1, Role::Authority);

        assert_eq!(store.dispatch(ToolAction::Release), Dispatched::Unchanged);
        assert_eq!(store.state(), &ToolState::default());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_changed_fields_on_hold() {
        let previous = ToolState::default();
        let mut state = previous.clone();
        state.apply(&ToolAction::Hold { actor: 2, time: 4.0 });

        assert_eq!(
            state.changed_fields(&previous),
            vec![ToolField::Holder, ToolField::HeldSince]
        );
    }

    #[test]
    fn test_from_call() {
        assert_eq!(
            ToolAction::from_call("hold", &[ActionArg::Actor(5), ActionArg::Time(1.5)]),
            Ok(ToolAction::Hold { actor: 5, time: 1.5 })
        );
        assert_eq!(
            ToolAction::from_call("release", &[]),
            Ok(ToolAction::Release)
        );
        assert!(matches!(
            ToolAction::from_call("use", &[ActionArg::Actor(5)]),
            Err(StoreError::BadArguments { name: "use", .. })
        ));
        assert!(matches!(
            ToolAction::from_call("throw", &[]),
            Err(StoreError::UnknownAction { kind: "tool", .. })
        ));
    }
}
