use crate::store::{Action, ActionArg, StoreError, StoreState};
use crate::{Timestamp, NEVER};
use serde::{Deserialize, Serialize};

pub const MAX_HEALTH: u8 = 3;

/// Replicated state of a choppable resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Remaining hits, 0 = fallen
    pub health: u8,
    /// World time of the latest hit or reset
    pub health_changed_at: Timestamp,
}

impl Default for ResourceState {
    fn default() -> Self {
        Self {
            health: MAX_HEALTH,
            health_changed_at: NEVER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Standing,
    Fallen,
}

impl ResourceState {
    pub fn phase(&self) -> Phase {
        if self.health == 0 {
            Phase::Fallen
        } else {
            Phase::Standing
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResourceAction {
    Hit { time: Timestamp },
    Respawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceField {
    Health,
    HealthChangedAt,
}

impl Action for ResourceAction {
    fn name(&self) -> &'static str {
        match self {
            ResourceAction::Hit { .. } => "hit",
            ResourceAction::Respawn => "respawn",
        }
    }

    fn from_call(name: &str, args: &[ActionArg]) -> Result<Self, StoreError> {
        match (name, args) {
            ("hit", [ActionArg::Time(time)]) => Ok(ResourceAction::Hit { time: *time }),
            ("hit", _) => Err(StoreError::BadArguments {
                name: "hit",
                expected: "time",
                got: args.to_vec(),
            }),
            ("respawn", []) => Ok(ResourceAction::Respawn),
            ("respawn", _) => Err(StoreError::BadArguments {
                name: "respawn",
                expected: "",
                got: args.to_vec(),
            }),
            _ => Err(StoreError::UnknownAction {
                kind: ResourceState::KIND,
                name: name.to_string(),
            }),
        }
    }
}

impl StoreState for ResourceState {
    type Action = ResourceAction;
    type Field = ResourceField;

    const KIND: &'static str = "resource";
    const FIELDS: &'static [ResourceField] =
        &[ResourceField::Health, ResourceField::HealthChangedAt];

    fn apply(&mut self, action: &ResourceAction) {
        match *action {
            ResourceAction::Hit { time } => {
                self.health = self.health.saturating_sub(1);
                self.health_changed_at = time;
            }
            ResourceAction::Respawn => {
                self.health = MAX_HEALTH;
                self.health_changed_at = NEVER;
            }
        }
    }

    fn changed_fields(&self, previous: &Self) -> Vec<ResourceField> {
        let mut fields = Vec::new();
        if self.health != previous.health {
            fields.push(ResourceField::Health);
        }
        if self.health_changed_at != previous.health_changed_at {
            fields.push(ResourceField::HealthChangedAt);
        }
        fields
    }
}
