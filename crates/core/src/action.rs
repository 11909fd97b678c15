//! Action types recorded on service bus events.
//!
//! The action type tells consumers who or what triggered an event. The set
//! is fixed by the service bus API; anything else is rejected at build time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Origin of the action that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    User,
    Admin,
    Api,
    System,
    App,
    Migration,
    Other,
}

impl ActionType {
    /// Every accepted action type, in wire order.
    pub const ALL: [ActionType; 7] = [
        ActionType::User,
        ActionType::Admin,
        ActionType::Api,
        ActionType::System,
        ActionType::App,
        ActionType::Migration,
        ActionType::Other,
    ];

    /// Wire name of the action type.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::User => "user",
            ActionType::Admin => "admin",
            ActionType::Api => "api",
            ActionType::System => "system",
            ActionType::App => "app",
            ActionType::Migration => "migration",
            ActionType::Other => "other",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                CoreError::configuration(format!(
                    "Action type must be one of the following: {} (got '{s}')",
                    allowed.join(", ")
                ))
            })
    }
}
