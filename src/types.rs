//! Configuration and UI-boundary types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::goal::{Goal, GoalState};
use crate::pending::SyncState;

/// Configuration stored in ~/.goaldeck/config.json
///
/// Accepts `dataDir` and the older `data_dir` key for backwards
/// compatibility with pre-1.0 config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory holding the database; defaults to `~/.goaldeck`.
    #[serde(default, alias = "data_dir", skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Use the isolated dev database instead of the live one.
    #[serde(default)]
    pub dev_mode: bool,
    /// How many days back the "pull from previous day" picker looks.
    #[serde(default = "default_pull_lookback")]
    pub pull_lookback_days: u32,
    #[serde(default)]
    pub features: HashMap<String, bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            dev_mode: false,
            pull_lookback_days: default_pull_lookback(),
            features: HashMap::new(),
        }
    }
}

fn default_pull_lookback() -> u32 {
    7
}

/// One goal row as a list view renders it: entity, week-scoped state, and
/// the coordinator's reconciliation state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalView {
    pub goal: Goal,
    pub state: GoalState,
    pub sync: SyncState,
}

/// Completion stats for a week's daily goals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekStats {
    pub completed: usize,
    pub total: usize,
}

/// Request payload for creating a goal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalRequest {
    pub title: String,
    pub depth: i8,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub year: i32,
    pub quarter: u8,
    #[serde(default)]
    pub week_number: Option<u8>,
    #[serde(default)]
    pub day_of_week: Option<u8>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Request payload for updating a goal's editable fields.
/// `clear_*` flags distinguish "unset" from "leave alone".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalRequest {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub clear_details: Option<bool>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub clear_due_date: Option<bool>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub clear_domain: Option<bool>,
}
