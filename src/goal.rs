//! Goal hierarchy model: entities, period references, and the in-memory
//! snapshot the engines compute over.
//!
//! A `Goal` is a node in the quarterly → weekly → daily tree (or a
//! standalone adhoc entry). Mutable per-week status lives in `GoalState`,
//! keyed by `(goal_id, week)` so a quarterly goal can be starred in one
//! week and plain in the next. Engines never touch the store: they read a
//! `GoalSnapshot` the caller loaded and return `StateMutation` /
//! `PeriodReassignment` batches for the caller to persist.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Position of a goal in the hierarchy.
///
/// Stored as an integer: 0 quarterly, 1 weekly, 2 daily, -1 adhoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Depth {
    Quarterly,
    Weekly,
    Daily,
    Adhoc,
}

impl Depth {
    pub fn as_i8(self) -> i8 {
        match self {
            Depth::Quarterly => 0,
            Depth::Weekly => 1,
            Depth::Daily => 2,
            Depth::Adhoc => -1,
        }
    }
}

impl From<Depth> for i8 {
    fn from(d: Depth) -> i8 {
        d.as_i8()
    }
}

impl TryFrom<i8> for Depth {
    type Error = String;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Depth::Quarterly),
            1 => Ok(Depth::Weekly),
            2 => Ok(Depth::Daily),
            -1 => Ok(Depth::Adhoc),
            other => Err(format!("Invalid goal depth: {other}")),
        }
    }
}

/// A week bucket: ISO week-of-year plus the quarter it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRef {
    pub year: i32,
    pub quarter: u8,
    pub week: u8,
}

/// A day bucket inside a week. `day` is 1=Monday .. 7=Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRef {
    pub year: i32,
    pub quarter: u8,
    pub week: u8,
    pub day: u8,
}

impl DayRef {
    pub fn week_ref(&self) -> WeekRef {
        WeekRef {
            year: self.year,
            quarter: self.quarter,
            week: self.week,
        }
    }

    /// Calendar date for this ISO (year, week, day) triple.
    ///
    /// Returns `None` for out-of-range week/day values rather than guessing.
    pub fn date(&self) -> Option<NaiveDate> {
        let weekday = match self.day {
            1 => Weekday::Mon,
            2 => Weekday::Tue,
            3 => Weekday::Wed,
            4 => Weekday::Thu,
            5 => Weekday::Fri,
            6 => Weekday::Sat,
            7 => Weekday::Sun,
            _ => return None,
        };
        NaiveDate::from_isoywd_opt(self.year, self.week as u32, weekday)
    }
}

/// A node in the goal hierarchy.
///
/// `details` is rich text and opaque to every engine. Timestamps are
/// RFC 3339 strings, matching what the store persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub details: Option<String>,
    pub depth: Depth,
    pub parent_id: Option<String>,
    pub year: i32,
    pub quarter: u8,
    pub week_number: Option<u8>,
    pub day_of_week: Option<u8>,
    pub date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Category label for adhoc goals; unused elsewhere.
    pub domain: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Goal {
    pub fn week_ref(&self) -> Option<WeekRef> {
        self.week_number.map(|week| WeekRef {
            year: self.year,
            quarter: self.quarter,
            week,
        })
    }

    pub fn day_ref(&self) -> Option<DayRef> {
        match (self.week_number, self.day_of_week) {
            (Some(week), Some(day)) => Some(DayRef {
                year: self.year,
                quarter: self.quarter,
                week,
                day,
            }),
            _ => None,
        }
    }

    pub fn in_week(&self, week: &WeekRef) -> bool {
        self.year == week.year
            && self.quarter == week.quarter
            && self.week_number == Some(week.week)
    }

    pub fn in_day(&self, day: &DayRef) -> bool {
        self.in_week(&day.week_ref()) && self.day_of_week == Some(day.day)
    }
}

/// Mutable, week-scoped status attached to a goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalState {
    pub is_complete: bool,
    pub is_hard_complete: bool,
    pub is_starred: bool,
    pub is_pinned: bool,
    pub completed_at: Option<String>,
}

impl GoalState {
    /// Rendered completion: soft-complete or manually marked done.
    pub fn is_done(&self) -> bool {
        self.is_complete || self.is_hard_complete
    }

    pub fn has_status(&self) -> bool {
        self.is_starred || self.is_pinned
    }

    /// Set `is_complete`, maintaining the `completed_at` transition rule:
    /// stamped when completion turns on, cleared when it turns off.
    pub fn with_complete(mut self, value: bool, now: &DateTime<Utc>) -> Self {
        if value && !self.is_complete {
            self.completed_at = Some(now.to_rfc3339());
        } else if !value {
            self.completed_at = None;
        }
        self.is_complete = value;
        self
    }
}

/// One status upsert for the store: the full new state for `(goal, week)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMutation {
    pub goal_id: String,
    pub week: WeekRef,
    pub state: GoalState,
}

/// One period reassignment for the store. Only the time bucket moves;
/// the parent edge is untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodReassignment {
    pub goal_id: String,
    pub to: DayRef,
    pub date: Option<NaiveDate>,
}

/// The unit the store write interface accepts: applied as one transaction,
/// visible all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteBatch {
    pub mutations: Vec<StateMutation>,
    pub reassignments: Vec<PeriodReassignment>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.reassignments.is_empty()
    }
}

/// In-memory view of Goal + GoalState rows for the periods a caller loaded.
///
/// Pure query surface; missing state rows read as `GoalState::default()`.
#[derive(Debug, Clone, Default)]
pub struct GoalSnapshot {
    goals: HashMap<String, Goal>,
    states: HashMap<(String, WeekRef), GoalState>,
}

impl GoalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_goal(&mut self, goal: Goal) {
        self.goals.insert(goal.id.clone(), goal);
    }

    pub fn insert_state(&mut self, goal_id: &str, week: WeekRef, state: GoalState) {
        self.states.insert((goal_id.to_string(), week), state);
    }

    pub fn goal(&self, id: &str) -> Option<&Goal> {
        self.goals.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&Goal, EngineError> {
        self.goals
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Status for `(goal, week)`; absent rows are the default (all-false) state.
    pub fn state_of(&self, goal_id: &str, week: &WeekRef) -> GoalState {
        self.states
            .get(&(goal_id.to_string(), *week))
            .cloned()
            .unwrap_or_default()
    }

    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.values()
    }

    /// Daily children of a weekly goal within one week.
    pub fn daily_children_of(&self, weekly_id: &str, week: &WeekRef) -> Vec<&Goal> {
        let mut children: Vec<&Goal> = self
            .goals
            .values()
            .filter(|g| {
                g.depth == Depth::Daily
                    && g.parent_id.as_deref() == Some(weekly_id)
                    && g.in_week(week)
            })
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        children
    }

    /// Walk the parent chain, nearest ancestor first.
    pub fn ancestors_of(&self, id: &str) -> Vec<&Goal> {
        let mut ancestors = Vec::new();
        let mut current = self.goals.get(id).and_then(|g| g.parent_id.as_deref());
        while let Some(pid) = current {
            match self.goals.get(pid) {
                Some(parent) => {
                    ancestors.push(parent);
                    current = parent.parent_id.as_deref();
                }
                None => break,
            }
        }
        ancestors
    }

    /// Daily goals assigned to a week, tree goals only (adhoc excluded).
    pub fn daily_goals_in_week(&self, week: &WeekRef) -> Vec<&Goal> {
        let mut goals: Vec<&Goal> = self
            .goals
            .values()
            .filter(|g| g.depth == Depth::Daily && g.in_week(week))
            .collect();
        goals.sort_by(|a, b| a.id.cmp(&b.id));
        goals
    }

    /// Daily goals assigned to a specific day, tree goals only.
    pub fn daily_goals_in_day(&self, day: &DayRef) -> Vec<&Goal> {
        self.daily_goals_in_week(&day.week_ref())
            .into_iter()
            .filter(|g| g.day_of_week == Some(day.day))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;

    pub fn quarterly(id: &str, title: &str) -> Goal {
        Goal {
            id: id.to_string(),
            title: title.to_string(),
            details: None,
            depth: Depth::Quarterly,
            parent_id: None,
            year: 2026,
            quarter: 1,
            week_number: None,
            day_of_week: None,
            date: None,
            due_date: None,
            domain: None,
            created_at: "2026-01-05T08:00:00Z".to_string(),
            updated_at: "2026-01-05T08:00:00Z".to_string(),
        }
    }

    pub fn weekly(id: &str, title: &str, parent: &str, week: u8) -> Goal {
        Goal {
            depth: Depth::Weekly,
            parent_id: Some(parent.to_string()),
            week_number: Some(week),
            ..quarterly(id, title)
        }
    }

    pub fn daily(id: &str, title: &str, parent: &str, week: u8, day: u8) -> Goal {
        let date = DayRef {
            year: 2026,
            quarter: 1,
            week,
            day,
        }
        .date();
        Goal {
            depth: Depth::Daily,
            parent_id: Some(parent.to_string()),
            week_number: Some(week),
            day_of_week: Some(day),
            date,
            ..quarterly(id, title)
        }
    }

    pub fn adhoc(id: &str, title: &str, domain: &str, week: u8, day: u8) -> Goal {
        Goal {
            depth: Depth::Adhoc,
            parent_id: None,
            week_number: Some(week),
            day_of_week: Some(day),
            domain: Some(domain.to_string()),
            ..quarterly(id, title)
        }
    }

    pub fn week(week: u8) -> WeekRef {
        WeekRef {
            year: 2026,
            quarter: 1,
            week,
        }
    }

    pub fn now() -> DateTime<Utc> {
        "2026-02-03T09:30:00Z".parse().unwrap()
    }
}
