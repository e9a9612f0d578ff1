//! Completion propagation between daily and weekly goals.
//!
//! Daily completion is the single source of truth for leaves. Weekly soft
//! completion derives from daily children; a manual hard-complete flag can
//! override it. The one rule that is easy to lose in a rewrite is named
//! here explicitly: **clearing a child's completion always re-validates the
//! parent's hard-complete flag** (`toggle_daily_goal` clears a stale
//! `is_hard_complete` whenever a child is unchecked).
//!
//! Every function is a pure transform over a provided `GoalSnapshot` with
//! an explicit clock; callers persist the returned mutations.

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::goal::{Depth, Goal, GoalSnapshot, GoalState, StateMutation, WeekRef};

/// Effect of toggling a daily goal: the leaf mutation plus the recomputed
/// parent weekly state, when a parent exists.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyToggleEffect {
    pub daily: StateMutation,
    pub weekly: Option<StateMutation>,
}

/// Outcome of requesting a weekly completion change through the toggle
/// workflow. When `requires_confirmation` is set, no mutation was produced
/// and the caller must come back through [`complete_weekly_goal`].
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyToggleOutcome {
    pub requires_confirmation: bool,
    pub mutations: Vec<StateMutation>,
}

/// The canonical soft-completion rule: a weekly goal is derivably complete
/// iff it has at least one daily child and every child is complete.
/// Zero children never derive to complete.
pub fn derive_weekly_completion(children_complete: &[bool]) -> bool {
    !children_complete.is_empty() && children_complete.iter().all(|c| *c)
}

/// Set a daily goal's completion and recompute its weekly parent.
pub fn toggle_daily_goal(
    snapshot: &GoalSnapshot,
    goal_id: &str,
    new_value: bool,
    now: &DateTime<Utc>,
) -> Result<DailyToggleEffect, EngineError> {
    let goal = snapshot.require(goal_id)?;
    if goal.depth != Depth::Daily {
        return Err(EngineError::InvalidTransition(format!(
            "toggle_daily_goal on non-daily goal {goal_id}"
        )));
    }
    let week = goal
        .week_ref()
        .ok_or_else(|| EngineError::InvalidTransition(format!("daily goal {goal_id} has no week")))?;

    let daily_state = snapshot
        .state_of(goal_id, &week)
        .with_complete(new_value, now);
    let daily = StateMutation {
        goal_id: goal_id.to_string(),
        week,
        state: daily_state,
    };

    let weekly = match goal.parent_id.as_deref() {
        Some(parent_id) => Some(recompute_weekly(
            snapshot, parent_id, &week, goal_id, new_value, now,
        )?),
        None => None,
    };

    Ok(DailyToggleEffect { daily, weekly })
}

/// Recompute a weekly goal's state after one child's completion changed.
///
/// `toggled_id` carries the child's new value, since the snapshot still
/// holds the pre-toggle state.
fn recompute_weekly(
    snapshot: &GoalSnapshot,
    weekly_id: &str,
    week: &WeekRef,
    toggled_id: &str,
    toggled_value: bool,
    now: &DateTime<Utc>,
) -> Result<StateMutation, EngineError> {
    let weekly = snapshot.require(weekly_id)?;
    if weekly.depth != Depth::Weekly {
        return Err(EngineError::InvalidTransition(format!(
            "daily goal {toggled_id} has non-weekly parent {weekly_id}"
        )));
    }

    let children = snapshot.daily_children_of(weekly_id, week);
    let completion: Vec<bool> = children
        .iter()
        .map(|child| child_complete(snapshot, child, week, toggled_id, toggled_value))
        .collect();
    let derived = derive_weekly_completion(&completion);

    let old = snapshot.state_of(weekly_id, week);
    let mut next = old.clone();
    if !toggled_value && old.is_hard_complete {
        // Cascade-on-uncheck: a stale manual-complete marker never survives
        // an unchecked child.
        next.is_hard_complete = false;
    }
    // A hard-complete that cascaded completion stays rendered complete as
    // long as the hard flag is still in force.
    let soft = derived || (next.is_hard_complete && old.is_complete);
    next = next.with_complete(soft, now);

    Ok(StateMutation {
        goal_id: weekly_id.to_string(),
        week: *week,
        state: next,
    })
}

fn child_complete(
    snapshot: &GoalSnapshot,
    child: &Goal,
    week: &WeekRef,
    toggled_id: &str,
    toggled_value: bool,
) -> bool {
    if child.id == toggled_id {
        toggled_value
    } else {
        snapshot.state_of(&child.id, week).is_complete
    }
}

/// The hard-complete toggle workflow for weekly goals.
///
/// Unchecking a hard-complete goal clears the flag with no confirmation and
/// no child changes. Checking completes directly when nothing would be
/// cascaded; otherwise it asks for confirmation and mutates nothing.
pub fn toggle_weekly_goal(
    snapshot: &GoalSnapshot,
    goal_id: &str,
    requested: bool,
    now: &DateTime<Utc>,
) -> Result<WeeklyToggleOutcome, EngineError> {
    let goal = snapshot.require(goal_id)?;
    if goal.depth != Depth::Weekly {
        return Err(EngineError::InvalidTransition(format!(
            "toggle_weekly_goal on non-weekly goal {goal_id}"
        )));
    }
    let week = goal
        .week_ref()
        .ok_or_else(|| EngineError::InvalidTransition(format!("weekly goal {goal_id} has no week")))?;
    let state = snapshot.state_of(goal_id, &week);

    if !requested {
        if !state.is_hard_complete {
            // Soft completion is derived; there is nothing to un-set here.
            return Ok(WeeklyToggleOutcome {
                requires_confirmation: false,
                mutations: Vec::new(),
            });
        }
        let children: Vec<bool> = snapshot
            .daily_children_of(goal_id, &week)
            .iter()
            .map(|c| snapshot.state_of(&c.id, &week).is_complete)
            .collect();
        let mut next = state.clone();
        next.is_hard_complete = false;
        next = next.with_complete(derive_weekly_completion(&children), now);
        return Ok(WeeklyToggleOutcome {
            requires_confirmation: false,
            mutations: vec![StateMutation {
                goal_id: goal_id.to_string(),
                week,
                state: next,
            }],
        });
    }

    let incomplete: usize = snapshot
        .daily_children_of(goal_id, &week)
        .iter()
        .filter(|c| !snapshot.state_of(&c.id, &week).is_complete)
        .count();

    if incomplete > 0 {
        return Ok(WeeklyToggleOutcome {
            requires_confirmation: true,
            mutations: Vec::new(),
        });
    }

    let mut next = state.clone();
    next.is_hard_complete = true;
    next = next.with_complete(true, now);
    Ok(WeeklyToggleOutcome {
        requires_confirmation: false,
        mutations: vec![StateMutation {
            goal_id: goal_id.to_string(),
            week,
            state: next,
        }],
    })
}

/// The confirmed hard-complete path.
///
/// With `cascade_to_children` every daily child is completed and soft
/// completion re-derives to true. Without it only the hard flag is set;
/// `is_hard_complete = true, is_complete = false` is a valid intentional
/// state rendered complete through [`GoalState::is_done`].
pub fn complete_weekly_goal(
    snapshot: &GoalSnapshot,
    goal_id: &str,
    cascade_to_children: bool,
    now: &DateTime<Utc>,
) -> Result<Vec<StateMutation>, EngineError> {
    let goal = snapshot.require(goal_id)?;
    if goal.depth != Depth::Weekly {
        return Err(EngineError::InvalidTransition(format!(
            "complete_weekly_goal on non-weekly goal {goal_id}"
        )));
    }
    let week = goal
        .week_ref()
        .ok_or_else(|| EngineError::InvalidTransition(format!("weekly goal {goal_id} has no week")))?;

    let children = snapshot.daily_children_of(goal_id, &week);
    let mut mutations = Vec::new();

    if cascade_to_children {
        for child in &children {
            let state = snapshot.state_of(&child.id, &week);
            if !state.is_complete {
                mutations.push(StateMutation {
                    goal_id: child.id.clone(),
                    week,
                    state: state.with_complete(true, now),
                });
            }
        }
    }

    let old = snapshot.state_of(goal_id, &week);
    let mut next = old.clone();
    next.is_hard_complete = true;
    if cascade_to_children {
        next = next.with_complete(true, now);
    }
    mutations.push(StateMutation {
        goal_id: goal_id.to_string(),
        week,
        state: next,
    });

    Ok(mutations)
}

/// Convenience for callers applying a [`DailyToggleEffect`]: the mutations
/// in store order (leaf first, then parent).
impl DailyToggleEffect {
    pub fn into_mutations(self) -> Vec<StateMutation> {
        let mut mutations = vec![self.daily];
        mutations.extend(self.weekly);
        mutations
    }
}
