//! Moving incomplete work between time periods.
//!
//! Two-phase commit shape: a pure preview derives a `TransferPlan` from a
//! snapshot; commit re-derives the plan from fresh data (a stale preview is
//! never trusted), converts it to one `WriteBatch`, and lets the store
//! apply it transactionally. Completed goals are never moved, even if they
//! were incomplete at preview time.
//!
//! The single-goal drag path is simpler: it upserts a quarterly goal's
//! star/pin status onto a target week, clearing the source unless the
//! caller asked for duplicate semantics.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::goal::{
    DayRef, Depth, Goal, GoalSnapshot, PeriodReassignment, StateMutation, WeekRef, WriteBatch,
};

/// One daily goal the plan would move, with ancestry titles for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedMove {
    pub goal_id: String,
    pub title: String,
    pub weekly_id: Option<String>,
    pub weekly_title: Option<String>,
    pub quarterly_id: Option<String>,
    pub quarterly_title: Option<String>,
    pub to: DayRef,
}

/// One quarterly goal whose star/pin status replicates into the target week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCarryOver {
    pub goal_id: String,
    pub title: String,
    pub is_starred: bool,
    pub is_pinned: bool,
}

/// The preview: what a commit would do. Pure data, no side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPlan {
    pub from_week: WeekRef,
    pub to_week: WeekRef,
    pub moves: Vec<PlannedMove>,
    pub status_carry: Vec<StatusCarryOver>,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.status_carry.is_empty()
    }

    /// Describe how this freshly derived plan differs from a previously
    /// previewed one, or `None` when the acted-upon sets match.
    pub fn divergence_from(&self, previewed: &TransferPlan) -> Option<String> {
        let fresh_ids: Vec<&str> = self.moves.iter().map(|m| m.goal_id.as_str()).collect();
        let old_ids: Vec<&str> = previewed.moves.iter().map(|m| m.goal_id.as_str()).collect();

        let dropped = old_ids.iter().filter(|id| !fresh_ids.contains(id)).count();
        let added = fresh_ids.iter().filter(|id| !old_ids.contains(id)).count();
        let carry_changed = self.status_carry != previewed.status_carry;

        if dropped == 0 && added == 0 && !carry_changed {
            return None;
        }
        Some(format!(
            "{dropped} previewed goal(s) no longer eligible, {added} new, status carry {}",
            if carry_changed { "changed" } else { "unchanged" }
        ))
    }
}

/// Plan pulling every incomplete daily goal of `from` into `to`, keeping
/// each goal's day of week. Pure and idempotent.
pub fn plan_week_pull(snapshot: &GoalSnapshot, from: &WeekRef, to: &WeekRef) -> TransferPlan {
    let movable = snapshot
        .daily_goals_in_week(from)
        .into_iter()
        .filter(|g| !snapshot.state_of(&g.id, from).is_complete);

    let moves: Vec<PlannedMove> = movable
        .map(|goal| {
            let to_day = DayRef {
                year: to.year,
                quarter: to.quarter,
                week: to.week,
                day: goal.day_of_week.unwrap_or(1),
            };
            planned_move(snapshot, goal, to_day)
        })
        .collect();

    let status_carry = carry_for_moves(snapshot, &moves, from);

    TransferPlan {
        from_week: *from,
        to_week: *to,
        moves,
        status_carry,
    }
}

/// Plan pulling every incomplete daily goal of one day onto another day.
pub fn plan_day_pull(snapshot: &GoalSnapshot, from: &DayRef, to: &DayRef) -> TransferPlan {
    let from_week = from.week_ref();
    let moves: Vec<PlannedMove> = snapshot
        .daily_goals_in_day(from)
        .into_iter()
        .filter(|g| !snapshot.state_of(&g.id, &from_week).is_complete)
        .map(|goal| planned_move(snapshot, goal, *to))
        .collect();

    let status_carry = carry_for_moves(snapshot, &moves, &from_week);

    TransferPlan {
        from_week,
        to_week: to.week_ref(),
        moves,
        status_carry,
    }
}

fn planned_move(snapshot: &GoalSnapshot, goal: &Goal, to: DayRef) -> PlannedMove {
    let ancestors = snapshot.ancestors_of(&goal.id);
    let weekly = ancestors.iter().find(|a| a.depth == Depth::Weekly);
    let quarterly = ancestors.iter().find(|a| a.depth == Depth::Quarterly);
    PlannedMove {
        goal_id: goal.id.clone(),
        title: goal.title.clone(),
        weekly_id: weekly.map(|g| g.id.clone()),
        weekly_title: weekly.map(|g| g.title.clone()),
        quarterly_id: quarterly.map(|g| g.id.clone()),
        quarterly_title: quarterly.map(|g| g.title.clone()),
        to,
    }
}

/// Status entries for the quarterly ancestors of the moved goals: any that
/// are starred or pinned in the source week replicate into the target.
fn carry_for_moves(
    snapshot: &GoalSnapshot,
    moves: &[PlannedMove],
    from: &WeekRef,
) -> Vec<StatusCarryOver> {
    let mut carry: Vec<StatusCarryOver> = Vec::new();
    for planned in moves {
        let Some(qid) = planned.quarterly_id.as_deref() else {
            continue;
        };
        if carry.iter().any(|c| c.goal_id == qid) {
            continue;
        }
        let state = snapshot.state_of(qid, from);
        if !state.has_status() {
            continue;
        }
        carry.push(StatusCarryOver {
            goal_id: qid.to_string(),
            title: planned.quarterly_title.clone().unwrap_or_default(),
            is_starred: state.is_starred,
            is_pinned: state.is_pinned,
        });
    }
    carry.sort_by(|a, b| a.goal_id.cmp(&b.goal_id));
    carry
}

/// Convert a plan into the one coherent batch the store applies
/// transactionally. Status upserts preserve the target week's completion
/// fields; only the flags are overwritten.
pub fn plan_to_batch(snapshot: &GoalSnapshot, plan: &TransferPlan) -> WriteBatch {
    let reassignments: Vec<PeriodReassignment> = plan
        .moves
        .iter()
        .map(|m| PeriodReassignment {
            goal_id: m.goal_id.clone(),
            to: m.to,
            date: m.to.date(),
        })
        .collect();

    let mutations: Vec<StateMutation> = plan
        .status_carry
        .iter()
        .map(|carry| {
            let mut state = snapshot.state_of(&carry.goal_id, &plan.to_week);
            state.is_starred = carry.is_starred;
            state.is_pinned = carry.is_pinned;
            StateMutation {
                goal_id: carry.goal_id.clone(),
                week: plan.to_week,
                state,
            }
        })
        .collect();

    WriteBatch {
        mutations,
        reassignments,
    }
}

/// Check a freshly derived plan against the preview the user confirmed.
/// Divergence is advisory: callers proceed with the fresh plan and inform
/// the user.
pub fn verify_plan(fresh: &TransferPlan, previewed: &TransferPlan) -> Result<(), EngineError> {
    match fresh.divergence_from(previewed) {
        None => Ok(()),
        Some(detail) => Err(EngineError::TransferConflict(detail)),
    }
}

/// Drag a quarterly goal's status from one week to another.
///
/// The target always receives the source's star/pin. Without `duplicate`
/// the source status is cleared (move); with it the source is untouched.
/// Dragging a status-less goal is a no-op, not an error.
pub fn transfer_status(
    snapshot: &GoalSnapshot,
    goal_id: &str,
    from_week: &WeekRef,
    to_week: &WeekRef,
    duplicate: bool,
) -> Result<Vec<StateMutation>, EngineError> {
    let goal = snapshot.require(goal_id)?;
    if goal.depth != Depth::Quarterly {
        return Err(EngineError::InvalidTransition(format!(
            "status transfer on non-quarterly goal {goal_id}"
        )));
    }

    let source = snapshot.state_of(goal_id, from_week);
    if !source.has_status() {
        return Ok(Vec::new());
    }

    let mut target = snapshot.state_of(goal_id, to_week);
    target.is_starred = source.is_starred;
    target.is_pinned = source.is_pinned;
    let mut mutations = vec![StateMutation {
        goal_id: goal_id.to_string(),
        week: *to_week,
        state: target,
    }];

    if !duplicate {
        let mut cleared = source;
        cleared.is_starred = false;
        cleared.is_pinned = false;
        mutations.push(StateMutation {
            goal_id: goal_id.to_string(),
            week: *from_week,
            state: cleared,
        });
    }

    Ok(mutations)
}
