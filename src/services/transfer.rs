// Transfer service: pulling incomplete goals between periods.
// Previews are pure reads; commits re-derive the plan from fresh data and
// apply it as one batch. Divergence from the confirmed preview is logged
// and reported, never fatal.

use serde::Serialize;

use crate::goal::{DayRef, WeekRef};
use crate::state::EngineState;
use crate::transfer::{self, TransferPlan};

/// What a commit actually did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub moved: usize,
    pub statuses_upserted: usize,
    /// True when the acted-upon set differs from the confirmed preview.
    pub diverged: bool,
}

/// Preview pulling incomplete daily goals from one week into another.
pub fn preview_week_pull(
    state: &EngineState,
    from: &WeekRef,
    to: &WeekRef,
) -> Result<TransferPlan, String> {
    state.with_db(|db| {
        let snapshot = db.load_weeks(&[*from, *to]).map_err(|e| e.to_string())?;
        Ok(transfer::plan_week_pull(&snapshot, from, to))
    })
}

/// Commit a week pull. `previewed` is the plan the user confirmed; the
/// commit still derives its own.
pub fn commit_week_pull(
    state: &EngineState,
    from: &WeekRef,
    to: &WeekRef,
    previewed: Option<&TransferPlan>,
) -> Result<TransferOutcome, String> {
    state.with_db(|db| {
        let snapshot = db.load_weeks(&[*from, *to]).map_err(|e| e.to_string())?;
        let fresh = transfer::plan_week_pull(&snapshot, from, to);
        commit_plan(db, &snapshot, fresh, previewed)
    })
}

/// Preview pulling incomplete daily goals from one day onto another.
pub fn preview_day_pull(
    state: &EngineState,
    from: &DayRef,
    to: &DayRef,
) -> Result<TransferPlan, String> {
    state.with_db(|db| {
        let snapshot = db
            .load_weeks(&[from.week_ref(), to.week_ref()])
            .map_err(|e| e.to_string())?;
        Ok(transfer::plan_day_pull(&snapshot, from, to))
    })
}

/// Commit a day pull.
pub fn commit_day_pull(
    state: &EngineState,
    from: &DayRef,
    to: &DayRef,
    previewed: Option<&TransferPlan>,
) -> Result<TransferOutcome, String> {
    state.with_db(|db| {
        let snapshot = db
            .load_weeks(&[from.week_ref(), to.week_ref()])
            .map_err(|e| e.to_string())?;
        let fresh = transfer::plan_day_pull(&snapshot, from, to);
        commit_plan(db, &snapshot, fresh, previewed)
    })
}

fn commit_plan(
    db: &crate::db::GoalDb,
    snapshot: &crate::goal::GoalSnapshot,
    fresh: TransferPlan,
    previewed: Option<&TransferPlan>,
) -> Result<TransferOutcome, String> {
    let mut diverged = false;
    if let Some(previewed) = previewed {
        if let Err(e) = transfer::verify_plan(&fresh, previewed) {
            log::warn!("Pull commit diverged from preview: {e}");
            diverged = true;
        }
    }

    if fresh.is_empty() {
        return Ok(TransferOutcome {
            moved: 0,
            statuses_upserted: 0,
            diverged,
        });
    }

    let batch = transfer::plan_to_batch(snapshot, &fresh);
    db.apply_batch(&batch)?;
    log::info!(
        "Pulled {} goal(s) from week {} into week {}",
        batch.reassignments.len(),
        fresh.from_week.week,
        fresh.to_week.week
    );

    Ok(TransferOutcome {
        moved: batch.reassignments.len(),
        statuses_upserted: batch.mutations.len(),
        diverged,
    })
}

/// Drag a quarterly goal's star/pin from one week to another. Holding the
/// modifier key at drag time duplicates instead of moving.
pub fn drag_status(
    state: &EngineState,
    goal_id: &str,
    from_week: &WeekRef,
    to_week: &WeekRef,
    duplicate: bool,
) -> Result<(), String> {
    state.with_db(|db| {
        let snapshot = db
            .load_weeks(&[*from_week, *to_week])
            .map_err(|e| e.to_string())?;
        let mutations = transfer::transfer_status(&snapshot, goal_id, from_week, to_week, duplicate)
            .map_err(|e| e.to_string())?;
        if mutations.is_empty() {
            return Ok(());
        }
        db.apply_batch(&crate::goal::WriteBatch {
            mutations,
            reassignments: Vec::new(),
        })
    })
}
