// Goals service: completion toggles, priority status, and goal CRUD.
// Mutations run through the optimistic coordinator: track, commit the
// batch, settle, then treat the post-commit read as the authoritative
// snapshot.

use chrono::Utc;

use crate::completion::{self, DailyToggleEffect, WeeklyToggleOutcome};
use crate::error::EngineError;
use crate::goal::{DayRef, Depth, Goal, GoalSnapshot, GoalState, StateMutation, WeekRef, WriteBatch};
use crate::state::EngineState;
use crate::status;
use crate::types::{CreateGoalRequest, GoalView, UpdateGoalRequest, WeekStats};
use crate::util;

/// Result type for board reads.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BoardResult {
    Success { data: WeekBoard },
    Empty { message: String },
    Error { message: String },
}

/// One week's board, grouped by level. Quarterly goals come pre-sorted by
/// the canonical starred/pinned/alphabetical order.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekBoard {
    pub week: WeekRef,
    pub quarterly: Vec<GoalView>,
    pub weekly: Vec<GoalView>,
    pub daily: Vec<GoalView>,
    pub stats: WeekStats,
}

/// Toggle a daily goal's completion and persist the recomputed parent.
pub fn toggle_daily_goal(
    state: &EngineState,
    goal_id: &str,
    new_value: bool,
) -> Result<DailyToggleEffect, String> {
    let now = Utc::now();
    let effect = state.with_db(|db| {
        let snapshot = snapshot_for_goal(db, goal_id)?;
        completion::toggle_daily_goal(&snapshot, goal_id, new_value, &now)
            .map_err(|e| e.to_string())
    })?;

    let ticket = state.pending.track(goal_id, effect.daily.state.clone());
    let batch = WriteBatch {
        mutations: effect.clone().into_mutations(),
        reassignments: Vec::new(),
    };
    match state.with_db(|db| db.apply_batch(&batch)) {
        Ok(()) => {
            state.pending.settle_ok(&ticket);
            state
                .pending
                .apply_snapshot(batch.mutations.iter().map(|m| m.goal_id.as_str()));
            Ok(effect)
        }
        Err(e) => {
            state.pending.settle_err(&ticket, &e);
            Err(e)
        }
    }
}

/// The weekly hard-complete toggle. When the outcome requires confirmation
/// nothing was persisted; the caller confirms through
/// [`complete_weekly_goal`].
pub fn toggle_weekly_goal(
    state: &EngineState,
    goal_id: &str,
    requested: bool,
) -> Result<WeeklyToggleOutcome, String> {
    let now = Utc::now();
    let outcome = state.with_db(|db| {
        let snapshot = snapshot_for_goal(db, goal_id)?;
        completion::toggle_weekly_goal(&snapshot, goal_id, requested, &now)
            .map_err(|e| e.to_string())
    })?;

    if outcome.mutations.is_empty() {
        return Ok(outcome);
    }
    persist_tracked(state, goal_id, &outcome.mutations)?;
    Ok(outcome)
}

/// The confirmed hard-complete path, with or without cascading to children.
pub fn complete_weekly_goal(
    state: &EngineState,
    goal_id: &str,
    cascade_to_children: bool,
) -> Result<Vec<StateMutation>, String> {
    let now = Utc::now();
    let mutations = state.with_db(|db| {
        let snapshot = snapshot_for_goal(db, goal_id)?;
        completion::complete_weekly_goal(&snapshot, goal_id, cascade_to_children, &now)
            .map_err(|e| e.to_string())
    })?;

    persist_tracked(state, goal_id, &mutations)?;
    Ok(mutations)
}

/// Star a quarterly goal for a week (toggles off when already starred).
pub fn set_starred(
    state: &EngineState,
    goal_id: &str,
    week: &WeekRef,
) -> Result<GoalState, String> {
    apply_status(state, goal_id, week, status::set_starred)
}

/// Pin a quarterly goal for a week (toggles off when already pinned).
pub fn set_pinned(state: &EngineState, goal_id: &str, week: &WeekRef) -> Result<GoalState, String> {
    apply_status(state, goal_id, week, status::set_pinned)
}

/// Clear a quarterly goal's status for a week.
pub fn clear_status(
    state: &EngineState,
    goal_id: &str,
    week: &WeekRef,
) -> Result<GoalState, String> {
    apply_status(state, goal_id, week, status::clear_status)
}

fn apply_status(
    state: &EngineState,
    goal_id: &str,
    week: &WeekRef,
    op: fn(&GoalSnapshot, &str, &WeekRef) -> Result<StateMutation, EngineError>,
) -> Result<GoalState, String> {
    let mutation = state.with_db(|db| {
        let snapshot = db.week_snapshot(week).map_err(|e| e.to_string())?;
        op(&snapshot, goal_id, week).map_err(|e| e.to_string())
    })?;

    persist_tracked(state, goal_id, std::slice::from_ref(&mutation))?;
    Ok(mutation.state)
}

/// Track, apply, settle: the shared write path for state-only mutations.
fn persist_tracked(
    state: &EngineState,
    tracked_goal: &str,
    mutations: &[StateMutation],
) -> Result<(), String> {
    let local = mutations
        .iter()
        .find(|m| m.goal_id == tracked_goal)
        .map(|m| m.state.clone())
        .unwrap_or_default();
    let ticket = state.pending.track(tracked_goal, local);

    let batch = WriteBatch {
        mutations: mutations.to_vec(),
        reassignments: Vec::new(),
    };
    match state.with_db(|db| db.apply_batch(&batch)) {
        Ok(()) => {
            state.pending.settle_ok(&ticket);
            state
                .pending
                .apply_snapshot(batch.mutations.iter().map(|m| m.goal_id.as_str()));
            Ok(())
        }
        Err(e) => {
            state.pending.settle_err(&ticket, &e);
            Err(e)
        }
    }
}

/// Load the week snapshot the given goal belongs to.
fn snapshot_for_goal(
    db: &crate::db::GoalDb,
    goal_id: &str,
) -> Result<GoalSnapshot, String> {
    let goal = db
        .get_goal_by_id(goal_id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| EngineError::NotFound(goal_id.to_string()).to_string())?;
    let week = goal
        .week_ref()
        .ok_or_else(|| format!("Goal has no week assignment: {goal_id}"))?;
    db.week_snapshot(&week).map_err(|e| e.to_string())
}

/// One week's board with per-goal sync state, quarterly goals in canonical
/// order.
pub fn get_week_board(state: &EngineState, week: &WeekRef) -> BoardResult {
    let snapshot = match state.with_db(|db| db.week_snapshot(week).map_err(|e| e.to_string())) {
        Ok(s) => s,
        Err(message) => return BoardResult::Error { message },
    };
    let stats = state
        .with_db(|db| db.week_stats(week).map_err(|e| e.to_string()))
        .unwrap_or_default();

    let view = |goal: &Goal| -> GoalView {
        GoalView {
            goal: goal.clone(),
            state: snapshot.state_of(&goal.id, week),
            sync: state.pending.state_of(&goal.id),
        }
    };

    let mut quarterly: Vec<GoalView> = snapshot
        .goals()
        .filter(|g| g.depth == Depth::Quarterly)
        .map(view)
        .collect();
    quarterly.sort_by(|a, b| {
        status::compare_by_status((&a.state, &a.goal.title), (&b.state, &b.goal.title))
    });

    let mut weekly: Vec<GoalView> = snapshot
        .goals()
        .filter(|g| g.depth == Depth::Weekly && g.in_week(week))
        .map(view)
        .collect();
    weekly.sort_by(|a, b| a.goal.title.to_lowercase().cmp(&b.goal.title.to_lowercase()));

    let mut daily: Vec<GoalView> = snapshot
        .goals()
        .filter(|g| g.depth == Depth::Daily && g.in_week(week))
        .map(view)
        .collect();
    daily.sort_by(|a, b| {
        a.goal
            .day_of_week
            .cmp(&b.goal.day_of_week)
            .then_with(|| a.goal.title.to_lowercase().cmp(&b.goal.title.to_lowercase()))
    });

    if quarterly.is_empty() && weekly.is_empty() && daily.is_empty() {
        return BoardResult::Empty {
            message: "No goals yet for this week. Add a quarterly goal to get started."
                .to_string(),
        };
    }

    BoardResult::Success {
        data: WeekBoard {
            week: *week,
            quarterly,
            weekly,
            daily,
            stats,
        },
    }
}

/// Adhoc goals for one day, grouped by domain then title.
pub fn get_adhoc_goals(state: &EngineState, day: &DayRef) -> Result<Vec<GoalView>, String> {
    let goals = state.with_db(|db| db.list_adhoc(day).map_err(|e| e.to_string()))?;
    let week = day.week_ref();
    let snapshot = state.with_db(|db| db.week_snapshot(&week).map_err(|e| e.to_string()))?;
    Ok(goals
        .into_iter()
        .map(|goal| {
            let state_row = snapshot.state_of(&goal.id, &week);
            GoalView {
                sync: state.pending.state_of(&goal.id),
                state: state_row,
                goal,
            }
        })
        .collect())
}

/// Create a new goal with validation.
pub fn create_goal(request: CreateGoalRequest, state: &EngineState) -> Result<String, String> {
    let CreateGoalRequest {
        title,
        depth,
        details,
        parent_id,
        year,
        quarter,
        week_number,
        day_of_week,
        due_date,
        domain,
    } = request;

    let title = util::validate_bounded_string(&title, "title", 1, 280)?;
    let depth = Depth::try_from(depth)?;
    util::validate_quarter(quarter, "quarter")?;
    if let Some(week) = week_number {
        util::validate_week_number(week, "week_number")?;
    }
    if let Some(day) = day_of_week {
        util::validate_day_of_week(day, "day_of_week")?;
    }
    let due_date = due_date
        .map(|d| util::validate_yyyy_mm_dd(&d, "due_date"))
        .transpose()?;
    if let Some(ref id) = parent_id {
        util::validate_id_slug(id, "parent_id")?;
    }
    if let Some(ref d) = domain {
        util::validate_bounded_string(d, "domain", 1, 60)?;
    }

    // Level-specific shape rules.
    match depth {
        Depth::Quarterly => {
            if parent_id.is_some() || week_number.is_some() || day_of_week.is_some() {
                return Err("Quarterly goals carry only a year and quarter".to_string());
            }
        }
        Depth::Weekly => {
            if parent_id.is_none() || week_number.is_none() {
                return Err("Weekly goals need a quarterly parent and a week".to_string());
            }
        }
        Depth::Daily => {
            if parent_id.is_none() || week_number.is_none() || day_of_week.is_none() {
                return Err("Daily goals need a weekly parent, a week, and a day".to_string());
            }
        }
        Depth::Adhoc => {
            if parent_id.is_some() {
                return Err("Adhoc goals are standalone".to_string());
            }
            if week_number.is_none() || day_of_week.is_none() {
                return Err("Adhoc goals need a week and a day".to_string());
            }
        }
    }

    state.with_db(|db| {
        let expected_parent_depth = match depth {
            Depth::Weekly => Some(Depth::Quarterly),
            Depth::Daily => Some(Depth::Weekly),
            _ => None,
        };
        if let (Some(pid), Some(expected)) = (parent_id.as_deref(), expected_parent_depth) {
            let parent = db
                .get_goal_by_id(pid)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("Parent goal not found: {pid}"))?;
            if parent.depth != expected {
                return Err(format!("Parent goal {pid} is the wrong level"));
            }
        }

        let now = Utc::now().to_rfc3339();
        let id = uuid::Uuid::new_v4().to_string();
        let date = match (week_number, day_of_week) {
            (Some(week), Some(day)) => DayRef {
                year,
                quarter,
                week,
                day,
            }
            .date(),
            _ => None,
        };

        let goal = Goal {
            id: id.clone(),
            title: title.clone(),
            details: details.clone(),
            depth,
            parent_id: parent_id.clone(),
            year,
            quarter,
            week_number,
            day_of_week,
            date,
            due_date,
            domain: domain.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        db.upsert_goal(&goal).map_err(|e| e.to_string())?;
        Ok(id)
    })
}

/// Update a goal's editable fields.
pub fn update_goal(request: UpdateGoalRequest, state: &EngineState) -> Result<(), String> {
    let UpdateGoalRequest {
        id,
        title,
        details,
        clear_details,
        due_date,
        clear_due_date,
        domain,
        clear_domain,
    } = request;

    if let Some(ref t) = title {
        util::validate_bounded_string(t, "title", 1, 280)?;
    }
    let due_date = due_date
        .map(|d| util::validate_yyyy_mm_dd(&d, "due_date"))
        .transpose()?;
    if let Some(ref d) = domain {
        util::validate_bounded_string(d, "domain", 1, 60)?;
    }

    state.with_db(|db| {
        let mut goal = db
            .get_goal_by_id(&id)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("Goal not found: {id}"))?;

        if let Some(t) = title {
            goal.title = t.trim().to_string();
        }
        if clear_details == Some(true) {
            goal.details = None;
        } else if let Some(d) = details {
            goal.details = Some(d);
        }
        if clear_due_date == Some(true) {
            goal.due_date = None;
        } else if let Some(d) = due_date {
            goal.due_date = Some(d);
        }
        if clear_domain == Some(true) {
            goal.domain = None;
        } else if let Some(d) = domain {
            goal.domain = Some(d);
        }

        goal.updated_at = Utc::now().to_rfc3339();
        db.upsert_goal(&goal).map_err(|e| e.to_string())
    })
}

/// Archive a goal so it stops appearing on boards.
pub fn archive_goal(state: &EngineState, goal_id: &str) -> Result<(), String> {
    state.with_db(|db| db.archive_goal(goal_id).map_err(|e| e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::GoalDb;
    use crate::goal::test_fixtures::*;
    use crate::pending::MutationTracker;
    use crate::types::Config;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn test_state() -> (tempfile::TempDir, EngineState) {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let db = GoalDb::open_at(dir.path().join("goaldeck.db")).expect("open db");
        let state = EngineState {
            config: Mutex::new(Some(Config::default())),
            db: Mutex::new(Some(db)),
            pending: Arc::new(MutationTracker::new()),
        };
        (dir, state)
    }

    fn seed_board(state: &EngineState) {
        state
            .with_db(|db| {
                db.upsert_goal(&quarterly("q1", "Ship v2")).unwrap();
                db.upsert_goal(&weekly("w1", "Land migrations", "q1", 5)).unwrap();
                db.upsert_goal(&daily("d1", "Write schema", "w1", 5, 1)).unwrap();
                db.upsert_goal(&daily("d2", "Backfill rows", "w1", 5, 3)).unwrap();
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn two_child_confirmation_then_cascade() {
        let (_dir, state) = test_state();
        seed_board(&state);

        let outcome = toggle_weekly_goal(&state, "w1", true).unwrap();
        assert!(outcome.requires_confirmation);

        let mutations = complete_weekly_goal(&state, "w1", true).unwrap();
        assert_eq!(mutations.len(), 3);

        let snap = state
            .with_db(|db| db.week_snapshot(&week(5)).map_err(|e| e.to_string()))
            .unwrap();
        assert!(snap.state_of("d1", &week(5)).is_complete);
        assert!(snap.state_of("d2", &week(5)).is_complete);
        let weekly_state = snap.state_of("w1", &week(5));
        assert!(weekly_state.is_hard_complete);
        assert!(weekly_state.is_complete);
    }

    #[test]
    fn uncheck_clears_persisted_hard_flag() {
        let (_dir, state) = test_state();
        seed_board(&state);
        complete_weekly_goal(&state, "w1", true).unwrap();

        toggle_daily_goal(&state, "d1", false).unwrap();

        let snap = state
            .with_db(|db| db.week_snapshot(&week(5)).map_err(|e| e.to_string()))
            .unwrap();
        let weekly_state = snap.state_of("w1", &week(5));
        assert!(!weekly_state.is_hard_complete);
        assert!(!weekly_state.is_complete);
        assert!(!state.pending.is_pending("d1"));
    }

    #[test]
    fn completing_all_children_soft_completes_parent() {
        let (_dir, state) = test_state();
        seed_board(&state);

        toggle_daily_goal(&state, "d1", true).unwrap();
        let effect = toggle_daily_goal(&state, "d2", true).unwrap();
        let weekly_state = effect.weekly.unwrap().state;
        assert!(weekly_state.is_complete);
        assert!(!weekly_state.is_hard_complete);

        let stats = state
            .with_db(|db| db.week_stats(&week(5)).map_err(|e| e.to_string()))
            .unwrap();
        assert_eq!(stats, WeekStats { completed: 2, total: 2 });
    }

    #[test]
    fn star_then_pin_stays_exclusive_in_store() {
        let (_dir, state) = test_state();
        seed_board(&state);

        let s = set_starred(&state, "q1", &week(5)).unwrap();
        assert!(s.is_starred);
        let s = set_pinned(&state, "q1", &week(5)).unwrap();
        assert!(s.is_pinned && !s.is_starred);

        let snap = state
            .with_db(|db| db.week_snapshot(&week(5)).map_err(|e| e.to_string()))
            .unwrap();
        let persisted = snap.state_of("q1", &week(5));
        assert!(persisted.is_pinned && !persisted.is_starred);
    }

    #[test]
    fn board_orders_quarterly_canonically() {
        let (_dir, state) = test_state();
        seed_board(&state);
        state
            .with_db(|db| {
                db.upsert_goal(&quarterly("q2", "Adopt analytics")).unwrap();
                db.upsert_goal(&quarterly("q3", "Zero churn")).unwrap();
                Ok(())
            })
            .unwrap();
        set_pinned(&state, "q1", &week(5)).unwrap();
        set_starred(&state, "q3", &week(5)).unwrap();

        let board = match get_week_board(&state, &week(5)) {
            BoardResult::Success { data } => data,
            other => panic!("expected board, got {other:?}"),
        };
        let ids: Vec<&str> = board.quarterly.iter().map(|v| v.goal.id.as_str()).collect();
        assert_eq!(ids, vec!["q3", "q1", "q2"]);
        assert_eq!(board.daily.len(), 2);
    }

    #[test]
    fn create_goal_validates_shape() {
        let (_dir, state) = test_state();
        seed_board(&state);

        let id = create_goal(
            CreateGoalRequest {
                title: "Draft rollout plan".to_string(),
                depth: 2,
                details: None,
                parent_id: Some("w1".to_string()),
                year: 2026,
                quarter: 1,
                week_number: Some(5),
                day_of_week: Some(4),
                due_date: Some("2026-02-06".to_string()),
                domain: None,
            },
            &state,
        )
        .unwrap();

        let goal = state
            .with_db(|db| db.get_goal_by_id(&id).map_err(|e| e.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(goal.depth, Depth::Daily);
        assert!(goal.date.is_some());

        // Daily goal without a day is rejected.
        let err = create_goal(
            CreateGoalRequest {
                title: "Bad".to_string(),
                depth: 2,
                details: None,
                parent_id: Some("w1".to_string()),
                year: 2026,
                quarter: 1,
                week_number: Some(5),
                day_of_week: None,
                due_date: None,
                domain: None,
            },
            &state,
        )
        .unwrap_err();
        assert!(err.contains("day"));

        // Daily goal under a quarterly parent is rejected.
        let err = create_goal(
            CreateGoalRequest {
                title: "Bad parent".to_string(),
                depth: 2,
                details: None,
                parent_id: Some("q1".to_string()),
                year: 2026,
                quarter: 1,
                week_number: Some(5),
                day_of_week: Some(1),
                due_date: None,
                domain: None,
            },
            &state,
        )
        .unwrap_err();
        assert!(err.contains("wrong level"));
    }

    #[test]
    fn update_goal_clears_and_sets_fields() {
        let (_dir, state) = test_state();
        seed_board(&state);

        update_goal(
            UpdateGoalRequest {
                id: "d1".to_string(),
                title: Some("Write schema v2".to_string()),
                details: Some("<p>notes</p>".to_string()),
                due_date: Some("2026-02-07".to_string()),
                ..Default::default()
            },
            &state,
        )
        .unwrap();

        let goal = state
            .with_db(|db| db.get_goal_by_id("d1").map_err(|e| e.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(goal.title, "Write schema v2");
        assert!(goal.due_date.is_some());

        update_goal(
            UpdateGoalRequest {
                id: "d1".to_string(),
                clear_due_date: Some(true),
                clear_details: Some(true),
                ..Default::default()
            },
            &state,
        )
        .unwrap();
        let goal = state
            .with_db(|db| db.get_goal_by_id("d1").map_err(|e| e.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(goal.due_date, None);
        assert_eq!(goal.details, None);
    }

    #[test]
    fn adhoc_listing_carries_state_and_sync() {
        let (_dir, state) = test_state();
        state
            .with_db(|db| {
                db.upsert_goal(&adhoc("a1", "Renew passport", "personal", 5, 2)).unwrap();
                Ok(())
            })
            .unwrap();

        let day = DayRef {
            year: 2026,
            quarter: 1,
            week: 5,
            day: 2,
        };
        let views = get_adhoc_goals(&state, &day).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].goal.domain.as_deref(), Some("personal"));
        assert_eq!(views[0].sync, crate::pending::SyncState::Synced);
    }
}
