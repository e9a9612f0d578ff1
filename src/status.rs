//! Starred/pinned priority status for quarterly goals.
//!
//! Status is week-scoped and mutually exclusive: setting one flag clears
//! the other, and toggling an already-active flag clears it. The sort
//! order used by every list view lives here as the one canonical
//! comparator; views must not re-implement it.

use std::cmp::Ordering;

use crate::error::EngineError;
use crate::goal::{Depth, GoalSnapshot, GoalState, StateMutation, WeekRef};

/// Star a quarterly goal for a week. Starring an already-starred goal
/// clears the star.
pub fn set_starred(
    snapshot: &GoalSnapshot,
    goal_id: &str,
    week: &WeekRef,
) -> Result<StateMutation, EngineError> {
    let state = require_quarterly_state(snapshot, goal_id, week)?;
    let mut next = state;
    if next.is_starred {
        next.is_starred = false;
    } else {
        next.is_starred = true;
        next.is_pinned = false;
    }
    Ok(mutation(goal_id, week, next))
}

/// Pin a quarterly goal for a week. Pinning an already-pinned goal clears
/// the pin.
pub fn set_pinned(
    snapshot: &GoalSnapshot,
    goal_id: &str,
    week: &WeekRef,
) -> Result<StateMutation, EngineError> {
    let state = require_quarterly_state(snapshot, goal_id, week)?;
    let mut next = state;
    if next.is_pinned {
        next.is_pinned = false;
    } else {
        next.is_pinned = true;
        next.is_starred = false;
    }
    Ok(mutation(goal_id, week, next))
}

/// Clear both flags for a week.
pub fn clear_status(
    snapshot: &GoalSnapshot,
    goal_id: &str,
    week: &WeekRef,
) -> Result<StateMutation, EngineError> {
    let state = require_quarterly_state(snapshot, goal_id, week)?;
    let mut next = state;
    next.is_starred = false;
    next.is_pinned = false;
    Ok(mutation(goal_id, week, next))
}

/// The canonical list order: starred first, then pinned, then alphabetical
/// by title (case-insensitive).
pub fn compare_by_status(a: (&GoalState, &str), b: (&GoalState, &str)) -> Ordering {
    status_rank(a.0)
        .cmp(&status_rank(b.0))
        .then_with(|| a.1.to_lowercase().cmp(&b.1.to_lowercase()))
}

fn status_rank(state: &GoalState) -> u8 {
    if state.is_starred {
        0
    } else if state.is_pinned {
        1
    } else {
        2
    }
}

fn require_quarterly_state(
    snapshot: &GoalSnapshot,
    goal_id: &str,
    week: &WeekRef,
) -> Result<GoalState, EngineError> {
    let goal = snapshot.require(goal_id)?;
    if goal.depth != Depth::Quarterly {
        return Err(EngineError::InvalidTransition(format!(
            "priority status on non-quarterly goal {goal_id}"
        )));
    }
    Ok(snapshot.state_of(goal_id, week))
}

fn mutation(goal_id: &str, week: &WeekRef, state: GoalState) -> StateMutation {
    StateMutation {
        goal_id: goal_id.to_string(),
        week: *week,
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::test_fixtures::*;

    fn board() -> GoalSnapshot {
        let mut snap = GoalSnapshot::new();
        snap.insert_goal(quarterly("q1", "Ship v2"));
        snap.insert_goal(quarterly("q2", "Hire two engineers"));
        snap.insert_goal(weekly("w1", "Land migrations", "q1", 6));
        snap
    }

    fn apply(snap: &mut GoalSnapshot, m: &StateMutation) {
        snap.insert_state(&m.goal_id, m.week, m.state.clone());
    }

    #[test]
    fn star_and_pin_are_mutually_exclusive() {
        let mut snap = board();
        let w = week(6);

        let m = set_starred(&snap, "q1", &w).unwrap();
        assert!(m.state.is_starred && !m.state.is_pinned);
        apply(&mut snap, &m);

        let m = set_pinned(&snap, "q1", &w).unwrap();
        assert!(m.state.is_pinned && !m.state.is_starred);
        apply(&mut snap, &m);

        let m = set_starred(&snap, "q1", &w).unwrap();
        assert!(m.state.is_starred && !m.state.is_pinned);
    }

    #[test]
    fn never_both_true_for_any_call_sequence() {
        let mut snap = board();
        let w = week(6);
        let ops: [fn(&GoalSnapshot, &str, &WeekRef) -> Result<StateMutation, EngineError>; 3] =
            [set_starred, set_pinned, clear_status];

        // Exercise every pair of consecutive operations.
        for first in ops {
            for second in ops {
                let m = first(&snap, "q1", &w).unwrap();
                apply(&mut snap, &m);
                let m = second(&snap, "q1", &w).unwrap();
                assert!(!(m.state.is_starred && m.state.is_pinned));
                apply(&mut snap, &m);
            }
        }
    }

    #[test]
    fn toggling_active_flag_clears_it() {
        let mut snap = board();
        let w = week(6);

        let m = set_starred(&snap, "q1", &w).unwrap();
        apply(&mut snap, &m);
        let m = set_starred(&snap, "q1", &w).unwrap();
        assert!(!m.state.has_status());

        let m = set_pinned(&snap, "q2", &w).unwrap();
        apply(&mut snap, &m);
        let m = set_pinned(&snap, "q2", &w).unwrap();
        assert!(!m.state.has_status());
    }

    #[test]
    fn status_is_week_scoped() {
        let mut snap = board();
        let m = set_starred(&snap, "q1", &week(5)).unwrap();
        apply(&mut snap, &m);
        assert!(snap.state_of("q1", &week(5)).is_starred);
        assert!(!snap.state_of("q1", &week(6)).is_starred);
    }

    #[test]
    fn rejects_non_quarterly_goals() {
        let snap = board();
        assert!(matches!(
            set_starred(&snap, "w1", &week(6)),
            Err(EngineError::InvalidTransition(_))
        ));
        assert!(matches!(
            set_pinned(&snap, "missing", &week(6)),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn comparator_orders_starred_pinned_alphabetical() {
        let starred = GoalState {
            is_starred: true,
            ..Default::default()
        };
        let pinned = GoalState {
            is_pinned: true,
            ..Default::default()
        };
        let plain = GoalState::default();

        let mut rows = vec![
            (&plain, "beta"),
            (&pinned, "zeta"),
            (&plain, "Alpha"),
            (&starred, "omega"),
        ];
        rows.sort_by(|a, b| compare_by_status(*a, *b));
        let titles: Vec<&str> = rows.iter().map(|r| r.1).collect();
        assert_eq!(titles, vec!["omega", "zeta", "Alpha", "beta"]);
    }
}
