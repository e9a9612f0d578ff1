use chrono::{NaiveDate, Utc};
use rusqlite::params;

use super::{DbError, GoalDb};
use crate::goal::{Depth, Goal, GoalSnapshot, GoalState, WeekRef, WriteBatch};
use crate::types::WeekStats;

impl GoalDb {
    // =========================================================================
    // Goals
    // =========================================================================

    /// Insert or update a goal. Uses SQLite `ON CONFLICT` (upsert).
    pub fn upsert_goal(&self, goal: &Goal) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO goals (
                id, title, details, depth, parent_id, year, quarter,
                week_number, day_of_week, date, due_date, domain,
                archived, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                details = excluded.details,
                depth = excluded.depth,
                parent_id = excluded.parent_id,
                year = excluded.year,
                quarter = excluded.quarter,
                week_number = excluded.week_number,
                day_of_week = excluded.day_of_week,
                date = excluded.date,
                due_date = excluded.due_date,
                domain = excluded.domain,
                updated_at = excluded.updated_at",
            params![
                goal.id,
                goal.title,
                goal.details,
                goal.depth.as_i8(),
                goal.parent_id,
                goal.year,
                goal.quarter,
                goal.week_number,
                goal.day_of_week,
                goal.date.map(|d| d.to_string()),
                goal.due_date.map(|d| d.to_string()),
                goal.domain,
                goal.created_at,
                goal.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a single goal by its ID.
    pub fn get_goal_by_id(&self, id: &str) -> Result<Option<Goal>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT id, title, details, depth, parent_id, year, quarter,
                    week_number, day_of_week, date, due_date, domain,
                    created_at, updated_at
             FROM goals
             WHERE id = ?1 AND archived = 0",
        )?;

        let mut rows = stmt.query_map(params![id], Self::map_goal_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Soft-archive a goal so list queries stop returning it.
    pub fn archive_goal(&self, id: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        self.conn_ref().execute(
            "UPDATE goals SET archived = 1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }

    /// Delete a goal. Descendant goals and state rows cascade via foreign
    /// keys; this is the only place deletion happens.
    pub fn delete_goal(&self, id: &str) -> Result<(), DbError> {
        self.conn_ref()
            .execute("DELETE FROM goals WHERE id = ?1", params![id])?;
        Ok(())
    }

    // =========================================================================
    // Snapshot reads
    // =========================================================================

    /// Load one week's board: quarterly goals of the quarter plus every
    /// weekly/daily/adhoc goal assigned to the week, with state rows.
    pub fn week_snapshot(&self, week: &WeekRef) -> Result<GoalSnapshot, DbError> {
        self.load_weeks(&[*week])
    }

    /// Load several weeks into one snapshot (transfer planning reads the
    /// source and target weeks together).
    pub fn load_weeks(&self, weeks: &[WeekRef]) -> Result<GoalSnapshot, DbError> {
        let mut snapshot = GoalSnapshot::new();

        for week in weeks {
            let mut stmt = self.conn_ref().prepare(
                "SELECT id, title, details, depth, parent_id, year, quarter,
                        week_number, day_of_week, date, due_date, domain,
                        created_at, updated_at
                 FROM goals
                 WHERE year = ?1 AND quarter = ?2 AND archived = 0
                   AND (depth = 0 OR week_number = ?3)",
            )?;
            let rows = stmt.query_map(
                params![week.year, week.quarter, week.week],
                Self::map_goal_row,
            )?;
            for row in rows {
                snapshot.insert_goal(row?);
            }

            let mut stmt = self.conn_ref().prepare(
                "SELECT goal_id, is_complete, is_hard_complete, is_starred,
                        is_pinned, completed_at
                 FROM goal_states
                 WHERE year = ?1 AND quarter = ?2 AND week_number = ?3",
            )?;
            let rows = stmt.query_map(params![week.year, week.quarter, week.week], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    GoalState {
                        is_complete: row.get(1)?,
                        is_hard_complete: row.get(2)?,
                        is_starred: row.get(3)?,
                        is_pinned: row.get(4)?,
                        completed_at: row.get(5)?,
                    },
                ))
            })?;
            for row in rows {
                let (goal_id, state) = row?;
                snapshot.insert_state(&goal_id, *week, state);
            }
        }

        Ok(snapshot)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply a `WriteBatch` as one transaction: state upserts plus period
    /// reassignments, visible all-or-nothing. A reassignment naming an
    /// unknown goal fails the whole batch.
    pub fn apply_batch(&self, batch: &WriteBatch) -> Result<(), String> {
        if batch.is_empty() {
            return Ok(());
        }
        self.with_transaction(|db| {
            let now = Utc::now().to_rfc3339();

            for m in &batch.mutations {
                db.upsert_state_row(m, &now).map_err(|e| e.to_string())?;
            }

            for r in &batch.reassignments {
                let changed = db
                    .conn_ref()
                    .execute(
                        "UPDATE goals
                         SET year = ?1, quarter = ?2, week_number = ?3,
                             day_of_week = ?4, date = ?5, updated_at = ?6
                         WHERE id = ?7",
                        params![
                            r.to.year,
                            r.to.quarter,
                            r.to.week,
                            r.to.day,
                            r.date.map(|d| d.to_string()),
                            now,
                            r.goal_id,
                        ],
                    )
                    .map_err(|e| e.to_string())?;
                if changed == 0 {
                    return Err(DbError::GoalNotFound(r.goal_id.clone()).to_string());
                }
            }

            Ok(())
        })
    }

    fn upsert_state_row(
        &self,
        m: &crate::goal::StateMutation,
        now: &str,
    ) -> Result<(), DbError> {
        self.conn_ref().execute(
            "INSERT INTO goal_states (
                goal_id, year, quarter, week_number,
                is_complete, is_hard_complete, is_starred, is_pinned,
                completed_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(goal_id, year, quarter, week_number) DO UPDATE SET
                is_complete = excluded.is_complete,
                is_hard_complete = excluded.is_hard_complete,
                is_starred = excluded.is_starred,
                is_pinned = excluded.is_pinned,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at",
            params![
                m.goal_id,
                m.week.year,
                m.week.quarter,
                m.week.week,
                m.state.is_complete,
                m.state.is_hard_complete,
                m.state.is_starred,
                m.state.is_pinned,
                m.state.completed_at,
                now,
            ],
        )?;
        Ok(())
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Daily-goal completion stats for a week.
    pub fn week_stats(&self, week: &WeekRef) -> Result<WeekStats, DbError> {
        let (total, completed): (usize, usize) = self.conn_ref().query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN s.is_complete = 1 THEN 1 ELSE 0 END), 0)
             FROM goals g
             LEFT JOIN goal_states s
               ON s.goal_id = g.id
              AND s.year = g.year AND s.quarter = g.quarter
              AND s.week_number = g.week_number
             WHERE g.depth = 2 AND g.archived = 0
               AND g.year = ?1 AND g.quarter = ?2 AND g.week_number = ?3",
            params![week.year, week.quarter, week.week],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(WeekStats { completed, total })
    }

    /// Adhoc goals for one day, grouped by domain then title.
    pub fn list_adhoc(&self, day: &crate::goal::DayRef) -> Result<Vec<Goal>, DbError> {
        let mut stmt = self.conn_ref().prepare(
            "SELECT id, title, details, depth, parent_id, year, quarter,
                    week_number, day_of_week, date, due_date, domain,
                    created_at, updated_at
             FROM goals
             WHERE depth = -1 AND archived = 0
               AND year = ?1 AND quarter = ?2 AND week_number = ?3 AND day_of_week = ?4
             ORDER BY domain COLLATE NOCASE, title COLLATE NOCASE",
        )?;
        let rows = stmt.query_map(
            params![day.year, day.quarter, day.week, day.day],
            Self::map_goal_row,
        )?;

        let mut goals = Vec::new();
        for row in rows {
            goals.push(row?);
        }
        Ok(goals)
    }

    /// Helper: map a row to `Goal`. Reduces repetition across queries.
    fn map_goal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Goal> {
        let depth_raw: i8 = row.get(3)?;
        let depth = Depth::try_from(depth_raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Integer,
                e.into(),
            )
        })?;
        let date: Option<String> = row.get(9)?;
        let due_date: Option<String> = row.get(10)?;
        Ok(Goal {
            id: row.get(0)?,
            title: row.get(1)?,
            details: row.get(2)?,
            depth,
            parent_id: row.get(4)?,
            year: row.get(5)?,
            quarter: row.get(6)?,
            week_number: row.get(7)?,
            day_of_week: row.get(8)?,
            date: date.and_then(|s| s.parse::<NaiveDate>().ok()),
            due_date: due_date.and_then(|s| s.parse::<NaiveDate>().ok()),
            domain: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::test_fixtures::*;
    use crate::goal::{DayRef, PeriodReassignment, StateMutation};

    fn open_temp() -> (tempfile::TempDir, GoalDb) {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let db = GoalDb::open_at(dir.path().join("goaldeck.db")).expect("open db");
        (dir, db)
    }

    fn seed_board(db: &GoalDb) {
        db.upsert_goal(&quarterly("q1", "Ship v2")).unwrap();
        db.upsert_goal(&weekly("w1", "Land migrations", "q1", 5)).unwrap();
        db.upsert_goal(&daily("d1", "Write schema", "w1", 5, 1)).unwrap();
        db.upsert_goal(&daily("d2", "Backfill rows", "w1", 5, 3)).unwrap();
    }

    #[test]
    fn goal_round_trip() {
        let (_dir, db) = open_temp();
        let mut goal = daily("d1", "Write schema", "w1", 5, 1);
        goal.due_date = "2026-02-06".parse().ok();
        db.upsert_goal(&quarterly("q1", "Ship v2")).unwrap();
        db.upsert_goal(&weekly("w1", "Land migrations", "q1", 5)).unwrap();
        db.upsert_goal(&goal).unwrap();

        let loaded = db.get_goal_by_id("d1").unwrap().unwrap();
        assert_eq!(loaded.title, "Write schema");
        assert_eq!(loaded.depth, Depth::Daily);
        assert_eq!(loaded.day_of_week, Some(1));
        assert_eq!(loaded.due_date, "2026-02-06".parse().ok());
        assert_eq!(loaded.date, goal.date);
    }

    #[test]
    fn week_snapshot_includes_quarter_and_week_rows() {
        let (_dir, db) = open_temp();
        seed_board(&db);
        db.upsert_goal(&daily("d9", "Other week", "w1", 6, 1)).unwrap();

        let snap = db.week_snapshot(&week(5)).unwrap();
        assert!(snap.goal("q1").is_some());
        assert!(snap.goal("w1").is_some());
        assert!(snap.goal("d1").is_some());
        assert!(snap.goal("d2").is_some());
        assert!(snap.goal("d9").is_none());
    }

    #[test]
    fn apply_batch_upserts_states_and_reassigns() {
        let (_dir, db) = open_temp();
        seed_board(&db);

        let to = DayRef {
            year: 2026,
            quarter: 1,
            week: 6,
            day: 3,
        };
        let batch = WriteBatch {
            mutations: vec![StateMutation {
                goal_id: "q1".to_string(),
                week: week(6),
                state: GoalState {
                    is_starred: true,
                    ..Default::default()
                },
            }],
            reassignments: vec![PeriodReassignment {
                goal_id: "d2".to_string(),
                to,
                date: to.date(),
            }],
        };
        db.apply_batch(&batch).unwrap();

        let moved = db.get_goal_by_id("d2").unwrap().unwrap();
        assert_eq!(moved.week_number, Some(6));
        assert_eq!(moved.day_of_week, Some(3));
        assert_eq!(moved.date, to.date());
        // Hierarchy edge untouched.
        assert_eq!(moved.parent_id.as_deref(), Some("w1"));

        let snap = db.week_snapshot(&week(6)).unwrap();
        assert!(snap.state_of("q1", &week(6)).is_starred);
    }

    #[test]
    fn apply_batch_is_atomic() {
        let (_dir, db) = open_temp();
        seed_board(&db);

        let to = DayRef {
            year: 2026,
            quarter: 1,
            week: 6,
            day: 1,
        };
        let batch = WriteBatch {
            mutations: vec![StateMutation {
                goal_id: "d1".to_string(),
                week: week(5),
                state: GoalState::default().with_complete(true, &now()),
            }],
            reassignments: vec![
                PeriodReassignment {
                    goal_id: "d1".to_string(),
                    to,
                    date: to.date(),
                },
                PeriodReassignment {
                    goal_id: "ghost".to_string(),
                    to,
                    date: to.date(),
                },
            ],
        };

        let err = db.apply_batch(&batch).unwrap_err();
        assert!(err.contains("ghost"));

        // Nothing from the failed batch is visible.
        let snap = db.week_snapshot(&week(5)).unwrap();
        assert!(!snap.state_of("d1", &week(5)).is_complete);
        let d1 = db.get_goal_by_id("d1").unwrap().unwrap();
        assert_eq!(d1.week_number, Some(5));
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let (_dir, db) = open_temp();
        db.apply_batch(&WriteBatch::default()).unwrap();
    }

    #[test]
    fn week_stats_counts_daily_goals() {
        let (_dir, db) = open_temp();
        seed_board(&db);
        db.apply_batch(&WriteBatch {
            mutations: vec![StateMutation {
                goal_id: "d1".to_string(),
                week: week(5),
                state: GoalState::default().with_complete(true, &now()),
            }],
            reassignments: vec![],
        })
        .unwrap();

        let stats = db.week_stats(&week(5)).unwrap();
        assert_eq!(stats, WeekStats { completed: 1, total: 2 });
    }

    #[test]
    fn list_adhoc_orders_by_domain_then_title() {
        let (_dir, db) = open_temp();
        db.upsert_goal(&adhoc("a1", "Renew passport", "personal", 5, 2)).unwrap();
        db.upsert_goal(&adhoc("a2", "Book dentist", "health", 5, 2)).unwrap();
        db.upsert_goal(&adhoc("a3", "call bank", "personal", 5, 2)).unwrap();
        db.upsert_goal(&adhoc("a4", "Other day", "personal", 5, 3)).unwrap();

        let day = DayRef {
            year: 2026,
            quarter: 1,
            week: 5,
            day: 2,
        };
        let goals = db.list_adhoc(&day).unwrap();
        let ids: Vec<&str> = goals.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a3", "a1"]);
    }

    #[test]
    fn delete_cascades_to_descendants_and_states() {
        let (_dir, db) = open_temp();
        seed_board(&db);
        db.apply_batch(&WriteBatch {
            mutations: vec![StateMutation {
                goal_id: "d1".to_string(),
                week: week(5),
                state: GoalState::default().with_complete(true, &now()),
            }],
            reassignments: vec![],
        })
        .unwrap();

        db.delete_goal("w1").unwrap();
        assert!(db.get_goal_by_id("w1").unwrap().is_none());
        assert!(db.get_goal_by_id("d1").unwrap().is_none());
        assert!(db.get_goal_by_id("d2").unwrap().is_none());
        assert!(db.get_goal_by_id("q1").unwrap().is_some());

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM goal_states", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn archive_hides_goal_from_reads() {
        let (_dir, db) = open_temp();
        seed_board(&db);
        db.archive_goal("d1").unwrap();
        assert!(db.get_goal_by_id("d1").unwrap().is_none());
        let snap = db.week_snapshot(&week(5)).unwrap();
        assert!(snap.goal("d1").is_none());
    }
}
