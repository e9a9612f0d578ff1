//! Optimistic mutation tracking per goal.
//!
//! The UI applies a change locally, kicks off a background commit, and
//! renders from this tracker until the authoritative store snapshot
//! arrives. Each goal is in one of three states: `Synced` (nothing in
//! flight), `Pending` (a commit is outstanding, render the local value),
//! or `Error` (the last commit failed, show a toast). A fresh snapshot
//! moves a goal to `Synced` regardless of prior state.
//!
//! Tickets make replacement explicit: a second `track` on the same goal
//! supersedes the first, and a settle with a superseded ticket is ignored
//! (last-write-wins for pending-state display; the in-flight operation
//! itself is not cancelled).

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;

use crate::goal::GoalState;

/// Reconciliation state of one goal, as rendered by the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SyncState {
    Synced,
    Pending { local: GoalState },
    Error { message: String },
}

/// Handle for settling a tracked mutation. Settles with a stale ticket
/// (another mutation replaced this one) are ignored.
#[derive(Debug, Clone)]
pub struct MutationTicket {
    goal_id: String,
    generation: u64,
}

#[derive(Debug, Clone)]
enum Entry {
    Pending { local: GoalState, started_at: String },
    Error { message: String },
}

#[derive(Debug)]
struct Tracked {
    generation: u64,
    entry: Entry,
}

/// Per-goal in-flight mutation registry.
#[derive(Debug, Default)]
pub struct MutationTracker {
    entries: DashMap<String, Tracked>,
    generation: AtomicU64,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-flight mutation carrying the optimistic local value.
    /// Replaces any previously tracked mutation for the goal.
    pub fn track(&self, goal_id: &str, local: GoalState) -> MutationTicket {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.insert(
            goal_id.to_string(),
            Tracked {
                generation,
                entry: Entry::Pending {
                    local,
                    started_at: Utc::now().to_rfc3339(),
                },
            },
        );
        MutationTicket {
            goal_id: goal_id.to_string(),
            generation,
        }
    }

    pub fn is_pending(&self, goal_id: &str) -> bool {
        self.entries
            .get(goal_id)
            .map(|t| matches!(t.entry, Entry::Pending { .. }))
            .unwrap_or(false)
    }

    /// RFC 3339 timestamp of when the current pending mutation started,
    /// for stuck-commit diagnostics in the shell.
    pub fn pending_since(&self, goal_id: &str) -> Option<String> {
        self.entries.get(goal_id).and_then(|t| match &t.entry {
            Entry::Pending { started_at, .. } => Some(started_at.clone()),
            Entry::Error { .. } => None,
        })
    }

    pub fn state_of(&self, goal_id: &str) -> SyncState {
        match self.entries.get(goal_id) {
            None => SyncState::Synced,
            Some(t) => match &t.entry {
                Entry::Pending { local, .. } => SyncState::Pending {
                    local: local.clone(),
                },
                Entry::Error { message } => SyncState::Error {
                    message: message.clone(),
                },
            },
        }
    }

    /// Commit succeeded. The authoritative snapshot will follow over the
    /// live subscription; until then the goal reads as synced.
    pub fn settle_ok(&self, ticket: &MutationTicket) {
        self.entries
            .remove_if(&ticket.goal_id, |_, t| t.generation == ticket.generation);
    }

    /// Commit failed. Clears pending and surfaces the error for display;
    /// no retry, no local rollback; the next snapshot self-corrects.
    pub fn settle_err(&self, ticket: &MutationTicket, message: &str) {
        if let Some(mut t) = self.entries.get_mut(&ticket.goal_id) {
            if t.generation == ticket.generation {
                t.entry = Entry::Error {
                    message: message.to_string(),
                };
            }
        }
    }

    /// An authoritative snapshot arrived: every goal it mentions is synced,
    /// whatever state it was in.
    pub fn apply_snapshot<'a>(&self, goal_ids: impl IntoIterator<Item = &'a str>) {
        for id in goal_ids {
            self.entries.remove(id);
        }
    }

    /// Number of goals currently tracked (pending or errored).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Track a mutation and settle it from a spawned commit future.
    ///
    /// The engine itself never awaits; this is the boundary where a
    /// computed effect is handed to the asynchronous store call.
    pub fn track_future<F>(
        self: &Arc<Self>,
        goal_id: &str,
        local: GoalState,
        commit: F,
    ) -> MutationTicket
    where
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        let ticket = self.track(goal_id, local);
        let tracker = Arc::clone(self);
        let handle = ticket.clone();
        tokio::spawn(async move {
            match commit.await {
                Ok(()) => tracker.settle_ok(&handle),
                Err(message) => {
                    log::warn!("Commit failed for goal {}: {}", handle.goal_id, message);
                    tracker.settle_err(&handle, &message);
                }
            }
        });
        ticket
    }
}
