//! Session Store: per-user session records shared across jobs
//!
//! Each user's session sits behind its own mutex inside a sharded map. Map
//! shard locks are only held long enough to clone the entry handle, so a
//! slow update for one user never blocks another user's update.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::model::{Session, UserId};

struct Slot {
    session: Session,
    /// Set once the slot has left the map; updates must re-resolve
    evicted: bool,
}

type Cell = Arc<Mutex<Slot>>;

/// Process-wide user → session mapping
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<UserId, Cell>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, user: &UserId) -> Option<Cell> {
        self.sessions.get(user).map(|entry| Arc::clone(entry.value()))
    }

    fn cell_or_insert(&self, user: &UserId) -> Cell {
        let entry = self.sessions.entry(user.clone()).or_insert_with(|| {
            debug!("Creating session for {}", user);
            Arc::new(Mutex::new(Slot {
                session: Session::new(user.clone()),
                evicted: false,
            }))
        });
        Arc::clone(entry.value())
    }

    /// Current session for `user`, created on first contact.
    pub fn get_or_create(&self, user: &UserId) -> Session {
        self.upsert(user, |session| session.clone())
    }

    /// Snapshot of an existing session.
    pub fn get(&self, user: &UserId) -> Option<Session> {
        self.update(user, |session| session.clone())
    }

    /// Atomic read-modify-write of an existing session.
    ///
    /// Returns `None` when the user has no session. Updates for the same
    /// user are serialised; updates for different users run independently.
    pub fn update<R>(&self, user: &UserId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut f = Some(f);
        loop {
            let cell = self.cell(user)?;
            let mut slot = cell.lock();
            if slot.evicted {
                // Replaced or removed while we waited; look again
                continue;
            }
            let f = f.take()?;
            return Some(f(&mut slot.session));
        }
    }

    /// Like [`update`](Self::update), creating the session first if needed.
    pub fn upsert<R>(&self, user: &UserId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut f = Some(f);
        loop {
            let cell = self.cell_or_insert(user);
            let mut slot = cell.lock();
            if slot.evicted {
                continue;
            }
            if let Some(f) = f.take() {
                return f(&mut slot.session);
            }
        }
    }

    /// Remove the session for `user`, returning its last state.
    pub fn remove(&self, user: &UserId) -> Option<Session> {
        self.remove_if(user, |_| true)
    }

    /// Remove the session only if `predicate` holds under its lock.
    pub fn remove_if(
        &self,
        user: &UserId,
        predicate: impl FnOnce(&Session) -> bool,
    ) -> Option<Session> {
        let cell = self.cell(user)?;
        let mut slot = cell.lock();
        if slot.evicted || !predicate(&slot.session) {
            return None;
        }
        slot.evicted = true;
        self.sessions.remove_if(user, |_, v| Arc::ptr_eq(v, &cell));
        debug!("Removed session for {}", user);
        Some(slot.session.clone())
    }

    /// Evict sessions idle longer than `idle_timeout`.
    ///
    /// Evicted sessions with a running job have that job cancelled; the job
    /// then releases its own workspace.
    pub fn sweep(&self, idle_timeout: Duration) -> Vec<UserId> {
        let now = Utc::now();
        let cells: Vec<(UserId, Cell)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut removed = Vec::new();
        for (user, cell) in cells {
            let mut slot = cell.lock();
            if slot.evicted || slot.session.idle_for(now) <= idle_timeout {
                continue;
            }
            if let Some(job) = &slot.session.active_job {
                info!("Cancelling job {} of idle session {}", job.job_id, user);
                job.cancel.cancel();
            }
            slot.evicted = true;
            self.sessions.remove_if(&user, |_, v| Arc::ptr_eq(v, &cell));
            removed.push(user);
        }

        if !removed.is_empty() {
            info!("Swept {} idle sessions", removed.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Periodically sweep idle sessions until `shutdown` fires.
pub fn start_sweeper(
    store: SessionStore,
    every: Duration,
    idle_timeout: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    store.sweep(idle_timeout);
                }
            }
        }
        debug!("Session sweeper stopped");
    })
}
