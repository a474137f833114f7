//! Single-flight coordination for session refresh.
//!
//! The first caller to `join` while idle becomes the leader and performs the
//! refresh; everyone arriving while it runs becomes a follower and waits for
//! the leader's outcome. Followers are woken in arrival order, all with the
//! same outcome, and the coordinator is idle again before any of them runs.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    Failed,
}

#[derive(Default)]
enum State {
    #[default]
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

pub enum Ticket<'a> {
    Leader(LeaderGuard<'a>),
    Follower(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn join(&self) -> Ticket<'_> {
        let mut state = self.lock();
        if let State::Refreshing { waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            return Ticket::Follower(rx);
        }

        *state = State::Refreshing {
            waiters: Vec::new(),
        };
        Ticket::Leader(LeaderGuard {
            coordinator: self,
            completed: false,
        })
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), State::Refreshing { .. })
    }

    /// Number of followers currently queued.
    pub fn waiting(&self) -> usize {
        match &*self.lock() {
            State::Idle => 0,
            State::Refreshing { waiters } => waiters.len(),
        }
    }

    fn finish(&self, outcome: RefreshOutcome) {
        let waiters = match std::mem::take(&mut *self.lock()) {
            State::Idle => Vec::new(),
            State::Refreshing { waiters } => waiters,
        };
        for waiter in waiters {
            // A follower that gave up has dropped its receiver.
            let _ = waiter.send(outcome);
        }
    }
}

/// Held by the caller performing the refresh. Dropping it without calling
/// `complete` resolves every follower as failed.
pub struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    completed: bool,
}

impl LeaderGuard<'_> {
    pub fn complete(mut self, outcome: RefreshOutcome) {
        self.completed = true;
        self.coordinator.finish(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.coordinator.finish(RefreshOutcome::Failed);
        }
    }
}

/// Await a follower ticket. A leader that vanished counts as a failure.
pub async fn wait_for(receiver: oneshot::Receiver<RefreshOutcome>) -> RefreshOutcome {
    receiver.await.unwrap_or(RefreshOutcome::Failed)
}
