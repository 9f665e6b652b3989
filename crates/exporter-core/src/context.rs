//! Per-pass context
//!
//! Every collection pass gets its own context. It carries the pass id used in logs and the
//! deadline every collaborator call is bounded by.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PassContext {
    id: Uuid,
    deadline: Option<Instant>,
}

impl PassContext {
    /// Context without a deadline
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            deadline: None,
        }
    }

    /// Context expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            deadline: Some(deadline),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Run `operation` until it completes or the deadline passes
    pub async fn bound<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, future)
                .await
                .map_err(|_| Error::deadline_exceeded(operation.to_string()))?,
            None => future.await,
        }
    }
}

impl Default for PassContext {
    fn default() -> Self {
        Self::new()
    }
}
