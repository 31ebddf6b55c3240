//! Supervised reconnection for background store sessions.
//!
//! Watch streams, leases and sessions run on their own tasks. When one of them
//! fails, the owning task asks its [`Supervisor`] whether to try again. The
//! supervisor sleeps with capped exponential backoff, reports the component as
//! degraded, and gives up after `max_attempts` consecutive failures, applying the
//! policy's [`ExhaustedAction`].

mod health;

pub use health::{ComponentHealth, HealthRegistry, HealthStatus};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// What to do once the reconnect budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedAction {
    /// Terminate the process so the orchestrator restarts it
    Exit,
    /// Stop the session and keep serving the last snapshot
    StayDegraded,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive failures tolerated before giving up
    pub max_attempts: u32,
    pub on_exhausted: ExhaustedAction,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_attempts: 10,
            on_exhausted: ExhaustedAction::Exit,
        }
    }
}

impl ReconnectPolicy {
    /// Budget for a starting node to appear in the service directory:
    /// six checks, 0.5 s doubling to 8 s.
    pub fn join() -> Self {
        Self { max_backoff: Duration::from_secs(8), max_attempts: 6, ..Self::default() }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_backoff.as_millis() as u64;
        let max_ms = self.max_backoff.as_millis() as u64;
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }
}

/// Per-task reconnect bookkeeping.
#[derive(Debug)]
pub struct Supervisor {
    component: String,
    policy: ReconnectPolicy,
    health: HealthRegistry,
    attempts: u32,
}

impl Supervisor {
    pub fn new(component: impl Into<String>, policy: ReconnectPolicy, health: HealthRegistry) -> Self {
        Self { component: component.into(), policy, health, attempts: 0 }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The session is up; resets the failure budget.
    pub fn established(&mut self) {
        if self.attempts > 0 {
            info!(component = %self.component, "session re-established after {} attempt(s)", self.attempts);
        }
        self.attempts = 0;
        self.health.mark_healthy(&self.component);
    }

    /// Record a failure and wait before the next attempt.
    ///
    /// Returns `false` when the budget is exhausted and the policy is
    /// [`ExhaustedAction::StayDegraded`]; the caller must stop.
    pub async fn retry(&mut self, error: &(dyn std::fmt::Display + Sync)) -> bool {
        self.attempts += 1;
        let message = error.to_string();

        if self.attempts > self.policy.max_attempts {
            self.health.mark_failed(&self.component, self.attempts, &message);
            error!(
                component = %self.component,
                attempts = self.attempts,
                "reconnect budget exhausted: {}",
                message
            );
            match self.policy.on_exhausted {
                ExhaustedAction::Exit => std::process::exit(1),
                ExhaustedAction::StayDegraded => return false,
            }
        }

        self.health.mark_degraded(&self.component, self.attempts, &message);
        let delay = self.policy.backoff(self.attempts - 1);
        warn!(
            component = %self.component,
            attempt = self.attempts,
            max_attempts = self.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "session failed, reconnecting: {}",
            message
        );
        sleep(delay).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            max_attempts,
            on_exhausted: ExhaustedAction::StayDegraded,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff(10), Duration::from_secs(30));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_marks_failed() {
        let health = HealthRegistry::new();
        let mut supervisor = Supervisor::new("etcd:projects", fast_policy(2), health.clone());

        assert!(supervisor.retry(&"connection refused").await);
        assert_eq!(health.status_of("etcd:projects"), Some(HealthStatus::Degraded));
        assert!(supervisor.retry(&"connection refused").await);
        assert!(!supervisor.retry(&"connection refused").await);
        assert_eq!(health.status_of("etcd:projects"), Some(HealthStatus::Failed));
    }

    #[tokio::test]
    async fn test_established_resets_budget() {
        let health = HealthRegistry::new();
        let mut supervisor = Supervisor::new("consul:session", fast_policy(2), health.clone());

        assert!(supervisor.retry(&"renew failed").await);
        assert!(supervisor.retry(&"renew failed").await);
        supervisor.established();
        assert_eq!(supervisor.attempts(), 0);
        assert_eq!(health.status(), HealthStatus::Healthy);

        assert!(supervisor.retry(&"renew failed").await);
        assert_eq!(supervisor.attempts(), 1);
    }
}
