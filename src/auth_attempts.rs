// Failed sign-in tracking with temporary lockout

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Too many failed attempts, try again after {until}")]
    LockedOut { until: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lockout: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout: Duration::minutes(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    // Failures so far and how many remain before lockout
    Counting { failures: u32, remaining: u32 },
    Locked { until: DateTime<Utc> },
}

#[derive(Debug, Default, Clone)]
struct AttemptRecord {
    failures: u32,
    locked_until: Option<DateTime<Utc>>,
}

pub struct LoginGuard {
    policy: LockoutPolicy,
    attempts: DashMap<String, AttemptRecord>,
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl LoginGuard {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            attempts: DashMap::new(),
        }
    }

    pub fn check(&self, email: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let key = normalize(email);
        match self.attempts.get(&key).and_then(|r| r.locked_until) {
            Some(until) if now < until => Err(AuthError::LockedOut { until }),
            _ => Ok(()),
        }
    }

    pub fn record_failure(&self, email: &str, now: DateTime<Utc>) -> AttemptState {
        let key = normalize(email);
        let mut record = self.attempts.entry(key.clone()).or_default();

        if let Some(until) = record.locked_until {
            if now < until {
                return AttemptState::Locked { until };
            }
            // lock expired, start a fresh window
            record.locked_until = None;
        }

        record.failures += 1;
        if record.failures >= self.policy.max_attempts {
            let until = now + self.policy.lockout;
            record.failures = 0;
            record.locked_until = Some(until);
            warn!("Locking sign-in for {} until {}", key, until);
            return AttemptState::Locked { until };
        }

        debug!("Failed sign-in {} for {}", record.failures, key);
        AttemptState::Counting {
            failures: record.failures,
            remaining: self.policy.max_attempts - record.failures,
        }
    }

    pub fn record_success(&self, email: &str) {
        self.attempts.remove(&normalize(email));
    }

    pub fn failures(&self, email: &str) -> u32 {
        self.attempts
            .get(&normalize(email))
            .map_or(0, |r| r.failures)
    }
}

impl Default for LoginGuard {
    fn default() -> Self {
        Self::new(LockoutPolicy::default())
    }
}
