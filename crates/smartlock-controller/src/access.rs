//! Access evaluation.
//!
//! Rules, first match wins:
//!
//! 1. a blocked lock denies everything
//! 2. an open lock treats any presented code as a request to close
//! 3. otherwise the code must be in the access list
//!
//! An empty access list denies every code and is reported as a
//! misconfiguration.

use chrono::{DateTime, Utc};
use smartlock_core::constants::MAX_ATTEMPT_LOG_SIZE;
use smartlock_core::{AccessCode, Error, LockState};
use std::collections::VecDeque;
use std::fmt;
use tracing::{error, info};

/// Why a code was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenialReason {
    /// The lock is blocked.
    Blocked,
    /// The code is not in the access list.
    NotAuthorized,
    /// The access list is empty.
    EmptyAccessList,
    /// The presented input is not a valid code.
    InvalidCode,
}

impl DenialReason {
    /// Returns `true` if the denial raises an operator alert.
    ///
    /// Blocked denials are expected while the operator holds the lock.
    pub fn raises_alert(self) -> bool {
        !matches!(self, DenialReason::Blocked)
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Blocked => write!(f, "blocked"),
            DenialReason::NotAuthorized => write!(f, "not authorized"),
            DenialReason::EmptyAccessList => write!(f, "ACL empty"),
            DenialReason::InvalidCode => write!(f, "invalid code"),
        }
    }
}

/// Outcome of presenting a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Code accepted, the lock should open.
    Granted(AccessCode),
    /// Code refused.
    Denied {
        code: Option<AccessCode>,
        reason: DenialReason,
    },
    /// Code presented while open, the lock should close.
    ClosedByReentry(Option<AccessCode>),
}

impl AccessDecision {
    /// Returns `true` for [`AccessDecision::Denied`].
    pub fn is_denied(&self) -> bool {
        matches!(self, AccessDecision::Denied { .. })
    }
}

/// One refused code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockAttempt {
    pub at: DateTime<Utc>,
    pub code: String,
    pub reason: DenialReason,
}

/// Refused codes, oldest first.
///
/// Kept in memory only. Past its capacity the oldest entry is dropped.
#[derive(Debug, Clone)]
pub struct UnlockAttemptLog {
    attempts: VecDeque<UnlockAttempt>,
    capacity: usize,
}

impl UnlockAttemptLog {
    /// Create a log holding [`MAX_ATTEMPT_LOG_SIZE`] entries.
    pub fn new() -> Self {
        Self::with_capacity(MAX_ATTEMPT_LOG_SIZE)
    }

    /// Create a log holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            attempts: VecDeque::with_capacity(capacity.min(MAX_ATTEMPT_LOG_SIZE)),
            capacity: capacity.max(1),
        }
    }

    /// Append an attempt stamped now.
    pub fn record(&mut self, code: impl Into<String>, reason: DenialReason) {
        if self.attempts.len() >= self.capacity {
            self.attempts.pop_front();
        }
        self.attempts.push_back(UnlockAttempt {
            at: Utc::now(),
            code: code.into(),
            reason,
        });
    }

    /// Most recent attempt.
    pub fn last(&self) -> Option<&UnlockAttempt> {
        self.attempts.back()
    }

    /// Attempts, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &UnlockAttempt> {
        self.attempts.iter()
    }

    /// Number of attempts kept.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Returns `true` if no attempt was recorded.
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

impl Default for UnlockAttemptLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides what a presented code does to the lock.
#[derive(Debug, Default)]
pub struct AccessEvaluator {
    attempts: UnlockAttemptLog,
}

impl AccessEvaluator {
    /// Create an evaluator with an empty attempt log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `presented` against `state`.
    ///
    /// Refused codes are recorded in the attempt log, except while blocked.
    pub fn evaluate(&mut self, state: &LockState, presented: &str) -> AccessDecision {
        let code = AccessCode::new(presented).ok();

        if state.blocked {
            info!(code = presented, "Access denied, lock blocked");
            return AccessDecision::Denied {
                code,
                reason: DenialReason::Blocked,
            };
        }

        if !state.closed {
            info!(code = presented, "Code presented while open, closing");
            return AccessDecision::ClosedByReentry(code);
        }

        let Some(code) = code else {
            return self.deny(presented, None, DenialReason::InvalidCode);
        };

        match state.access_list.authorize(&code) {
            Ok(true) => {
                info!(code = %code, "Access granted");
                AccessDecision::Granted(code)
            }
            Ok(false) => self.deny(presented, Some(code), DenialReason::NotAuthorized),
            Err(Error::EmptyAccessList) => {
                error!(code = %code, "Access list is empty, every code is refused");
                self.deny(presented, Some(code), DenialReason::EmptyAccessList)
            }
            Err(e) => {
                error!(code = %code, error = %e, "Access check failed");
                self.deny(presented, Some(code), DenialReason::NotAuthorized)
            }
        }
    }

    fn deny(&mut self, presented: &str, code: Option<AccessCode>, reason: DenialReason) -> AccessDecision {
        info!(code = presented, %reason, "Access denied");
        self.attempts.record(presented.trim(), reason);
        AccessDecision::Denied { code, reason }
    }

    /// Refused attempts so far.
    pub fn attempts(&self) -> &UnlockAttemptLog {
        &self.attempts
    }
}
