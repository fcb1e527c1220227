//! Per-user and global admission control for job submission.
//!
//! Each user gets minute/hour/day request windows plus a concurrent-job
//! ceiling, keyed by role. Two global ceilings cap system-wide concurrency
//! and job starts per minute. Windows reset lazily on read; there is no
//! background sweep. State is process-local, owned by the orchestrator that
//! created the limiter.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

const MINUTE_MS: u128 = 60_000;
const HOUR_MS: u128 = 3_600_000;
const DAY_MS: u128 = 86_400_000;

/// Caller role, selecting a default limit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Learners generating practice material.
    Student,
    /// Course authors; higher ceilings.
    Instructor,
    /// Operators; highest ceilings.
    Admin,
}

/// Per-role admission ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleLimits {
    /// Job submissions allowed per minute.
    pub requests_per_minute: u32,
    /// Job submissions allowed per hour.
    pub requests_per_hour: u32,
    /// Job submissions allowed per day.
    pub requests_per_day: u32,
    /// Concurrently active jobs allowed.
    pub max_concurrent_jobs: u32,
}

/// System-wide admission ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalLimits {
    /// Concurrently active jobs across all users.
    pub max_concurrent_jobs: u32,
    /// Job starts allowed per minute across all users.
    pub max_starts_per_minute: u32,
}

/// Full rate-limit configuration: one table per role plus global ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Limits for [`Role::Student`].
    pub student: RoleLimits,
    /// Limits for [`Role::Instructor`].
    pub instructor: RoleLimits,
    /// Limits for [`Role::Admin`].
    pub admin: RoleLimits,
    /// Global ceilings.
    pub global: GlobalLimits,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            student: RoleLimits {
                requests_per_minute: 2,
                requests_per_hour: 10,
                requests_per_day: 20,
                max_concurrent_jobs: 1,
            },
            instructor: RoleLimits {
                requests_per_minute: 5,
                requests_per_hour: 30,
                requests_per_day: 100,
                max_concurrent_jobs: 3,
            },
            admin: RoleLimits {
                requests_per_minute: 20,
                requests_per_hour: 200,
                requests_per_day: 1_000,
                max_concurrent_jobs: 10,
            },
            global: GlobalLimits {
                max_concurrent_jobs: 25,
                max_starts_per_minute: 30,
            },
        }
    }
}

impl RateLimitConfig {
    /// Limit table for a role.
    #[must_use]
    pub const fn limits_for(&self, role: Role) -> &RoleLimits {
        match role {
            Role::Student => &self.student,
            Role::Instructor => &self.instructor,
            Role::Admin => &self.admin,
        }
    }
}

/// Why an admission was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The user already has their maximum number of active jobs.
    UserConcurrency,
    /// The system is at its global concurrency ceiling.
    GlobalConcurrency,
    /// Too many jobs started system-wide this minute.
    GlobalStartRate,
    /// Per-user minute window exhausted.
    MinuteRate,
    /// Per-user hour window exhausted.
    HourRate,
    /// Per-user day window exhausted.
    DayRate,
}

impl DenyReason {
    /// Actionable, user-facing message for this denial.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::UserConcurrency => {
                "You already have a generation job in progress. Wait for it to finish before starting another."
            }
            Self::GlobalConcurrency | Self::GlobalStartRate => {
                "The system is at capacity right now. Please try again shortly."
            }
            Self::MinuteRate => "Too many requests this minute. Slow down and try again.",
            Self::HourRate => "Hourly request limit reached. Try again later this hour.",
            Self::DayRate => "Daily request limit reached. Try again tomorrow.",
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Whether the submission may proceed.
    pub allowed: bool,
    /// Denial reason, present when not allowed.
    pub reason: Option<DenyReason>,
    /// When retrying may succeed, for window-based denials.
    pub retry_after: Option<Duration>,
}

impl Admission {
    const fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            retry_after: None,
        }
    }

    const fn denied(reason: DenyReason, retry_after: Option<Duration>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            retry_after,
        }
    }
}

#[derive(Debug, Clone)]
struct CountWindow {
    count: u32,
    window_ms: u128,
    reset_at_ms: u128,
}

impl CountWindow {
    const fn new(window_ms: u128, now_ms: u128) -> Self {
        Self {
            count: 0,
            window_ms,
            reset_at_ms: now_ms + window_ms,
        }
    }

    /// Lazy reset: a window whose time has elapsed restarts at zero.
    fn refresh(&mut self, now_ms: u128) {
        if now_ms >= self.reset_at_ms {
            self.count = 0;
            self.reset_at_ms = now_ms + self.window_ms;
        }
    }

    fn retry_after(&self, now_ms: u128) -> Duration {
        let remaining = self.reset_at_ms.saturating_sub(now_ms).max(1);
        Duration::from_millis(u64::try_from(remaining).unwrap_or(u64::MAX))
    }
}

#[derive(Debug)]
struct UserWindows {
    minute: CountWindow,
    hour: CountWindow,
    day: CountWindow,
    active_jobs: u32,
}

impl UserWindows {
    const fn new(now_ms: u128) -> Self {
        Self {
            minute: CountWindow::new(MINUTE_MS, now_ms),
            hour: CountWindow::new(HOUR_MS, now_ms),
            day: CountWindow::new(DAY_MS, now_ms),
            active_jobs: 0,
        }
    }
}

#[derive(Debug)]
struct LimiterInner {
    users: HashMap<String, UserWindows>,
    global_active: u32,
    global_starts: CountWindow,
}

/// Admission-control gate for job submission.
pub struct RateLimiter {
    config: RateLimitConfig,
    inner: Mutex<LimiterInner>,
}

impl RateLimiter {
    /// Create a limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig, now_ms: u128) -> Self {
        Self {
            config,
            inner: Mutex::new(LimiterInner {
                users: HashMap::new(),
                global_active: 0,
                global_starts: CountWindow::new(MINUTE_MS, now_ms),
            }),
        }
    }

    /// Check all ceilings for `user_id` and, if admitted, record the start.
    ///
    /// Concurrency is checked before request rates so a user blocked on
    /// concurrency gets a specific message instead of a generic rate one.
    /// On admission every counter increment happens atomically under one
    /// lock, so a concurrent `admit` cannot observe a half-recorded start.
    pub fn admit(&self, user_id: &str, role: Role, now_ms: u128) -> Admission {
        let limits = self.config.limits_for(role);
        let mut inner = self.inner.lock();

        inner.global_starts.refresh(now_ms);
        {
            let user = inner
                .users
                .entry(user_id.to_owned())
                .or_insert_with(|| UserWindows::new(now_ms));
            user.minute.refresh(now_ms);
            user.hour.refresh(now_ms);
            user.day.refresh(now_ms);

            if user.active_jobs >= limits.max_concurrent_jobs {
                tracing::debug!(user = user_id, "denied: user concurrency ceiling");
                return Admission::denied(DenyReason::UserConcurrency, None);
            }
        }
        if inner.global_active >= self.config.global.max_concurrent_jobs {
            tracing::warn!("denied: global concurrency ceiling");
            return Admission::denied(DenyReason::GlobalConcurrency, None);
        }
        if inner.global_starts.count >= self.config.global.max_starts_per_minute {
            let retry_after = inner.global_starts.retry_after(now_ms);
            tracing::warn!("denied: global start rate");
            return Admission::denied(DenyReason::GlobalStartRate, Some(retry_after));
        }

        {
            let Some(user) = inner.users.get_mut(user_id) else {
                // Entry inserted above; a missing one means the map was
                // mutated concurrently, which the lock forbids.
                return Admission::denied(DenyReason::UserConcurrency, None);
            };
            if user.minute.count >= limits.requests_per_minute {
                let retry_after = user.minute.retry_after(now_ms);
                return Admission::denied(DenyReason::MinuteRate, Some(retry_after));
            }
            if user.hour.count >= limits.requests_per_hour {
                let retry_after = user.hour.retry_after(now_ms);
                return Admission::denied(DenyReason::HourRate, Some(retry_after));
            }
            if user.day.count >= limits.requests_per_day {
                let retry_after = user.day.retry_after(now_ms);
                return Admission::denied(DenyReason::DayRate, Some(retry_after));
            }

            user.minute.count += 1;
            user.hour.count += 1;
            user.day.count += 1;
            user.active_jobs += 1;
        }
        inner.global_active += 1;
        inner.global_starts.count += 1;
        Admission::allowed()
    }

    /// Release one active-job slot for `user_id`.
    ///
    /// Called on every job exit path, success or failure, so quota can never
    /// leak. Saturating: releasing an unknown or idle user is a no-op.
    pub fn release(&self, user_id: &str) {
        let mut inner = self.inner.lock();
        let held_slot = inner.users.get_mut(user_id).is_some_and(|user| {
            if user.active_jobs > 0 {
                user.active_jobs -= 1;
                true
            } else {
                false
            }
        });
        // The global counter only moves for a slot this user really held,
        // so a spurious release cannot free someone else's capacity.
        if held_slot {
            inner.global_active = inner.global_active.saturating_sub(1);
        }
    }

    /// Currently active jobs for a user (diagnostics).
    #[must_use]
    pub fn active_jobs(&self, user_id: &str) -> u32 {
        self.inner
            .lock()
            .users
            .get(user_id)
            .map_or(0, |u| u.active_jobs)
    }

    /// Currently active jobs system-wide (diagnostics).
    #[must_use]
    pub fn global_active_jobs(&self) -> u32 {
        self.inner.lock().global_active
    }
}
