// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.
//!
//! All "today" and cutoff decisions are made on the kitchens' local wall
//! clock, which is UTC shifted by a fixed configured offset.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::sync::Mutex;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Build a clock from a local wall-clock time at the given offset.
    pub fn at_local(local: NaiveDateTime, offset_minutes: i32) -> Self {
        Self::new((local - Duration::minutes(i64::from(offset_minutes))).and_utc())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Convert a UTC instant to the kitchens' local wall-clock time.
pub fn local_now(now: DateTime<Utc>, offset_minutes: i32) -> NaiveDateTime {
    now.naive_utc() + Duration::minutes(i64::from(offset_minutes))
}

pub fn local_today(now: DateTime<Utc>, offset_minutes: i32) -> NaiveDate {
    local_now(now, offset_minutes).date()
}
