//! Clock and id-generator implementations.
//!
//! Production uses wall-clock and UUIDs. The deterministic variants are
//! public because hosts replaying a session need them too, not just this
//! crate's tests.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::infrastructure::ports::{ClockPort, IdPort};

/// System clock - uses real time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Production id generator - random UUIDs.
#[derive(Debug, Default)]
pub struct UuidIds;

impl UuidIds {
    pub fn new() -> Self {
        Self
    }
}

impl IdPort for UuidIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Fixed clock - always returns the same instant.
#[derive(Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// A fixed clock at the unix epoch.
    pub fn epoch() -> Self {
        Self(Utc.timestamp_opt(0, 0).unwrap())
    }
}

impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Advancing tick clock - every `now()` call moves time forward by a
/// fixed step, so created/modified timestamps stay distinct and ordered.
#[derive(Debug)]
pub struct TickClock {
    start_millis: i64,
    step_millis: i64,
    ticks: AtomicI64,
}

impl TickClock {
    pub fn new(start: DateTime<Utc>, step_millis: i64) -> Self {
        Self {
            start_millis: start.timestamp_millis(),
            step_millis,
            ticks: AtomicI64::new(0),
        }
    }

    /// Tick clock starting at the unix epoch with one-second steps.
    pub fn from_epoch() -> Self {
        Self::new(Utc.timestamp_opt(0, 0).unwrap(), 1000)
    }
}

impl ClockPort for TickClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        let millis = self.start_millis + tick * self.step_millis;
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap())
    }
}

/// Sequential id generator - `prefix_0`, `prefix_1`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdPort for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}_{}", self.prefix, n)
    }
}
