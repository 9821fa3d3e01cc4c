//! Five-minute epoch arithmetic and the wall clock abstraction.
//!
//! An epoch is identified by its start time in unix seconds, always a
//! multiple of [`EPOCH_SECONDS`]. The market for an epoch resolves at
//! `start + EPOCH_SECONDS`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use time::OffsetDateTime;

/// Epoch length in seconds.
pub const EPOCH_SECONDS: i64 = 300;

static SLUG_EPOCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-(\d+)$").expect("valid regex"));

/// Start of a five-minute epoch, in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(i64);

impl Epoch {
    /// The epoch containing `now` (unix seconds).
    pub fn containing(now: i64) -> Self {
        Self(now.div_euclid(EPOCH_SECONDS) * EPOCH_SECONDS)
    }

    /// Epoch start in unix seconds.
    pub fn start(self) -> i64 {
        self.0
    }

    /// Epoch end (resolution time) in unix seconds.
    pub fn end(self) -> i64 {
        self.0 + EPOCH_SECONDS
    }

    /// Seconds from `now` until this epoch ends. Negative once it has ended.
    pub fn seconds_remaining(self, now: i64) -> i64 {
        self.end() - now
    }

    /// The following epoch.
    pub fn next(self) -> Self {
        Self(self.0 + EPOCH_SECONDS)
    }

    /// Market slug for this epoch: `{prefix}-{start}`.
    pub fn slug(self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.0)
    }

    /// Parse the epoch out of a `{prefix}-{start}` slug.
    pub fn from_slug(slug: &str) -> Option<Self> {
        let captures = SLUG_EPOCH.captures(slug)?;
        let start: i64 = captures.get(2)?.as_str().parse().ok()?;
        (start % EPOCH_SECONDS == 0).then_some(Self(start))
    }

    /// UTC start time, if representable.
    pub fn start_time(self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.0).ok()
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Start of the epoch containing `now`.
pub fn current_epoch(now: i64) -> i64 {
    Epoch::containing(now).start()
}

/// Seconds until the epoch containing `now` ends. Always in `1..=300`.
pub fn seconds_remaining(now: i64) -> i64 {
    Epoch::containing(now).seconds_remaining(now)
}

/// Source of the current wall-clock time in unix seconds.
pub trait Clock: Send + Sync {
    /// Current unix time in whole seconds.
    fn now(&self) -> i64;
}

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// Clock that advances with tokio's (possibly paused) timer.
///
/// Reports `base + elapsed`, so tests driven by `tokio::time::pause` and
/// `advance` observe epoch boundaries deterministically.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_unix: i64,
    origin: tokio::time::Instant,
}

impl TokioClock {
    /// Start the clock at `base_unix`.
    pub fn starting_at(base_unix: i64) -> Self {
        Self {
            base_unix,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> i64 {
        self.base_unix + self.origin.elapsed().as_secs() as i64
    }
}
