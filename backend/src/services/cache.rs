//! Process-wide TTL cache for report bundles
//!
//! Bounded, insertion-ordered: on overflow the oldest inserted entry goes,
//! regardless of how recently it was read. Expired entries are removed
//! lazily when looked up. Each operation takes the lock once, so concurrent
//! report requests never observe a half-applied read/insert/evict.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveTime, SecondsFormat, Utc};
use shared::{DateRange, ReportPeriod};

/// Time source, swappable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `period|today-flag|date-bucket|location-scope`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a report run.
    ///
    /// The bucket always carries the requested range: calendar days when both
    /// bounds sit on midnight, full instants otherwise. `today` runs also
    /// carry the current hour since their data changes through the day.
    pub fn for_report(
        period: ReportPeriod,
        range: &DateRange,
        include_inactive: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let is_today = period == ReportPeriod::Today;
        let mut bucket = range_bucket(range);
        if is_today {
            bucket.push('@');
            bucket.push_str(&now.format("%Y-%m-%dT%H").to_string());
        }
        let scope = if include_inactive { "all" } else { "active" };

        CacheKey(format!("{}|{}|{}|{}", period, is_today, bucket, scope))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        CacheKey(value.to_string())
    }
}

fn range_bucket(range: &DateRange) -> String {
    let on_midnight = |instant: DateTime<Utc>| instant.time() == NaiveTime::MIN;
    if on_midnight(range.start) && on_midnight(range.end) {
        format!("{}_{}", range.start.format("%Y-%m-%d"), range.end.format("%Y-%m-%d"))
    } else {
        format!(
            "{}_{}",
            range.start.to_rfc3339_opts(SecondsFormat::Nanos, true),
            range.end.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )
    }
}

/// Time-to-live for a report of `period` covering `range`.
///
/// Ranges still open at `now` can change, so they get the shorter TTL.
pub fn ttl_for(period: ReportPeriod, range: &DateRange, now: DateTime<Utc>) -> Duration {
    let open = range.is_open_at(now);
    match period {
        ReportPeriod::Today => Duration::minutes(3),
        ReportPeriod::Daily => Duration::minutes(10),
        ReportPeriod::Weekly if open => Duration::minutes(30),
        ReportPeriod::Weekly => Duration::hours(2),
        ReportPeriod::Monthly if open => Duration::hours(1),
        ReportPeriod::Monthly => Duration::hours(4),
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    ttl: Duration,
    /// Insertion sequence, matched against the eviction queue
    seq: u64,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    /// Insertion order; stale `(key, seq)` pairs are skipped on eviction
    order: VecDeque<(CacheKey, u64)>,
    next_seq: u64,
}

pub struct ReportCache<V> {
    state: Mutex<CacheState<V>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ReportCache<V> {
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stored value if present and younger than its TTL; expired entries are dropped
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.lock();
        let expired = match state.entries.get(key) {
            None => return None,
            Some(entry) => now - entry.stored_at >= entry.ttl,
        };

        if expired {
            state.entries.remove(key);
            return None;
        }
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value`; re-setting a key counts as a fresh insertion
    pub fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        let now = self.clock.now();
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        state.order.push_back((key.clone(), seq));
        state.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
                seq,
            },
        );

        while state.entries.len() > self.max_entries {
            let Some((oldest, oldest_seq)) = state.order.pop_front() else {
                break;
            };
            let live = state
                .entries
                .get(&oldest)
                .is_some_and(|entry| entry.seq == oldest_seq);
            if live {
                state.entries.remove(&oldest);
            }
        }

        if state.order.len() > self.max_entries * 4 {
            let CacheState { entries, order, .. } = &mut *state;
            order.retain(|(key, seq)| entries.get(key).is_some_and(|entry| entry.seq == *seq));
        }
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}
