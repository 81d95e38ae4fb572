//! Pending software timers, ordered by expiry.

use std::time::{Duration, Instant};

/// Expiry used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Clone, Debug)]
pub(crate) struct Timer {
    pub(crate) machine: String,
    pub(crate) name: String,
    pub(crate) delay: Duration,
    pub(crate) expires_at: Instant,
}

impl Timer {
    pub(crate) fn new(machine: &str, name: &str, delay: Duration, now: Instant) -> Self {
        let expires_at = now
            .checked_add(delay)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self {
            machine: machine.to_string(),
            name: name.to_string(),
            delay,
            expires_at,
        }
    }

    pub(crate) fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    fn is(&self, machine: &str, name: &str) -> bool {
        self.machine == machine && self.name == name
    }
}

/// Timers sorted by expiry; equal expiries keep insertion order.
///
/// At most one timer exists per (machine, name).
#[derive(Debug, Default)]
pub(crate) struct TimerTable {
    timers: Vec<Timer>,
}

impl TimerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a timer, replacing any active one with the same key.
    /// Returns whether a timer was replaced.
    pub(crate) fn start(&mut self, timer: Timer) -> bool {
        let replaced = self.cancel(&timer.machine, &timer.name).is_some();
        let at = self
            .timers
            .partition_point(|t| t.expires_at <= timer.expires_at);
        self.timers.insert(at, timer);
        replaced
    }

    pub(crate) fn cancel(&mut self, machine: &str, name: &str) -> Option<Timer> {
        let index = self.timers.iter().position(|t| t.is(machine, name))?;
        Some(self.timers.remove(index))
    }

    /// Cancel every timer of a machine. Returns how many were removed.
    pub(crate) fn cancel_machine(&mut self, machine: &str) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| t.machine != machine);
        before - self.timers.len()
    }

    pub(crate) fn remaining(&self, machine: &str, name: &str, now: Instant) -> Option<Duration> {
        self.timers
            .iter()
            .find(|t| t.is(machine, name))
            .map(|t| t.remaining(now))
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.timers.first().map(|t| t.expires_at)
    }

    /// Remove and return every timer expired at `now`, earliest first.
    pub(crate) fn drain_expired(&mut self, now: Instant) -> Vec<Timer> {
        let expired = self.timers.partition_point(|t| t.expires_at <= now);
        self.timers.drain(..expired).collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Timer> {
        self.timers.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn timers_are_ordered_by_expiry() {
        let now = Instant::now();
        let mut table = TimerTable::new();
        table.start(Timer::new("a", "slow", ms(300), now));
        table.start(Timer::new("a", "fast", ms(100), now));
        table.start(Timer::new("b", "mid", ms(200), now));

        let names: Vec<&str> = table.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["fast", "mid", "slow"]);
        assert_eq!(table.next_deadline(), Some(now + ms(100)));
    }

    #[test]
    fn restarting_replaces_existing_timer() {
        let now = Instant::now();
        let mut table = TimerTable::new();
        assert!(!table.start(Timer::new("a", "t", ms(100), now)));
        assert!(table.start(Timer::new("a", "t", ms(500), now)));

        assert_eq!(table.len(), 1);
        assert_eq!(table.remaining("a", "t", now), Some(ms(500)));
    }

    #[test]
    fn same_name_on_other_machine_is_separate() {
        let now = Instant::now();
        let mut table = TimerTable::new();
        table.start(Timer::new("a", "t", ms(100), now));
        table.start(Timer::new("b", "t", ms(100), now));

        assert_eq!(table.len(), 2);
        assert!(table.cancel("a", "t").is_some());
        assert_eq!(table.remaining("b", "t", now), Some(ms(100)));
    }

    #[test]
    fn cancel_finds_timers_anywhere_in_the_table() {
        let now = Instant::now();
        let mut table = TimerTable::new();
        for (i, name) in ["t1", "t2", "t3", "t4"].iter().enumerate() {
            table.start(Timer::new("a", name, ms(100 * (i as u64 + 1)), now));
        }

        assert!(table.cancel("a", "t3").is_some());
        assert!(table.cancel("a", "t4").is_some());
        assert!(table.cancel("a", "t4").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn drain_expired_returns_earliest_first() {
        let now = Instant::now();
        let mut table = TimerTable::new();
        table.start(Timer::new("a", "second", ms(20), now));
        table.start(Timer::new("a", "first", ms(10), now));
        table.start(Timer::new("a", "later", ms(1000), now));

        let expired = table.drain_expired(now + ms(50));
        let names: Vec<&str> = expired.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn equal_expiries_keep_insertion_order() {
        let now = Instant::now();
        let mut table = TimerTable::new();
        table.start(Timer::new("a", "one", ms(10), now));
        table.start(Timer::new("b", "two", ms(10), now));

        let expired = table.drain_expired(now + ms(10));
        assert_eq!(expired[0].name, "one");
        assert_eq!(expired[1].name, "two");
    }

    #[test]
    fn cancel_machine_removes_all_its_timers() {
        let now = Instant::now();
        let mut table = TimerTable::new();
        table.start(Timer::new("a", "t1", ms(10), now));
        table.start(Timer::new("a", "t2", ms(10), now));
        table.start(Timer::new("b", "t1", ms(10), now));

        assert_eq!(table.cancel_machine("a"), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn huge_delays_do_not_overflow() {
        let now = Instant::now();
        let timer = Timer::new("a", "t", Duration::MAX, now);
        assert!(timer.expires_at > now);
    }
}
