//! Virtual-clock timer wheel — the scheduling primitive every component owns.
//!
//! Callbacks receive `&mut S` (the owner's state) and the timeline itself,
//! so they can arm or cancel further timers without locks. Firings are
//! strictly sequential, ordered by due time then registration order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use opsmanager_core::{OpsError, Result};

/// Opaque handle returned when a timer is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// A scheduled callback.
pub type Callback<S> = Box<dyn FnMut(&mut S, &mut Timeline<S>) + Send>;

struct Timer<S> {
    due: Duration,
    /// `Some` for repeating timers.
    period: Option<Duration>,
    callback: Callback<S>,
}

/// Queue entry: (due, sequence, handle). The sequence keeps same-instant
/// firings in registration order.
type Slot = Reverse<(Duration, u64, TimerHandle)>;

/// Single logical timeline with cancellable one-shot and repeating timers.
pub struct Timeline<S> {
    now: Duration,
    anchor: DateTime<Utc>,
    next_handle: u64,
    next_seq: u64,
    queue: BinaryHeap<Slot>,
    timers: HashMap<TimerHandle, Timer<S>>,
    /// Timer currently executing and whether it repeats.
    firing: Option<(TimerHandle, bool)>,
    firing_cancelled: bool,
}

impl<S> Timeline<S> {
    /// Create an empty timeline at virtual time zero.
    /// `anchor` is the wall-clock instant that virtual zero maps to.
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            now: Duration::ZERO,
            anchor,
            next_handle: 1,
            next_seq: 0,
            queue: BinaryHeap::new(),
            timers: HashMap::new(),
            firing: None,
            firing_cancelled: false,
        }
    }

    /// Current virtual time since creation.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Wall-clock time corresponding to `now()`.
    pub fn wall_clock(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.now).unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor + elapsed
    }

    /// Run `callback` every `interval`, first at `now + interval`.
    pub fn schedule<F>(&mut self, interval: Duration, callback: F) -> Result<TimerHandle>
    where
        F: FnMut(&mut S, &mut Timeline<S>) + Send + 'static,
    {
        if interval.is_zero() {
            return Err(OpsError::InvalidInterval(
                "repeating timers need a non-zero interval".into(),
            ));
        }
        Ok(self.arm(self.now + interval, Some(interval), Box::new(callback)))
    }

    /// Run `callback` once at `now + delay`.
    pub fn schedule_once<F>(&mut self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnMut(&mut S, &mut Timeline<S>) + Send + 'static,
    {
        self.arm(self.now + delay, None, Box::new(callback))
    }

    /// Cancel a timer. Idempotent, and safe after the timer already fired.
    ///
    /// Returns `true` if this call prevented at least one future firing.
    /// A repeating timer may cancel itself from inside its own callback.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        if let Some((firing, repeating)) = self.firing {
            if firing == handle {
                let prevented = repeating && !self.firing_cancelled;
                self.firing_cancelled = true;
                return prevented;
            }
        }

        if self.timers.remove(&handle).is_some() {
            self.queue.retain(|Reverse((_, _, h))| *h != handle);
            true
        } else {
            false
        }
    }

    /// Cancel every timer, including a repeating one that is mid-firing.
    /// Returns how many live timers were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let mut dropped = self.timers.len();
        self.timers.clear();
        self.queue.clear();
        if matches!(self.firing, Some((_, true))) && !self.firing_cancelled {
            self.firing_cancelled = true;
            dropped += 1;
        }
        dropped
    }

    /// Whether `handle` will still fire.
    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.timers.contains_key(&handle)
    }

    /// Number of live timers.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Due time of the earliest live timer.
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.peek().map(|Reverse((due, _, _))| *due)
    }

    /// Advance by `delta`, firing everything that comes due.
    pub fn advance_by(&mut self, delta: Duration, state: &mut S) -> usize {
        let target = self.now + delta;
        self.advance_to(target, state)
    }

    /// Advance to `target`, firing due callbacks in order. Targets in the
    /// past are ignored. Returns the number of callbacks run.
    pub fn advance_to(&mut self, target: Duration, state: &mut S) -> usize {
        let mut fired = 0;

        while let Some(&Reverse((due, _, handle))) = self.queue.peek() {
            if due > target {
                break;
            }
            self.queue.pop();

            // Stale slot for a cancelled timer.
            let Some(mut timer) = self.timers.remove(&handle) else {
                continue;
            };

            self.now = due;
            self.firing = Some((handle, timer.period.is_some()));
            self.firing_cancelled = false;
            (timer.callback)(state, self);
            self.firing = None;
            fired += 1;

            match timer.period {
                Some(period) if !self.firing_cancelled => {
                    timer.due = due + period;
                    self.insert(handle, timer);
                }
                _ => {}
            }
        }

        if target > self.now {
            self.now = target;
        }
        fired
    }

    fn arm(&mut self, due: Duration, period: Option<Duration>, callback: Callback<S>) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.insert(
            handle,
            Timer {
                due,
                period,
                callback,
            },
        );
        handle
    }

    fn insert(&mut self, handle: TimerHandle, timer: Timer<S>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse((timer.due, seq, handle)));
        self.timers.insert(handle, timer);
    }
}

impl<S> fmt::Debug for Timeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("now", &self.now)
            .field("anchor", &self.anchor)
            .field("pending", &self.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn timeline() -> Timeline<Vec<(u64, &'static str)>> {
        Timeline::new(Utc::now())
    }

    #[test]
    fn test_repeating_timer_fires_each_interval() {
        let mut tl = timeline();
        let mut log = Vec::new();
        tl.schedule(secs(4), |log: &mut Vec<_>, tl: &mut Timeline<_>| {
            log.push((tl.now().as_secs(), "tick"));
        })
        .unwrap();

        assert_eq!(tl.advance_by(secs(3), &mut log), 0);
        assert_eq!(tl.advance_by(secs(10), &mut log), 3);
        assert_eq!(log, vec![(4, "tick"), (8, "tick"), (12, "tick")]);
        assert_eq!(tl.now(), secs(13));
    }

    #[test]
    fn test_once_fires_exactly_once() {
        let mut tl = timeline();
        let mut log = Vec::new();
        let handle = tl.schedule_once(secs(2), |log: &mut Vec<_>, tl: &mut Timeline<_>| {
            log.push((tl.now().as_secs(), "once"));
        });

        assert!(tl.is_scheduled(handle));
        tl.advance_by(secs(100), &mut log);
        assert_eq!(log, vec![(2, "once")]);
        assert!(!tl.is_scheduled(handle));
        assert_eq!(tl.pending(), 0);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut tl = timeline();
        let mut log = Vec::new();
        let handle = tl.schedule_once(secs(1), |log: &mut Vec<_>, _: &mut Timeline<_>| {
            log.push((0, "never"));
        });

        assert!(tl.cancel(handle));
        assert!(!tl.cancel(handle));
        tl.advance_by(secs(5), &mut log);
        assert!(log.is_empty());
        // Cancelling after the fact is still harmless.
        assert!(!tl.cancel(handle));
    }

    #[test]
    fn test_cancel_after_firing_is_noop() {
        let mut tl = timeline();
        let mut log = Vec::new();
        let handle = tl.schedule_once(secs(1), |log: &mut Vec<_>, _: &mut Timeline<_>| {
            log.push((1, "fired"));
        });
        tl.advance_by(secs(1), &mut log);
        assert!(!tl.cancel(handle));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_repeating_timer_can_cancel_itself() {
        let mut tl: Timeline<u32> = Timeline::new(Utc::now());
        let mut count = 0u32;
        let handle = std::sync::Arc::new(std::sync::Mutex::new(None::<TimerHandle>));
        let slot = handle.clone();
        let h = tl
            .schedule(secs(1), move |count: &mut u32, tl: &mut Timeline<u32>| {
                *count += 1;
                if *count == 3 {
                    let me = slot.lock().unwrap().unwrap();
                    assert!(tl.cancel(me));
                    assert!(!tl.cancel(me));
                }
            })
            .unwrap();
        *handle.lock().unwrap() = Some(h);

        tl.advance_by(secs(10), &mut count);
        assert_eq!(count, 3);
        assert_eq!(tl.pending(), 0);
    }

    #[test]
    fn test_callback_cancels_queued_sibling_at_same_instant() {
        // Both due at t=5; the first cancels the second before it runs.
        let mut tl = timeline();
        let mut log = Vec::new();
        let victim = std::sync::Arc::new(std::sync::Mutex::new(None::<TimerHandle>));
        let slot = victim.clone();
        tl.schedule_once(secs(5), move |log: &mut Vec<_>, tl: &mut Timeline<_>| {
            log.push((5, "first"));
            if let Some(h) = *slot.lock().unwrap() {
                tl.cancel(h);
            }
        });
        let h = tl.schedule_once(secs(5), |log: &mut Vec<_>, _: &mut Timeline<_>| {
            log.push((5, "second"));
        });
        *victim.lock().unwrap() = Some(h);

        tl.advance_by(secs(5), &mut log);
        assert_eq!(log, vec![(5, "first")]);
    }

    #[test]
    fn test_same_instant_runs_in_registration_order() {
        let mut tl = timeline();
        let mut log = Vec::new();
        tl.schedule_once(secs(3), |log: &mut Vec<_>, _: &mut Timeline<_>| log.push((3, "a")));
        tl.schedule_once(secs(3), |log: &mut Vec<_>, _: &mut Timeline<_>| log.push((3, "b")));
        tl.schedule_once(secs(1), |log: &mut Vec<_>, _: &mut Timeline<_>| log.push((1, "c")));

        tl.advance_by(secs(3), &mut log);
        assert_eq!(log, vec![(1, "c"), (3, "a"), (3, "b")]);
    }

    #[test]
    fn test_callback_can_arm_new_timer() {
        let mut tl = timeline();
        let mut log = Vec::new();
        tl.schedule_once(secs(2), |log: &mut Vec<_>, tl: &mut Timeline<_>| {
            log.push((tl.now().as_secs(), "outer"));
            tl.schedule_once(Duration::from_secs(5), |log: &mut Vec<_>, tl: &mut Timeline<_>| {
                log.push((tl.now().as_secs(), "inner"));
            });
        });

        tl.advance_by(secs(6), &mut log);
        assert_eq!(log, vec![(2, "outer")]);
        tl.advance_by(secs(1), &mut log);
        assert_eq!(log, vec![(2, "outer"), (7, "inner")]);
    }

    #[test]
    fn test_cancel_all_leaves_nothing_pending() {
        let mut tl = timeline();
        let mut log = Vec::new();
        tl.schedule(secs(1), |log: &mut Vec<_>, _: &mut Timeline<_>| log.push((0, "r")))
            .unwrap();
        tl.schedule_once(secs(2), |log: &mut Vec<_>, _: &mut Timeline<_>| log.push((0, "o")));

        assert_eq!(tl.cancel_all(), 2);
        assert_eq!(tl.pending(), 0);
        assert_eq!(tl.next_due(), None);
        assert_eq!(tl.advance_by(secs(60), &mut log), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut tl = timeline();
        let result = tl.schedule(Duration::ZERO, |_: &mut Vec<_>, _: &mut Timeline<_>| {});
        assert!(matches!(result, Err(OpsError::InvalidInterval(_))));
    }

    #[test]
    fn test_wall_clock_follows_virtual_time() {
        let anchor = Utc::now();
        let mut tl: Timeline<()> = Timeline::new(anchor);
        tl.advance_by(secs(90), &mut ());
        assert_eq!(tl.wall_clock() - anchor, chrono::Duration::seconds(90));
    }

    #[test]
    fn test_advance_to_past_is_ignored() {
        let mut tl: Timeline<()> = Timeline::new(Utc::now());
        tl.advance_to(secs(10), &mut ());
        tl.advance_to(secs(4), &mut ());
        assert_eq!(tl.now(), secs(10));
    }
}
