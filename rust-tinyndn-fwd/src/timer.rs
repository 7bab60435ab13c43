//! Single-alarm timer scheduler.
//!
//! Timers live in a fixed table addressed by [`TimerId`] and are threaded
//! onto one list sorted by fire time. Only the head of the list is ever
//! programmed into the external [`Alarm`], so the platform wakes up once
//! per fired timer no matter how many are pending.
//!
//! Tick values are `u32` milliseconds and wrap. Ordering stays correct
//! across the wrap because no timer is scheduled further than
//! [`MAX_TIMER_DELAY`] ahead.

use log::trace;
use rust_tinyndn_common::{Error, Result};

/// Longest delay a timer may be scheduled with, in ticks.
pub const MAX_TIMER_DELAY: u32 = 1 << 30;

/// Hardware (or host) alarm driving the scheduler.
pub trait Alarm {
    /// Arm the alarm to fire `delta` ticks after `now`, replacing any previous setting.
    fn start(&mut self, now: u32, delta: u32);

    /// Disarm the alarm.
    fn stop(&mut self);

    /// Current tick count.
    fn now(&self) -> u32;
}

/// Whether `fire_time` is at or before `now`, modulo wraparound.
pub fn has_fired(fire_time: u32, now: u32) -> bool {
    (now.wrapping_sub(fire_time) as i32) >= 0
}

/// Wraparound-safe ordering of two fire times relative to `now`.
///
/// If exactly one of them has already fired it comes first. Otherwise the
/// one closer to (or further past) `now` comes first.
pub fn fires_before(a: u32, b: u32, now: u32) -> bool {
    match (has_fired(a, now), has_fired(b, now)) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => now.wrapping_sub(a) > now.wrapping_sub(b),
        (false, false) => a.wrapping_sub(now) < b.wrapping_sub(now),
    }
}

/// Index of a timer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    /// Not on the list.
    Idle,
    /// On the list, followed by the given timer (or the tail).
    Queued(Option<TimerId>),
}

#[derive(Debug)]
struct TimerSlot<T> {
    fire_time: u32,
    arg: Option<T>,
    link: Link,
}

/// Sorted timer queue over a fixed table of slots.
#[derive(Debug)]
pub struct TimerScheduler<A, T> {
    alarm: A,
    slots: Vec<TimerSlot<T>>,
    head: Option<TimerId>,
    queued: usize,
}

impl<A: Alarm, T> TimerScheduler<A, T> {
    /// Create a scheduler with `capacity` timer slots.
    pub fn new(alarm: A, capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| TimerSlot {
                fire_time: 0,
                arg: None,
                link: Link::Idle,
            })
            .collect();
        Self {
            alarm,
            slots,
            head: None,
            queued: 0,
        }
    }

    pub fn alarm(&self) -> &A {
        &self.alarm
    }

    pub fn alarm_mut(&mut self) -> &mut A {
        &mut self.alarm
    }

    /// Current tick from the alarm.
    pub fn now(&self) -> u32 {
        self.alarm.now()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of queued timers.
    pub fn pending(&self) -> usize {
        self.queued
    }

    /// Whether timer `id` is currently queued.
    pub fn is_queued(&self, id: TimerId) -> bool {
        self.slots
            .get(id.0)
            .map_or(false, |slot| slot.link != Link::Idle)
    }

    /// Fire time of a queued timer.
    pub fn fire_time(&self, id: TimerId) -> Option<u32> {
        self.slots
            .get(id.0)
            .filter(|slot| slot.link != Link::Idle)
            .map(|slot| slot.fire_time)
    }

    /// Fire time of the earliest queued timer.
    pub fn next_fire_time(&self) -> Option<u32> {
        self.head.map(|id| self.slots[id.0].fire_time)
    }

    /// Queue timer `id` to fire `delay` ticks from now (clamped to [`MAX_TIMER_DELAY`]).
    pub fn start(&mut self, id: TimerId, delay: u32, arg: T) -> Result<()> {
        let fire_time = self.now().wrapping_add(delay.min(MAX_TIMER_DELAY));
        self.add(id, fire_time, arg)
    }

    /// Queue timer `id` at absolute tick `fire_time`.
    ///
    /// A timer that is already queued is removed first, so re-adding only
    /// moves it.
    pub fn add(&mut self, id: TimerId, fire_time: u32, arg: T) -> Result<()> {
        if id.0 >= self.slots.len() {
            return Err(Error::UnknownTimer(id.0));
        }
        let old_head = self.head;
        self.unlink(id);

        let now = self.now();
        let mut prev: Option<TimerId> = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            if fires_before(fire_time, self.slots[c.0].fire_time, now) {
                break;
            }
            prev = cur;
            cur = self.next_of(c);
        }

        let slot = &mut self.slots[id.0];
        slot.fire_time = fire_time;
        slot.arg = Some(arg);
        slot.link = Link::Queued(cur);
        match prev {
            Some(p) => self.slots[p.0].link = Link::Queued(Some(id)),
            None => self.head = Some(id),
        }
        self.queued += 1;
        trace!("[Timer] queued {:?} at {}", id, fire_time);

        if self.head != old_head || self.head == Some(id) {
            self.reprogram();
        }
        Ok(())
    }

    /// Dequeue timer `id`. Returns `false` if it was not queued.
    pub fn remove(&mut self, id: TimerId) -> bool {
        let was_head = self.head == Some(id);
        let removed = self.unlink(id);
        if removed.is_some() && was_head {
            self.reprogram();
        }
        removed.is_some()
    }

    /// Handle an alarm wake-up.
    ///
    /// Fires (dequeues and returns the argument of) the head timer if its
    /// time has come, then re-arms the alarm for the new head. A spurious
    /// wake-up only re-arms.
    pub fn process(&mut self) -> Option<T> {
        let now = self.now();
        let fired = match self.head {
            Some(head) if has_fired(self.slots[head.0].fire_time, now) => {
                let next = self.next_of(head);
                self.head = next;
                self.queued -= 1;
                let slot = &mut self.slots[head.0];
                slot.link = Link::Idle;
                trace!("[Timer] fired {:?} at {}", head, now);
                slot.arg.take()
            }
            _ => None,
        };
        self.reprogram();
        fired
    }

    fn next_of(&self, id: TimerId) -> Option<TimerId> {
        match self.slots[id.0].link {
            Link::Queued(next) => next,
            Link::Idle => None,
        }
    }

    fn unlink(&mut self, id: TimerId) -> Option<T> {
        let next = match self.slots.get(id.0)?.link {
            Link::Idle => return None,
            Link::Queued(next) => next,
        };

        if self.head == Some(id) {
            self.head = next;
        } else {
            let mut cur = self.head;
            while let Some(c) = cur {
                let after = self.next_of(c);
                if after == Some(id) {
                    self.slots[c.0].link = Link::Queued(next);
                    break;
                }
                cur = after;
            }
        }

        self.queued -= 1;
        let slot = &mut self.slots[id.0];
        slot.link = Link::Idle;
        slot.arg.take()
    }

    fn reprogram(&mut self) {
        match self.head {
            None => self.alarm.stop(),
            Some(head) => {
                let now = self.alarm.now();
                let fire_time = self.slots[head.0].fire_time;
                let delta = if has_fired(fire_time, now) {
                    0
                } else {
                    fire_time.wrapping_sub(now)
                };
                self.alarm.start(now, delta);
            }
        }
    }
}

/// Alarm driven by hand, used by simulations and tests.
#[derive(Debug, Clone, Default)]
pub struct ManualAlarm {
    now: u32,
    armed: Option<u32>,
    starts: usize,
}

impl ManualAlarm {
    /// Create an alarm whose clock reads `now`.
    pub fn new(now: u32) -> Self {
        Self {
            now,
            armed: None,
            starts: 0,
        }
    }

    /// Move the clock forward.
    pub fn advance(&mut self, ticks: u32) {
        self.now = self.now.wrapping_add(ticks);
    }

    /// Tick at which the alarm is armed to fire.
    pub fn armed_at(&self) -> Option<u32> {
        self.armed
    }

    /// Whether the armed deadline has been reached.
    pub fn is_due(&self) -> bool {
        self.armed.map_or(false, |at| has_fired(at, self.now))
    }

    /// Number of times the alarm has been (re)armed.
    pub fn starts(&self) -> usize {
        self.starts
    }
}

impl Alarm for ManualAlarm {
    fn start(&mut self, now: u32, delta: u32) {
        self.armed = Some(now.wrapping_add(delta));
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.armed = None;
    }

    fn now(&self) -> u32 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(now: u32) -> TimerScheduler<ManualAlarm, &'static str> {
        TimerScheduler::new(ManualAlarm::new(now), 8)
    }

    #[test]
    fn test_fires_before() {
        assert!(fires_before(10, 20, 0));
        assert!(!fires_before(20, 10, 0));
        // 5 has fired, 20 has not.
        assert!(fires_before(5, 20, 10));
        assert!(!fires_before(20, 5, 10));
        // Across the wrap: u32::MAX - 1 is earlier than 3 when now is u32::MAX - 5.
        assert!(fires_before(u32::MAX - 1, 3, u32::MAX - 5));
        assert!(!fires_before(3, u32::MAX - 1, u32::MAX - 5));
    }

    #[test]
    fn test_sorted_insert_and_alarm_head() {
        let mut timers = scheduler(100);
        timers.start(TimerId(0), 50, "b").unwrap();
        assert_eq!(timers.alarm().armed_at(), Some(150));
        timers.start(TimerId(1), 10, "a").unwrap();
        assert_eq!(timers.alarm().armed_at(), Some(110));
        timers.start(TimerId(2), 90, "c").unwrap();
        assert_eq!(timers.alarm().armed_at(), Some(110));
        assert_eq!(timers.pending(), 3);

        timers.alarm_mut().advance(200);
        assert_eq!(timers.process(), Some("a"));
        assert_eq!(timers.process(), Some("b"));
        assert_eq!(timers.process(), Some("c"));
        assert_eq!(timers.process(), None);
        assert_eq!(timers.alarm().armed_at(), None);
    }

    #[test]
    fn test_readd_moves_timer() {
        let mut timers = scheduler(0);
        timers.start(TimerId(0), 10, "x").unwrap();
        timers.start(TimerId(1), 20, "y").unwrap();
        timers.start(TimerId(0), 30, "x2").unwrap();
        assert_eq!(timers.pending(), 2);
        assert_eq!(timers.next_fire_time(), Some(20));
        assert_eq!(timers.alarm().armed_at(), Some(20));

        timers.alarm_mut().advance(40);
        assert_eq!(timers.process(), Some("y"));
        assert_eq!(timers.process(), Some("x2"));
    }

    #[test]
    fn test_remove_head_reprograms() {
        let mut timers = scheduler(0);
        timers.start(TimerId(3), 5, "first").unwrap();
        timers.start(TimerId(4), 15, "second").unwrap();
        assert!(timers.remove(TimerId(3)));
        assert!(!timers.is_queued(TimerId(3)));
        assert_eq!(timers.alarm().armed_at(), Some(15));
        assert!(!timers.remove(TimerId(3)));

        assert!(timers.remove(TimerId(4)));
        assert_eq!(timers.alarm().armed_at(), None);
    }

    #[test]
    fn test_spurious_wakeup() {
        let mut timers = scheduler(0);
        timers.start(TimerId(0), 100, "later").unwrap();
        timers.alarm_mut().advance(50);
        assert_eq!(timers.process(), None);
        assert!(timers.is_queued(TimerId(0)));
        assert_eq!(timers.alarm().armed_at(), Some(100));
    }

    #[test]
    fn test_wraparound_order() {
        let mut timers = scheduler(u32::MAX - 10);
        timers.start(TimerId(0), 20, "after-wrap").unwrap();
        timers.start(TimerId(1), 5, "before-wrap").unwrap();
        assert_eq!(timers.next_fire_time(), Some(u32::MAX - 5));

        timers.alarm_mut().advance(30);
        assert_eq!(timers.process(), Some("before-wrap"));
        assert_eq!(timers.process(), Some("after-wrap"));
    }

    #[test]
    fn test_delay_is_clamped() {
        let mut timers = scheduler(0);
        timers.start(TimerId(0), u32::MAX, "far").unwrap();
        assert_eq!(timers.fire_time(TimerId(0)), Some(MAX_TIMER_DELAY));
    }

    #[test]
    fn test_unknown_timer() {
        let mut timers = scheduler(0);
        assert!(matches!(
            timers.start(TimerId(8), 1, "x"),
            Err(Error::UnknownTimer(8))
        ));
    }
}
