// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Readiness gates composed into the scheduler's draw predicate.
//!
//! A gate is a named latch owned by the
//! [`FrameScheduler`](crate::scheduler::FrameScheduler). While any gate is
//! closed the scheduler does not draw, exactly as if the display were not
//! visible. Opening the last closed gate restarts tick observation.
//!
//! The policy deciding *when* a gate opens lives outside the scheduler.
//! [`FirstActivationGate`] is one such policy: hold the first draw until the
//! first contentful frame has activated, with a timeout.

use alloc::vec::Vec;

use crate::time::{Duration, HostTime};

/// Handle to a readiness gate registered with the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GateId(u32);

/// The set of readiness latches.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReadinessGates {
    open: Vec<bool>,
}

impl ReadinessGates {
    pub(crate) fn add(&mut self) -> GateId {
        let id = u32::try_from(self.open.len()).unwrap_or(u32::MAX);
        self.open.push(false);
        GateId(id)
    }

    /// Returns `true` if the latch changed.
    pub(crate) fn set_open(&mut self, id: GateId, open: bool) -> bool {
        match self.open.get_mut(id.0 as usize) {
            Some(slot) if *slot != open => {
                *slot = open;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_open(&self, id: GateId) -> bool {
        self.open.get(id.0 as usize).copied().unwrap_or(true)
    }

    pub(crate) fn all_open(&self) -> bool {
        self.open.iter().all(|open| *open)
    }
}

/// Timing for [`FirstActivationGate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirstActivationConfig {
    /// Open anyway this long after becoming visible without any activation.
    pub visibility_timeout: Duration,
    /// Delay between the first contentful activation and opening.
    pub activation_delay: Duration,
    /// Delay used when content restarts after it was already seen once.
    pub relaunch_delay: Duration,
}

impl FirstActivationConfig {
    /// Defaults for nanosecond timebases: 8 s visibility timeout, no
    /// activation delay, four 16 ms frames after a relaunch.
    #[must_use]
    pub const fn nanos() -> Self {
        Self {
            visibility_timeout: Duration(8_000_000_000),
            activation_delay: Duration(0),
            relaunch_delay: Duration(64_000_000),
        }
    }
}

/// Holds the first draw until content is ready to be shown.
///
/// Feed it surface lifecycle events, call [`poll`](Self::poll) when the
/// host wakes, and mirror [`is_open`](Self::is_open) into the scheduler with
/// [`FrameScheduler::set_gate_open`](crate::scheduler::FrameScheduler::set_gate_open).
#[derive(Clone, Copy, Debug)]
pub struct FirstActivationGate {
    config: FirstActivationConfig,
    open: bool,
    seen_activation: bool,
    open_at: Option<HostTime>,
    visibility_deadline: Option<HostTime>,
}

impl FirstActivationGate {
    /// Creates a closed gate.
    #[must_use]
    pub const fn new(config: FirstActivationConfig) -> Self {
        Self {
            config,
            open: false,
            seen_activation: false,
            open_at: None,
            visibility_deadline: None,
        }
    }

    /// Returns `true` if drawing may proceed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// The display became visible at `now`.
    ///
    /// Starts the visibility timeout unless content already activated.
    pub fn on_visible(&mut self, now: HostTime) {
        if !self.open && self.visibility_deadline.is_none() {
            self.visibility_deadline = Some(now + self.config.visibility_timeout);
        }
    }

    /// A surface activated its first contentful frame.
    ///
    /// `in_root` tells whether the surface belongs to the root hierarchy;
    /// activations elsewhere are ignored.
    pub fn on_first_contentful_activation(&mut self, now: HostTime, in_root: bool) {
        if !in_root {
            return;
        }
        let delay = if self.seen_activation {
            self.config.relaunch_delay
        } else {
            self.config.activation_delay
        };
        self.open = false;
        self.seen_activation = true;
        if self.open_at.is_none() {
            self.open_at = Some(now + delay);
        }
    }

    /// The root container reset its state; hold draws until the next
    /// activation.
    pub fn on_container_reset(&mut self, in_root: bool) {
        if in_root {
            self.open = false;
        }
    }

    /// The content process went away.
    pub fn on_content_gone(&mut self) {
        self.open = false;
    }

    /// Advances timers. Returns `true` if the gate opened during this call.
    pub fn poll(&mut self, now: HostTime) -> bool {
        let due = |at: Option<HostTime>| at.is_some_and(|at| at <= now);
        if !due(self.open_at) && !due(self.visibility_deadline) {
            return false;
        }
        self.open_at = None;
        self.visibility_deadline = None;
        self.seen_activation = true;
        let opened = !self.open;
        self.open = true;
        opened
    }

    /// Earliest time [`poll`](Self::poll) can open the gate.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<HostTime> {
        match (self.open_at, self.visibility_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FirstActivationConfig {
        FirstActivationConfig {
            visibility_timeout: Duration(1000),
            activation_delay: Duration(0),
            relaunch_delay: Duration(64),
        }
    }

    #[test]
    fn latches_start_closed_and_report_changes() {
        let mut gates = ReadinessGates::default();
        assert!(gates.all_open(), "no gates means nothing blocks");
        let a = gates.add();
        let b = gates.add();
        assert!(!gates.all_open());
        assert!(gates.set_open(a, true));
        assert!(!gates.set_open(a, true), "unchanged");
        assert!(!gates.all_open());
        assert!(gates.set_open(b, true));
        assert!(gates.all_open());
        assert!(gates.is_open(b));
    }

    #[test]
    fn activation_opens_after_delay() {
        let mut gate = FirstActivationGate::new(config());
        gate.on_visible(HostTime(0));
        gate.on_first_contentful_activation(HostTime(10), true);
        assert_eq!(gate.next_wakeup(), Some(HostTime(10)));
        assert!(gate.poll(HostTime(10)));
        assert!(gate.is_open());
        assert!(!gate.poll(HostTime(2000)), "already open");
    }

    #[test]
    fn activation_outside_root_is_ignored() {
        let mut gate = FirstActivationGate::new(config());
        gate.on_first_contentful_activation(HostTime(10), false);
        assert_eq!(gate.next_wakeup(), None);
        assert!(!gate.poll(HostTime(100)));
    }

    #[test]
    fn visibility_timeout_opens_eventually() {
        let mut gate = FirstActivationGate::new(config());
        gate.on_visible(HostTime(100));
        assert!(!gate.poll(HostTime(1099)));
        assert!(gate.poll(HostTime(1100)));
    }

    #[test]
    fn relaunch_uses_relaunch_delay() {
        let mut gate = FirstActivationGate::new(config());
        gate.on_first_contentful_activation(HostTime(0), true);
        assert!(gate.poll(HostTime(0)));

        gate.on_content_gone();
        assert!(!gate.is_open());
        gate.on_first_contentful_activation(HostTime(500), true);
        assert!(!gate.poll(HostTime(563)));
        assert!(gate.poll(HostTime(564)));
    }

    #[test]
    fn container_reset_closes_until_next_activation() {
        let mut gate = FirstActivationGate::new(config());
        gate.on_first_contentful_activation(HostTime(0), true);
        let _ = gate.poll(HostTime(0));
        gate.on_container_reset(true);
        assert!(!gate.is_open());
        gate.on_first_contentful_activation(HostTime(10), true);
        assert!(gate.poll(HostTime(74)));
    }
}
