// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deadline policy and the single-slot deadline timer.
//!
//! The policy is a pure function of a [`DeadlineInputs`] snapshot. It picks
//! one of four [`DeadlineMode`]s, highest priority first:
//!
//! | # | Condition | Mode |
//! |---|---|---|
//! | 1 | output target lost | `Immediate` |
//! | 2 | swap budget exhausted | `Late` |
//! | 3 | root content missing | `Late` |
//! | 4 | all surfaces ready and (needs draw or full-completeness policy) | `Immediate` |
//! | 5 | no draw needed | `Late` |
//! | 6 | expecting resize damage | `Late` |
//! | 7 | otherwise | `Regular` |
//!
//! Under the full-completeness policy, [`adjusted_mode`] turns `Regular` and
//! `Late` into `None`: the interval stays open until an event completes it.

use crate::tick::Tick;
use crate::time::HostTime;

/// How long to wait before completing the open interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeadlineMode {
    /// Complete the interval as soon as possible.
    Immediate,
    /// Wait until the tick's (draw-cost adjusted) deadline.
    Regular,
    /// Wait until the end of the tick interval.
    Late,
    /// Wait indefinitely.
    None,
}

/// Why the policy chose its mode. Reported to tracing and trace sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeadlineReason {
    /// The output target was lost.
    OutputTargetLost,
    /// Too many swaps are in flight.
    SwapThrottled,
    /// No root content has been submitted yet.
    RootContentMissing,
    /// Every active surface has answered the current tick.
    AllSurfacesReady,
    /// Nothing has damaged the display yet.
    NoDamageYet,
    /// The display was resized and root damage is still expected.
    EntireDisplayDamaged,
    /// Some producers are still expected to submit.
    MoreDamageExpected,
}

impl DeadlineReason {
    /// Returns a short human-readable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutputTargetLost => "Lost output surface",
            Self::SwapThrottled => "Swap throttled",
            Self::RootContentMissing => "Root frame missing",
            Self::AllSurfacesReady => "All active surfaces ready",
            Self::NoDamageYet => "No damage yet",
            Self::EntireDisplayDamaged => "Entire display damaged",
            Self::MoreDamageExpected => "More damage expected soon",
        }
    }
}

/// The scheduler state the deadline policy reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadlineInputs {
    /// The output target was lost.
    pub output_target_lost: bool,
    /// Swaps submitted but not yet acknowledged.
    pub pending_swap_count: u32,
    /// Swap budget.
    pub max_pending_swaps: u32,
    /// No root content yet.
    pub root_content_missing: bool,
    /// Some surface still owes an answer for the current tick.
    pub has_pending_surfaces: bool,
    /// A root surface has been set.
    pub root_surface_set: bool,
    /// A resize happened and the root has not re-submitted.
    pub expecting_resize_damage: bool,
    /// The display has damage that has not been drawn.
    pub needs_draw: bool,
    /// Full-completeness policy.
    pub wait_for_all_surfaces: bool,
}

impl DeadlineInputs {
    /// Returns `true` if no surface blocks the interval.
    #[must_use]
    pub const fn all_surfaces_ready(&self) -> bool {
        !self.has_pending_surfaces && self.root_surface_set && !self.expecting_resize_damage
    }
}

/// Computes the unadjusted deadline mode and the reason for it.
#[must_use]
pub fn desired_mode(inputs: &DeadlineInputs) -> (DeadlineMode, DeadlineReason) {
    if inputs.output_target_lost {
        return (DeadlineMode::Immediate, DeadlineReason::OutputTargetLost);
    }
    if inputs.pending_swap_count >= inputs.max_pending_swaps {
        return (DeadlineMode::Late, DeadlineReason::SwapThrottled);
    }
    if inputs.root_content_missing {
        return (DeadlineMode::Late, DeadlineReason::RootContentMissing);
    }
    // Without damage, only the full-completeness policy may finish early: it
    // unblocks the tick for everyone, while the latency policy leaves room
    // for damage from producers that missed the tick.
    if inputs.all_surfaces_ready() && (inputs.needs_draw || inputs.wait_for_all_surfaces) {
        return (DeadlineMode::Immediate, DeadlineReason::AllSurfacesReady);
    }
    if !inputs.needs_draw {
        return (DeadlineMode::Late, DeadlineReason::NoDamageYet);
    }
    if inputs.expecting_resize_damage {
        return (DeadlineMode::Late, DeadlineReason::EntireDisplayDamaged);
    }
    (DeadlineMode::Regular, DeadlineReason::MoreDamageExpected)
}

/// Applies the full-completeness adjustment to `mode`.
#[must_use]
pub const fn adjusted_mode(mode: DeadlineMode, wait_for_all_surfaces: bool) -> DeadlineMode {
    match mode {
        DeadlineMode::Regular | DeadlineMode::Late if wait_for_all_surfaces => DeadlineMode::None,
        other => other,
    }
}

/// Maps a mode to an absolute deadline for `tick`.
///
/// `tick.deadline` must already be shortened by the draw-cost estimate.
/// [`DeadlineMode::Immediate`] maps to [`HostTime::ZERO`], which is due at
/// any `now`.
#[must_use]
pub const fn deadline_time(mode: DeadlineMode, tick: &Tick) -> HostTime {
    match mode {
        DeadlineMode::Immediate => HostTime::ZERO,
        DeadlineMode::Regular => tick.deadline,
        DeadlineMode::Late => tick.interval_end(),
        DeadlineMode::None => HostTime::NEVER,
    }
}

/// Identifies one arming of a [`DeadlineTimer`].
///
/// Hosts that drive the deadline from their own timer wheel hold on to the
/// token and hand it back when their timer fires; a token from a cancelled
/// or superseded arming is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// Outcome of [`DeadlineTimer::arm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmOutcome {
    /// A timer was already armed for the same time; nothing changed.
    Unchanged,
    /// The timer is now armed at the requested time.
    Armed(TimerToken),
    /// The requested time was [`HostTime::NEVER`]; any armed timer was
    /// cancelled.
    Disarmed,
}

/// A cancelable, single-slot deadline.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeadlineTimer {
    armed_at: Option<HostTime>,
    generation: u64,
}

impl DeadlineTimer {
    /// Creates an unarmed timer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            armed_at: None,
            generation: 0,
        }
    }

    /// Arms the timer at `at`, replacing any previous arming.
    pub fn arm(&mut self, at: HostTime) -> ArmOutcome {
        if self.armed_at == Some(at) {
            return ArmOutcome::Unchanged;
        }
        self.cancel();
        if at.is_never() {
            return ArmOutcome::Disarmed;
        }
        self.armed_at = Some(at);
        ArmOutcome::Armed(TimerToken(self.generation))
    }

    /// Cancels the armed deadline, if any. Outstanding tokens become stale.
    pub fn cancel(&mut self) {
        self.armed_at = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Returns the armed time.
    #[must_use]
    pub const fn armed_at(&self) -> Option<HostTime> {
        self.armed_at
    }

    /// Returns the token of the current arming.
    #[must_use]
    pub const fn token(&self) -> Option<TimerToken> {
        match self.armed_at {
            Some(_) => Some(TimerToken(self.generation)),
            None => None,
        }
    }

    /// Returns `true` if the timer is armed and `at` has been reached.
    #[must_use]
    pub fn is_due(&self, now: HostTime) -> bool {
        self.armed_at.is_some_and(|at| at <= now)
    }

    /// Returns `true` if `token` names the current arming.
    #[must_use]
    pub fn accepts(&self, token: TimerToken) -> bool {
        self.armed_at.is_some() && token.0 == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::{TickKind, TickSourceId};
    use crate::time::Duration;

    fn ready() -> DeadlineInputs {
        DeadlineInputs {
            output_target_lost: false,
            pending_swap_count: 0,
            max_pending_swaps: 1,
            root_content_missing: false,
            has_pending_surfaces: false,
            root_surface_set: true,
            expecting_resize_damage: false,
            needs_draw: true,
            wait_for_all_surfaces: false,
        }
    }

    fn mode(inputs: &DeadlineInputs) -> DeadlineMode {
        desired_mode(inputs).0
    }

    #[test]
    fn ready_with_damage_is_immediate() {
        assert_eq!(
            desired_mode(&ready()),
            (DeadlineMode::Immediate, DeadlineReason::AllSurfacesReady)
        );
    }

    #[test]
    fn lost_output_overrides_everything() {
        let inputs = DeadlineInputs {
            output_target_lost: true,
            pending_swap_count: 1,
            root_content_missing: true,
            has_pending_surfaces: true,
            needs_draw: false,
            expecting_resize_damage: true,
            ..ready()
        };
        assert_eq!(mode(&inputs), DeadlineMode::Immediate);
    }

    #[test]
    fn exhausted_swap_budget_is_late() {
        for flags in 0_u32..(1 << 6) {
            let bit = |n: u32| flags & (1 << n) != 0;
            let inputs = DeadlineInputs {
                output_target_lost: false,
                pending_swap_count: 2 + u32::from(bit(0)),
                max_pending_swaps: 2,
                root_content_missing: bit(1),
                has_pending_surfaces: bit(2),
                root_surface_set: bit(3),
                expecting_resize_damage: bit(4),
                needs_draw: bit(5),
                wait_for_all_surfaces: false,
            };
            assert_eq!(
                desired_mode(&inputs),
                (DeadlineMode::Late, DeadlineReason::SwapThrottled),
                "flags {flags:#b}"
            );
        }
    }

    #[test]
    fn missing_root_content_is_late() {
        let inputs = DeadlineInputs {
            root_content_missing: true,
            ..ready()
        };
        assert_eq!(
            desired_mode(&inputs),
            (DeadlineMode::Late, DeadlineReason::RootContentMissing)
        );
    }

    #[test]
    fn resize_beats_readiness() {
        let inputs = DeadlineInputs {
            expecting_resize_damage: true,
            ..ready()
        };
        assert!(!inputs.all_surfaces_ready());
        assert_eq!(
            desired_mode(&inputs),
            (DeadlineMode::Late, DeadlineReason::EntireDisplayDamaged)
        );
    }

    #[test]
    fn pending_surfaces_with_damage_is_regular() {
        let inputs = DeadlineInputs {
            has_pending_surfaces: true,
            ..ready()
        };
        assert_eq!(mode(&inputs), DeadlineMode::Regular);

        let no_root = DeadlineInputs {
            root_surface_set: false,
            ..ready()
        };
        assert_eq!(mode(&no_root), DeadlineMode::Regular);
    }

    #[test]
    fn no_damage_is_late_unless_full_completeness() {
        let inputs = DeadlineInputs {
            needs_draw: false,
            ..ready()
        };
        assert_eq!(
            desired_mode(&inputs),
            (DeadlineMode::Late, DeadlineReason::NoDamageYet)
        );

        let blocking = DeadlineInputs {
            wait_for_all_surfaces: true,
            ..inputs
        };
        assert_eq!(mode(&blocking), DeadlineMode::Immediate);
    }

    #[test]
    fn full_completeness_never_yields_regular_or_late() {
        for flags in 0_u32..(1 << 7) {
            let bit = |n: u32| flags & (1 << n) != 0;
            let inputs = DeadlineInputs {
                output_target_lost: bit(0),
                pending_swap_count: u32::from(bit(1)),
                max_pending_swaps: 1,
                root_content_missing: bit(2),
                has_pending_surfaces: bit(3),
                root_surface_set: bit(4),
                expecting_resize_damage: bit(5),
                needs_draw: bit(6),
                wait_for_all_surfaces: true,
            };
            let adjusted = adjusted_mode(mode(&inputs), true);
            assert!(
                matches!(adjusted, DeadlineMode::Immediate | DeadlineMode::None),
                "flags {flags:#b} gave {adjusted:?}"
            );
        }
        assert_eq!(
            adjusted_mode(DeadlineMode::Late, false),
            DeadlineMode::Late,
            "latency policy is left alone"
        );
    }

    #[test]
    fn deadline_time_mapping() {
        let tick = Tick {
            source_id: TickSourceId(1),
            sequence_number: 1,
            frame_time: HostTime(1000),
            interval: Duration(100),
            deadline: HostTime(1060),
            kind: TickKind::Normal,
        };
        assert_eq!(deadline_time(DeadlineMode::Immediate, &tick), HostTime::ZERO);
        assert_eq!(deadline_time(DeadlineMode::Regular, &tick), HostTime(1060));
        assert_eq!(deadline_time(DeadlineMode::Late, &tick), HostTime(1100));
        assert_eq!(deadline_time(DeadlineMode::None, &tick), HostTime::NEVER);
    }

    #[test]
    fn timer_rearm_same_time_is_noop() {
        let mut timer = DeadlineTimer::new();
        let ArmOutcome::Armed(first) = timer.arm(HostTime(50)) else {
            panic!("expected a fresh arming");
        };
        assert_eq!(timer.arm(HostTime(50)), ArmOutcome::Unchanged);
        assert!(timer.accepts(first), "same arming keeps its token");

        let ArmOutcome::Armed(second) = timer.arm(HostTime(40)) else {
            panic!("expected a re-arming");
        };
        assert!(!timer.accepts(first), "superseded token is stale");
        assert!(timer.accepts(second));
    }

    #[test]
    fn timer_never_disarms() {
        let mut timer = DeadlineTimer::new();
        let _ = timer.arm(HostTime(10));
        assert_eq!(timer.arm(HostTime::NEVER), ArmOutcome::Disarmed);
        assert_eq!(timer.armed_at(), None);
        assert!(!timer.is_due(HostTime::NEVER));
    }

    #[test]
    fn timer_due_and_cancel() {
        let mut timer = DeadlineTimer::new();
        let _ = timer.arm(HostTime::ZERO);
        assert!(timer.is_due(HostTime(0)), "immediate deadline is always due");
        let token = timer.token();
        timer.cancel();
        assert!(!timer.is_due(HostTime(100)));
        assert!(token.is_some_and(|t| !timer.accepts(t)));
    }
}
