// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the scheduler.
//!
//! This module provides a [`TraceSink`] trait with one method per scheduling
//! event. All method bodies default to no-ops, so implementing only the events
//! you care about is fine.
//!
//! [`Tracer`] wraps an optional boxed sink and is owned by the
//! [`FrameScheduler`](crate::scheduler::FrameScheduler). When the `trace`
//! feature is **off**, every `Tracer` method compiles to nothing (zero
//! overhead) and installed sinks are dropped. When **on**, each method
//! performs a single `Option` branch before dispatching.
//!
//! Free-form diagnostics go through the `tracing` crate independently of
//! this module.

use alloc::boxed::Box;

use crate::deadline::{DeadlineMode, DeadlineReason};
use crate::surface::SurfaceId;
use crate::tick::{Tick, TickKind, TickSourceId};
use crate::time::HostTime;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the scheduler handles a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickEvent {
    /// Source of the tick.
    pub source_id: TickSourceId,
    /// Sequence number of the tick.
    pub sequence_number: u64,
    /// Vsync timestamp.
    pub frame_time: HostTime,
    /// Deadline after subtracting the draw-cost estimate.
    pub deadline: HostTime,
    /// Delivery kind.
    pub kind: TickKind,
    /// The tick arrived reentrantly and was deferred to a follow-up task.
    pub deferred: bool,
}

impl TickEvent {
    /// Creates an event for `tick`, whose `deadline` is already adjusted.
    #[must_use]
    pub fn new(tick: &Tick, deferred: bool) -> Self {
        Self {
            source_id: tick.source_id,
            sequence_number: tick.sequence_number,
            frame_time: tick.frame_time,
            deadline: tick.deadline,
            kind: tick.kind,
            deferred,
        }
    }
}

/// Emitted whenever the deadline is (re)computed inside an open interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadlineEvent {
    /// Sequence number of the open tick.
    pub sequence_number: u64,
    /// Adjusted deadline mode.
    pub mode: DeadlineMode,
    /// Why the policy chose `mode`.
    pub reason: DeadlineReason,
    /// Absolute deadline: [`HostTime::ZERO`] for `Immediate` (due at once,
    /// not a timestamp) and [`HostTime::NEVER`] for `None`.
    pub time: HostTime,
    /// `false` if an identical deadline was already armed.
    pub rearmed: bool,
}

/// Emitted when the completeness scan flips `has_pending_surfaces`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingSurfacesEvent {
    /// Sequence number of the open tick.
    pub sequence_number: u64,
    /// New value of the flag.
    pub has_pending: bool,
    /// The first surface found blocking, if any.
    pub blocking: Option<SurfaceId>,
}

/// Emitted when an interval closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalEndEvent {
    /// Source of the closed tick.
    pub source_id: TickSourceId,
    /// Sequence number of the closed tick.
    pub sequence_number: u64,
    /// Whether a draw happened.
    pub did_draw: bool,
    /// `true` if completed by an explicit request instead of the deadline.
    pub forced: bool,
}

/// Which end of a swap is being reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwapPhase {
    /// The swap was submitted.
    Submitted,
    /// The swap completed.
    Completed,
}

/// Emitted when a swap is submitted or completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapEvent {
    /// Monotonic swap identifier.
    pub swap_id: u64,
    /// Submitted or completed.
    pub phase: SwapPhase,
    /// Swaps in flight after this event.
    pub pending_swap_count: u32,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the scheduler.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a tick is handled or deferred.
    fn on_tick(&mut self, e: &TickEvent) {
        _ = e;
    }

    /// Called when the deadline is recomputed.
    fn on_deadline(&mut self, e: &DeadlineEvent) {
        _ = e;
    }

    /// Called when the pending-surfaces flag changes.
    fn on_pending_surfaces(&mut self, e: &PendingSurfacesEvent) {
        _ = e;
    }

    /// Called when an interval closes.
    fn on_interval_end(&mut self, e: &IntervalEndEvent) {
        _ = e;
    }

    /// Called when a swap is submitted or completes.
    fn on_swap(&mut self, e: &SwapEvent) {
        _ = e;
    }

    /// Called when back-pressure is asserted or cleared.
    fn on_backpressure(&mut self, busy: bool) {
        _ = busy;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Owning wrapper around an optional [`TraceSink`].
#[derive(Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        let mut tracer = Self::none();
        tracer.set_sink(Some(sink));
        tracer
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Replaces the sink, returning the previous one.
    ///
    /// Without the `trace` feature the sink is dropped and `None` returned.
    #[inline]
    pub fn set_sink(&mut self, sink: Option<Box<dyn TraceSink>>) -> Option<Box<dyn TraceSink>> {
        #[cfg(feature = "trace")]
        {
            core::mem::replace(&mut self.sink, sink)
        }
        #[cfg(not(feature = "trace"))]
        {
            drop(sink);
            None
        }
    }

    /// Emits a [`TickEvent`].
    #[inline]
    pub fn tick(&mut self, e: &TickEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_tick(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`DeadlineEvent`].
    #[inline]
    pub fn deadline(&mut self, e: &DeadlineEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_deadline(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PendingSurfacesEvent`].
    #[inline]
    pub fn pending_surfaces(&mut self, e: &PendingSurfacesEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pending_surfaces(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`IntervalEndEvent`].
    #[inline]
    pub fn interval_end(&mut self, e: &IntervalEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_interval_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SwapEvent`].
    #[inline]
    pub fn swap(&mut self, e: &SwapEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_swap(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a back-pressure change.
    #[inline]
    pub fn backpressure(&mut self, busy: bool) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_backpressure(busy);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = busy;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
