// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frame scheduler.
//!
//! [`FrameScheduler`] decides, for every tick, when to complete the tick
//! interval and whether to draw. It tracks producer surfaces through a
//! [`SurfaceTracker`], chooses a deadline with the policy in
//! [`deadline`](crate::deadline), throttles on in-flight swaps, and
//! back-pressures its [`TickSource`] when the swap queue is full.
//!
//! # Driving the scheduler
//!
//! The scheduler never blocks and never spawns. The host event loop feeds it
//! events through its public methods and wakes it up in time:
//!
//! ```rust,ignore
//! loop {
//!     let wake_at = scheduler.next_wakeup();
//!     let event = event_loop.wait_until(wake_at);
//!     match event {
//!         Event::Tick(tick) => _ = scheduler.on_tick(tick),
//!         Event::SurfaceDamaged(id, ack) => _ = scheduler.on_surface_damaged(id, ack),
//!         Event::SwapAck => scheduler.did_receive_swap_ack(),
//!         Event::Timeout => {}
//!     }
//!     scheduler.poll(now());
//! }
//! ```

use crate::client::{DrawClient, TickSource};
use crate::deadline::{
    ArmOutcome, DeadlineInputs, DeadlineMode, DeadlineTimer, TimerToken, adjusted_mode,
    deadline_time, desired_mode,
};
use crate::error::ConfigError;
use crate::gate::{GateId, ReadinessGates};
use crate::surface::{SurfaceId, SurfaceTracker};
use crate::tick::{Acknowledgment, Tick, TickKind};
use crate::time::{Duration, HostTime};
use crate::trace::{
    DeadlineEvent, IntervalEndEvent, PendingSurfacesEvent, SwapEvent, SwapPhase, TickEvent,
    TraceSink, Tracer,
};

use alloc::boxed::Box;

/// How the scheduler estimates the cost of drawing and presenting.
///
/// The estimate is subtracted from each tick's deadline so the draw can
/// finish in time. It never exceeds the tick interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawCostPolicy {
    /// A fixed share of the tick interval.
    Fixed {
        /// Share of the interval, in `[0, 1)`.
        fraction: f32,
    },
    /// An exponential moving average of observed draw costs, scaled by a
    /// safety multiplier. Until the first observation, falls back to a fixed
    /// share of the interval.
    ///
    /// Observations are fed with [`FrameScheduler::observe_draw_cost`].
    Adaptive {
        /// EMA smoothing factor, in `(0, 1]`. Smaller values smooth more.
        ema_alpha: f32,
        /// Multiplier applied to the EMA.
        safety_multiplier: f32,
        /// Share of the interval used before any observation, in `[0, 1)`.
        fallback_fraction: f32,
    },
}

impl DrawCostPolicy {
    /// One third of the tick interval.
    pub const DEFAULT: Self = Self::Fixed {
        fraction: 1.0 / 3.0,
    };
}

/// Configuration for the [`FrameScheduler`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Swaps allowed in flight before the scheduler throttles (at least 1).
    pub max_pending_swaps: u32,
    /// Wait for every active surface before drawing, never drawing on a
    /// heuristic timeout.
    pub wait_for_all_surfaces: bool,
    /// Draw-cost estimate subtracted from tick deadlines.
    pub draw_cost: DrawCostPolicy,
}

impl SchedulerConfig {
    /// Lowest latency: one swap in flight, draw as soon as the heuristic
    /// allows.
    #[must_use]
    pub const fn low_latency() -> Self {
        Self {
            max_pending_swaps: 1,
            wait_for_all_surfaces: false,
            draw_cost: DrawCostPolicy::DEFAULT,
        }
    }

    /// Full-completeness pipeline: every surface contributes to every frame.
    #[must_use]
    pub const fn full_pipeline() -> Self {
        Self {
            max_pending_swaps: 2,
            wait_for_all_surfaces: true,
            draw_cost: DrawCostPolicy::DEFAULT,
        }
    }

    /// Checks the configuration for values the scheduler cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pending_swaps == 0 {
            return Err(ConfigError::ZeroPendingSwaps);
        }
        match self.draw_cost {
            DrawCostPolicy::Fixed { fraction } => check_fraction(fraction),
            DrawCostPolicy::Adaptive {
                ema_alpha,
                safety_multiplier,
                fallback_fraction,
            } => {
                if ema_alpha.is_nan() || ema_alpha <= 0.0 || ema_alpha > 1.0 {
                    return Err(ConfigError::InvalidEmaAlpha(ema_alpha));
                }
                if !safety_multiplier.is_finite() || safety_multiplier < 0.0 {
                    return Err(ConfigError::InvalidSafetyMultiplier(safety_multiplier));
                }
                check_fraction(fallback_fraction)
            }
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::low_latency()
    }
}

fn check_fraction(fraction: f32) -> Result<(), ConfigError> {
    if (0.0..1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(ConfigError::InvalidDrawFraction(fraction))
    }
}

/// Exponential moving average tracker.
#[derive(Clone, Copy, Debug)]
struct Ema {
    value: f32,
    alpha: f32,
    initialized: bool,
}

impl Ema {
    const fn new(alpha: f32) -> Self {
        Self {
            value: 0.0,
            alpha,
            initialized: false,
        }
    }

    fn update(&mut self, sample: f32) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    const fn get(&self) -> Option<f32> {
        if self.initialized {
            Some(self.value)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct DrawCostEstimator {
    policy: DrawCostPolicy,
    ema: Ema,
}

impl DrawCostEstimator {
    fn new(policy: DrawCostPolicy) -> Self {
        let alpha = match policy {
            DrawCostPolicy::Adaptive { ema_alpha, .. } => ema_alpha,
            DrawCostPolicy::Fixed { .. } => 1.0,
        };
        Self {
            policy,
            ema: Ema::new(alpha),
        }
    }

    fn observe(&mut self, cost: Duration) {
        self.ema.update(cost.ticks() as f32);
    }

    fn estimate(&self, interval: Duration) -> Duration {
        let estimate = match self.policy {
            DrawCostPolicy::Fixed { fraction } => interval.scale(fraction),
            DrawCostPolicy::Adaptive {
                safety_multiplier,
                fallback_fraction,
                ..
            } => match self.ema.get() {
                Some(avg) => Duration(1).scale(avg * safety_multiplier),
                None => interval.scale(fallback_fraction),
            },
        };
        estimate.min(interval)
    }
}

/// The scheduler's mutable state.
#[derive(Clone, Copy, Debug)]
struct SchedulerState {
    visible: bool,
    output_target_lost: bool,
    root_content_missing: bool,
    needs_draw: bool,
    expecting_resize_damage: bool,
    has_pending_surfaces: bool,
    pending_swap_count: u32,
    inside_tick_interval: bool,
    observing_ticks: bool,
    current_tick: Option<Tick>,
    root_surface: Option<SurfaceId>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            visible: false,
            output_target_lost: false,
            root_content_missing: true,
            needs_draw: false,
            expecting_resize_damage: false,
            has_pending_surfaces: false,
            pending_swap_count: 0,
            inside_tick_interval: false,
            observing_ticks: false,
            current_tick: None,
            root_surface: None,
        }
    }
}

/// Tick and surface lifecycle events, for hosts that route observers
/// through a single entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A tick from the tick source.
    Tick(Tick),
    /// A surface's producer was sent a tick and will answer.
    DamageExpected {
        /// The surface.
        surface: SurfaceId,
        /// The tick it was sent.
        tick: Tick,
    },
    /// A surface changed or acknowledged a tick.
    Damaged {
        /// The surface.
        surface: SurfaceId,
        /// Its acknowledgment.
        ack: Acknowledgment,
    },
    /// A surface became a candidate for destruction.
    MarkedForDestruction(SurfaceId),
    /// A surface was destroyed.
    Destroyed(SurfaceId),
}

/// Decides when to draw, for one display.
///
/// # Intervals
///
/// Each accepted tick opens a *tick interval*. The interval closes when its
/// deadline fires, when a newer tick arrives, or when
/// [`force_immediate_draw`](Self::force_immediate_draw) is called. Closing
/// draws if the display needs it and is able to, then tells the tick source
/// and the draw client that the interval ended. At most one interval is open.
///
/// # Observation
///
/// The scheduler subscribes to its tick source while it has something to
/// draw, and unsubscribes after an interval closes without being able to
/// draw. Subscribing may replay a missed tick synchronously.
///
/// # Teardown
///
/// Dropping the scheduler clears back-pressure, even with swaps still in
/// flight, and unsubscribes from the tick source. Deferred work is dropped
/// with it.
#[derive(Debug)]
pub struct FrameScheduler<S: TickSource, C: DrawClient> {
    config: SchedulerConfig,
    source: S,
    client: C,
    state: SchedulerState,
    surfaces: SurfaceTracker,
    timer: DeadlineTimer,
    deferred_tick: Option<Tick>,
    inside_surface_damage: bool,
    gates: ReadinessGates,
    draw_cost: DrawCostEstimator,
    next_swap_id: u64,
    tracer: Tracer,
}

impl<S: TickSource, C: DrawClient> FrameScheduler<S, C> {
    /// Creates a scheduler. It starts invisible, with root content missing
    /// and without observing ticks.
    pub fn new(config: SchedulerConfig, source: S, client: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            client,
            state: SchedulerState::default(),
            surfaces: SurfaceTracker::new(),
            timer: DeadlineTimer::new(),
            deferred_tick: None,
            inside_surface_damage: false,
            gates: ReadinessGates::default(),
            draw_cost: DrawCostEstimator::new(config.draw_cost),
            next_swap_id: 1,
            tracer: Tracer::none(),
        })
    }

    // -- display state ------------------------------------------------------

    /// Shows or hides the display.
    ///
    /// A hidden display stops observing ticks once its current interval
    /// closes without drawing.
    pub fn set_visible(&mut self, visible: bool) {
        if self.state.visible == visible {
            return;
        }
        self.state.visible = visible;
        self.maybe_start_observing_ticks();
        self.schedule_deadline();
    }

    /// Marks whether the root surface has content. Missing root content
    /// forces late deadlines and prevents drawing.
    pub fn set_root_content_missing(&mut self, missing: bool) {
        if self.state.root_content_missing == missing {
            return;
        }
        tracing::debug!(missing, "root content missing changed");
        self.state.root_content_missing = missing;
        self.maybe_start_observing_ticks();
        self.schedule_deadline();
    }

    /// The display was resized; the root is expected to re-submit.
    pub fn notify_resize(&mut self) {
        self.state.expecting_resize_damage = true;
        self.state.needs_draw = true;
        self.schedule_deadline();
    }

    /// The output target was lost. The open interval completes immediately
    /// and the scheduler stops drawing.
    pub fn output_target_lost(&mut self) {
        tracing::debug!("output target lost");
        self.state.output_target_lost = true;
        self.schedule_deadline();
    }

    /// Sets the root surface and treats it as fully damaged.
    pub fn set_new_root_surface(&mut self, surface: SurfaceId) {
        tracing::debug!(?surface, "new root surface");
        self.state.root_surface = Some(surface);
        self.process_surface_damage(surface, Acknowledgment::manual(), true);
    }

    /// Completes the open interval right now, drawing if possible.
    ///
    /// Used just before a resize so the old size is presented first.
    pub fn force_immediate_draw(&mut self) {
        let was_inside = self.state.inside_tick_interval;
        let did_draw = self.attempt_draw_and_swap();
        if was_inside {
            self.finish_interval(did_draw, true);
        }
    }

    /// Observes ticks for at least one interval even with nothing to draw.
    pub fn request_one_tick(&mut self) {
        self.start_observing_ticks();
    }

    // -- surfaces -----------------------------------------------------------

    /// Central damage entry point.
    ///
    /// `display_damaged` tells whether the change affects the composited
    /// output. A valid `ack` is recorded for `surface` unless it regresses.
    /// Ticks delivered while this runs are deferred to a follow-up task.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn process_surface_damage(
        &mut self,
        surface: SurfaceId,
        ack: Acknowledgment,
        display_damaged: bool,
    ) {
        self.with_damage_guard(|this| {
            if display_damaged {
                this.state.needs_draw = true;
                if this.state.root_surface == Some(surface) {
                    this.state.expecting_resize_damage = false;
                }
                this.maybe_start_observing_ticks();
            }

            let ack_applied = this.surfaces.apply_ack(surface, ack);

            let pending_changed =
                (display_damaged || ack_applied) && this.update_has_pending_surfaces();

            if display_damaged || pending_changed {
                this.schedule_deadline();
            }
        });
    }

    /// A surface changed. Asks the draw client whether the display is
    /// damaged, then processes the damage. Returns the client's answer.
    pub fn on_surface_damaged(&mut self, surface: SurfaceId, ack: Acknowledgment) -> bool {
        let damaged = self.client.notify_surface_damaged(surface, &ack);
        self.process_surface_damage(surface, ack, damaged);
        damaged
    }

    /// A surface's producer was sent `tick` and is expected to answer it.
    pub fn on_surface_damage_expected(&mut self, surface: SurfaceId, tick: Tick) {
        self.surfaces.expect_damage(surface, tick);
        if self.update_has_pending_surfaces() {
            self.schedule_deadline();
        }
    }

    /// A surface will go away; it no longer blocks any interval.
    pub fn on_surface_marked_for_destruction(&mut self, surface: SurfaceId) {
        if !self.surfaces.remove(surface) {
            return;
        }
        if self.update_has_pending_surfaces() {
            self.schedule_deadline();
        }
    }

    /// A surface was destroyed.
    pub fn on_surface_destroyed(&mut self, surface: SurfaceId) {
        self.client.notify_surface_destroyed(surface);
    }

    /// Routes a [`SchedulerEvent`] to its handler. Returns the handler's
    /// answer for ticks and damage, `true` otherwise.
    pub fn dispatch(&mut self, event: SchedulerEvent) -> bool {
        match event {
            SchedulerEvent::Tick(tick) => self.on_tick(tick),
            SchedulerEvent::DamageExpected { surface, tick } => {
                self.on_surface_damage_expected(surface, tick);
                true
            }
            SchedulerEvent::Damaged { surface, ack } => self.on_surface_damaged(surface, ack),
            SchedulerEvent::MarkedForDestruction(surface) => {
                self.on_surface_marked_for_destruction(surface);
                true
            }
            SchedulerEvent::Destroyed(surface) => {
                self.on_surface_destroyed(surface);
                true
            }
        }
    }

    // -- ticks ----------------------------------------------------------------

    /// Handles a tick from the tick source. Always returns `true`.
    ///
    /// Closes a still-open interval first, then opens a new one whose
    /// deadline is shortened by the draw-cost estimate.
    pub fn on_tick(&mut self, tick: Tick) -> bool {
        if self.inside_surface_damage {
            // Running the tick here would draw on the stack of whoever
            // reported the damage. Hand it to a follow-up task instead.
            debug_assert_eq!(
                tick.kind,
                TickKind::Missed,
                "only replayed ticks arrive during damage processing"
            );
            tracing::trace!(seq = tick.sequence_number, "deferring reentrant tick");
            self.tracer.tick(&TickEvent::new(&tick, true));
            self.deferred_tick = Some(tick);
            return true;
        }

        // A newer tick supersedes a deferred one.
        self.deferred_tick = None;

        if self.state.inside_tick_interval {
            self.on_deadline_reached();
        }

        let estimate = self.draw_cost.estimate(tick.interval);
        let current = Tick {
            deadline: tick.deadline - estimate,
            ..tick
        };
        tracing::trace!(
            seq = current.sequence_number,
            kind = ?current.kind,
            deadline = current.deadline.ticks(),
            "tick"
        );
        self.tracer.tick(&TickEvent::new(&current, false));

        self.state.current_tick = Some(current);
        self.state.inside_tick_interval = true;
        self.update_has_pending_surfaces();
        self.schedule_deadline();
        true
    }

    /// The tick source paused or resumed. Pausing is not supported.
    pub fn on_tick_source_paused_changed(&mut self, paused: bool) {
        if paused {
            tracing::warn!("tick source pausing is not supported; ignoring");
        }
    }

    /// Runs due work: first a deferred tick, then the deadline if it is due
    /// at `now`. Returns `true` if anything ran.
    pub fn poll(&mut self, now: HostTime) -> bool {
        let mut ran = self.run_deferred_tick();
        if self.timer.is_due(now) {
            self.on_deadline_reached();
            ran = true;
        }
        ran
    }

    /// Runs the deferred tick, if one is outstanding.
    pub fn run_deferred_tick(&mut self) -> bool {
        match self.deferred_tick.take() {
            Some(tick) => {
                self.on_tick(tick);
                true
            }
            None => false,
        }
    }

    /// Fires the deadline armed with `token`, for hosts that run their own
    /// timers. Stale tokens are ignored. Returns `true` if it fired.
    pub fn fire_deadline(&mut self, token: TimerToken) -> bool {
        if !self.timer.accepts(token) {
            return false;
        }
        self.on_deadline_reached();
        true
    }

    /// When the host should call [`poll`](Self::poll) next.
    ///
    /// [`HostTime::ZERO`] means "as soon as possible"; `None` means no work
    /// is scheduled.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<HostTime> {
        if self.deferred_tick.is_some() {
            return Some(HostTime::ZERO);
        }
        self.timer.armed_at()
    }

    // -- swaps ----------------------------------------------------------------

    /// The draw client submitted a swap.
    pub fn did_swap_buffers(&mut self) {
        debug_assert!(
            self.state.pending_swap_count < self.config.max_pending_swaps,
            "swap submitted past the swap budget"
        );
        self.state.pending_swap_count =
            (self.state.pending_swap_count + 1).min(self.config.max_pending_swaps);
        let swap_id = self.next_swap_id;
        self.next_swap_id += 1;
        tracing::trace!(swap_id, pending = self.state.pending_swap_count, "swap submitted");
        self.tracer.swap(&SwapEvent {
            swap_id,
            phase: SwapPhase::Submitted,
            pending_swap_count: self.state.pending_swap_count,
        });

        if self.state.pending_swap_count == self.config.max_pending_swaps {
            self.set_backpressure(true);
        }
    }

    /// The oldest in-flight swap completed.
    pub fn did_receive_swap_ack(&mut self) {
        debug_assert!(
            self.state.pending_swap_count > 0,
            "swap acknowledged with none in flight"
        );
        let swap_id = self.next_swap_id - u64::from(self.state.pending_swap_count);
        self.state.pending_swap_count = self.state.pending_swap_count.saturating_sub(1);
        tracing::trace!(swap_id, pending = self.state.pending_swap_count, "swap completed");
        self.tracer.swap(&SwapEvent {
            swap_id,
            phase: SwapPhase::Completed,
            pending_swap_count: self.state.pending_swap_count,
        });

        // Clear after the count drops so the source sees the new throttle
        // state if it reacts synchronously.
        self.set_backpressure(false);
        self.schedule_deadline();
    }

    /// Feeds an observed draw-and-present duration to an adaptive draw-cost
    /// policy. Ignored by fixed policies.
    pub fn observe_draw_cost(&mut self, cost: Duration) {
        self.draw_cost.observe(cost);
    }

    // -- readiness gates ------------------------------------------------------

    /// Registers a readiness gate. It starts closed.
    pub fn add_readiness_gate(&mut self) -> GateId {
        self.gates.add()
    }

    /// Opens or closes a gate. Opening the last closed gate restarts tick
    /// observation if there is something to draw.
    pub fn set_gate_open(&mut self, gate: GateId, open: bool) {
        if !self.gates.set_open(gate, open) {
            return;
        }
        tracing::debug!(?gate, open, "readiness gate changed");
        if open && self.state.visible {
            self.maybe_start_observing_ticks();
        }
        self.schedule_deadline();
    }

    /// Returns `true` if `gate` is open. Unknown gates count as open.
    #[must_use]
    pub fn is_gate_open(&self, gate: GateId) -> bool {
        self.gates.is_open(gate)
    }

    // -- diagnostics ----------------------------------------------------------

    /// Installs or removes the trace sink. Returns the previous sink.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) -> Option<Box<dyn TraceSink>> {
        self.tracer.set_sink(sink)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Returns the tick source.
    #[must_use]
    pub fn tick_source(&self) -> &S {
        &self.source
    }

    /// Returns the tick source mutably.
    pub fn tick_source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Returns the draw client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the draw client mutably.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Returns the tracked surfaces.
    #[must_use]
    pub fn surfaces(&self) -> &SurfaceTracker {
        &self.surfaces
    }

    /// Returns `true` if the display is visible.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.state.visible
    }

    /// Returns `true` if the output target was lost.
    #[must_use]
    pub fn is_output_target_lost(&self) -> bool {
        self.state.output_target_lost
    }

    /// Returns `true` if the root surface has no content.
    #[must_use]
    pub fn is_root_content_missing(&self) -> bool {
        self.state.root_content_missing
    }

    /// Returns `true` if the display has undrawn damage.
    #[must_use]
    pub fn needs_draw(&self) -> bool {
        self.state.needs_draw
    }

    /// Returns `true` if root damage from a resize is still expected.
    #[must_use]
    pub fn is_expecting_resize_damage(&self) -> bool {
        self.state.expecting_resize_damage
    }

    /// Returns `true` if some surface still owes an answer for the open tick.
    #[must_use]
    pub fn has_pending_surfaces(&self) -> bool {
        self.state.has_pending_surfaces
    }

    /// Returns the number of swaps in flight.
    #[must_use]
    pub fn pending_swap_count(&self) -> u32 {
        self.state.pending_swap_count
    }

    /// Returns `true` while a tick interval is open.
    #[must_use]
    pub fn is_inside_tick_interval(&self) -> bool {
        self.state.inside_tick_interval
    }

    /// Returns `true` while subscribed to the tick source.
    #[must_use]
    pub fn is_observing_ticks(&self) -> bool {
        self.state.observing_ticks
    }

    /// Returns the last accepted tick, with its shortened deadline.
    #[must_use]
    pub fn current_tick(&self) -> Option<&Tick> {
        self.state.current_tick.as_ref()
    }

    /// Returns the root surface, if set.
    #[must_use]
    pub fn root_surface(&self) -> Option<SurfaceId> {
        self.state.root_surface
    }

    /// Returns the armed deadline, if any.
    #[must_use]
    pub fn armed_deadline(&self) -> Option<HostTime> {
        self.timer.armed_at()
    }

    /// Returns the token of the armed deadline, if any.
    #[must_use]
    pub fn deadline_token(&self) -> Option<TimerToken> {
        self.timer.token()
    }

    /// Returns `true` if a deferred tick is waiting to run.
    #[must_use]
    pub fn has_deferred_tick(&self) -> bool {
        self.deferred_tick.is_some()
    }

    /// Evaluates the deadline policy against the current state, including the
    /// full-completeness adjustment.
    #[must_use]
    pub fn adjusted_deadline_mode(&self) -> DeadlineMode {
        let (mode, _) = desired_mode(&self.deadline_inputs());
        adjusted_mode(mode, self.config.wait_for_all_surfaces)
    }

    /// Returns `true` if a draw would happen were the interval to close now,
    /// swap budget permitting.
    #[must_use]
    pub fn should_draw(&self) -> bool {
        self.state.needs_draw
            && !self.state.output_target_lost
            && self.state.visible
            && !self.state.root_content_missing
            && self.gates.all_open()
    }

    // -- internals ------------------------------------------------------------

    /// Runs `f` with the damage reentrancy flag raised. The previous value
    /// is restored on every exit, unwinding included.
    fn with_damage_guard<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let mut guard = DamageGuard::raise(self);
        f(&mut *guard.scheduler)
    }

    fn deadline_inputs(&self) -> DeadlineInputs {
        DeadlineInputs {
            output_target_lost: self.state.output_target_lost,
            pending_swap_count: self.state.pending_swap_count,
            max_pending_swaps: self.config.max_pending_swaps,
            root_content_missing: self.state.root_content_missing,
            has_pending_surfaces: self.state.has_pending_surfaces,
            root_surface_set: self.state.root_surface.is_some(),
            expecting_resize_damage: self.state.expecting_resize_damage,
            needs_draw: self.state.needs_draw,
            wait_for_all_surfaces: self.config.wait_for_all_surfaces,
        }
    }

    fn maybe_start_observing_ticks(&mut self) {
        if self.should_draw() {
            self.start_observing_ticks();
        }
    }

    fn start_observing_ticks(&mut self) {
        if self.state.observing_ticks {
            return;
        }
        self.state.observing_ticks = true;
        tracing::trace!("subscribing to tick source");
        if let Some(replayed) = self.source.subscribe() {
            self.on_tick(replayed.as_missed());
        }
    }

    fn stop_observing_ticks(&mut self) {
        if !self.state.observing_ticks {
            return;
        }
        self.source.unsubscribe();
        self.state.observing_ticks = false;
        tracing::trace!("unsubscribed from tick source");
        // A replayed tick may still be queued; it is meaningless now.
        self.deferred_tick = None;
    }

    fn set_backpressure(&mut self, busy: bool) {
        self.source.set_backpressure(busy);
        self.tracer.backpressure(busy);
    }

    /// Rescans surfaces for the open interval. Returns `true` if
    /// `has_pending_surfaces` changed.
    fn update_has_pending_surfaces(&mut self) -> bool {
        // Outside an interval the next tick rescans anyway.
        if !self.state.inside_tick_interval {
            return false;
        }
        let Some(current) = self.state.current_tick else {
            return false;
        };

        let client = &self.client;
        let blocking = self
            .surfaces
            .first_pending(&current, |id| client.surface_has_unacknowledged_frame(id));

        let old = self.state.has_pending_surfaces;
        self.state.has_pending_surfaces = blocking.is_some();
        tracing::trace!(
            has_pending_surfaces = self.state.has_pending_surfaces,
            blocking = ?blocking,
            "pending surfaces updated"
        );
        let changed = old != self.state.has_pending_surfaces;
        if changed {
            self.tracer.pending_surfaces(&PendingSurfacesEvent {
                sequence_number: current.sequence_number,
                has_pending: self.state.has_pending_surfaces,
                blocking,
            });
        }
        changed
    }

    fn schedule_deadline(&mut self) {
        if !self.state.inside_tick_interval {
            tracing::trace!("waiting for next tick");
            debug_assert!(
                self.timer.armed_at().is_none(),
                "deadline armed outside a tick interval"
            );
            return;
        }
        let Some(current) = self.state.current_tick else {
            return;
        };

        let (mode, reason) = desired_mode(&self.deadline_inputs());
        let mode = adjusted_mode(mode, self.config.wait_for_all_surfaces);
        let time = deadline_time(mode, &current);

        let outcome = self.timer.arm(time);
        let rearmed = outcome != ArmOutcome::Unchanged;
        tracing::debug!(
            reason = reason.as_str(),
            ?mode,
            deadline = time.ticks(),
            rearmed,
            "deadline"
        );
        self.tracer.deadline(&DeadlineEvent {
            sequence_number: current.sequence_number,
            mode,
            reason,
            time,
            rearmed,
        });
    }

    fn on_deadline_reached(&mut self) {
        debug_assert!(
            self.state.inside_tick_interval,
            "deadline fired outside a tick interval"
        );
        let did_draw = self.attempt_draw_and_swap();
        self.finish_interval(did_draw, false);
    }

    /// Closes the interval and draws if the display should and can.
    fn attempt_draw_and_swap(&mut self) -> bool {
        self.state.inside_tick_interval = false;
        self.timer.cancel();

        if self.should_draw() {
            if self.state.pending_swap_count < self.config.max_pending_swaps {
                return self.draw_and_swap();
            }
        } else {
            // Going idle: nothing left to wait for.
            self.state.expecting_resize_damage = false;
            self.stop_observing_ticks();
        }
        false
    }

    fn draw_and_swap(&mut self) -> bool {
        debug_assert!(
            self.state.pending_swap_count < self.config.max_pending_swaps,
            "draw attempted past the swap budget"
        );
        debug_assert!(
            !self.state.output_target_lost,
            "draw attempted without an output target"
        );
        if !self.client.draw_and_present() {
            tracing::debug!("draw client failed to draw");
            return false;
        }
        self.state.needs_draw = false;
        true
    }

    fn finish_interval(&mut self, did_draw: bool, forced: bool) {
        self.source.notify_interval_ended();
        let Some(tick) = self.state.current_tick else {
            return;
        };
        let ack = Acknowledgment::for_tick(&tick, did_draw);
        self.client.on_interval_finished(&ack);
        tracing::trace!(seq = tick.sequence_number, did_draw, forced, "interval finished");
        self.tracer.interval_end(&IntervalEndEvent {
            source_id: tick.source_id,
            sequence_number: tick.sequence_number,
            did_draw,
            forced,
        });
    }
}

/// Holds the damage reentrancy flag raised until dropped.
struct DamageGuard<'a, S: TickSource, C: DrawClient> {
    scheduler: &'a mut FrameScheduler<S, C>,
    outer: bool,
}

impl<'a, S: TickSource, C: DrawClient> DamageGuard<'a, S, C> {
    fn raise(scheduler: &'a mut FrameScheduler<S, C>) -> Self {
        let outer = core::mem::replace(&mut scheduler.inside_surface_damage, true);
        Self { scheduler, outer }
    }
}

impl<S: TickSource, C: DrawClient> Drop for DamageGuard<'_, S, C> {
    fn drop(&mut self) {
        self.scheduler.inside_surface_damage = self.outer;
    }
}

impl<S: TickSource, C: DrawClient> Drop for FrameScheduler<S, C> {
    fn drop(&mut self) {
        // A swap may still be in flight; never leave the source throttled.
        self.set_backpressure(false);
        self.stop_observing_ticks();
    }
}
