// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contracts for the scheduler's two collaborators.
//!
//! The [`FrameScheduler`](crate::scheduler::FrameScheduler) owns one
//! [`TickSource`] and one [`DrawClient`]. Both are called synchronously on the
//! scheduler's executor and must not call back into the scheduler; anything
//! they need to deliver later (ticks, swap completions, surface events) goes
//! through the host's event loop and the scheduler's public methods.
//!
//! ```text
//!   TickSource ──tick──► FrameScheduler ──draw_and_present──► DrawClient
//!        ▲                   │     ▲                              │
//!        └── backpressure ───┘     └──── swap ack / surface ──────┘
//! ```

use crate::surface::SurfaceId;
use crate::tick::{Acknowledgment, Tick};

/// The periodic tick generator.
pub trait TickSource {
    /// Adds the scheduler as a tick observer.
    ///
    /// A source may answer with the most recent tick, which the scheduler
    /// then handles as [`TickKind::Missed`](crate::tick::TickKind::Missed).
    fn subscribe(&mut self) -> Option<Tick>;

    /// Removes the scheduler as a tick observer.
    fn unsubscribe(&mut self);

    /// Asserts or clears back-pressure: the swap queue is saturated.
    fn set_backpressure(&mut self, busy: bool);

    /// The scheduler finished handling the current tick.
    fn notify_interval_ended(&mut self);
}

/// Performs draws and answers per-surface questions.
pub trait DrawClient {
    /// Composites all surfaces and presents the result. Returns `true` on
    /// success.
    fn draw_and_present(&mut self) -> bool;

    /// A surface changed. Returns `true` if this damages the display.
    fn notify_surface_damaged(&mut self, surface: SurfaceId, ack: &Acknowledgment) -> bool;

    /// A surface was destroyed.
    fn notify_surface_destroyed(&mut self, surface: SurfaceId);

    /// Returns `true` if `surface` has a submitted frame its producer has not
    /// been acknowledged for yet.
    fn surface_has_unacknowledged_frame(&self, surface: SurfaceId) -> bool;

    /// The scheduler closed a tick interval. `ack.has_damage` tells whether
    /// it drew.
    fn on_interval_finished(&mut self, ack: &Acknowledgment) {
        _ = ack;
    }
}
