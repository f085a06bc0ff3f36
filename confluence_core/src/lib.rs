// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame scheduling for multi-surface compositing display servers.
//!
//! `confluence_core` decides, on every vsync-like tick, *when* a compositor
//! should draw: as soon as every producer has contributed, at a heuristic
//! deadline, or late enough that a slow root can still catch the frame. It is
//! `no_std` compatible (with `alloc`) and has no executor of its own; the host
//! event loop drives it with plain method calls.
//!
//! # Architecture
//!
//! ```text
//!   TickSource ──Tick──► FrameScheduler::on_tick()
//!                              │
//!                              ▼
//!   surface events ──► SurfaceTracker ──► has_pending_surfaces
//!                              │
//!                              ▼
//!                 desired_mode() ──► DeadlineTimer ──► poll(now)
//!                                                         │
//!                 ┌───────────────────────────────────────┘
//!                 ▼
//!   DrawClient::draw_and_present() ──► did_swap_buffers()
//!                                            │
//!   swap completion ──► did_receive_swap_ack() ┘ (back-pressure)
//! ```
//!
//! **[`scheduler`]**: The [`FrameScheduler`](scheduler::FrameScheduler)
//! state machine, its configuration, and draw-cost estimation.
//!
//! **[`deadline`]**: The deadline policy as pure functions, and the
//! cancelable single-slot deadline timer.
//!
//! **[`surface`]**: Per-surface tick and acknowledgment bookkeeping that
//! answers "is anyone still working on this tick?".
//!
//! **[`tick`]**: Ticks and acknowledgments.
//!
//! **[`client`]**: The [`TickSource`](client::TickSource) and
//! [`DrawClient`](client::DrawClient) traits the host implements.
//!
//! **[`gate`]**: Readiness gates that hold drawing, and a first-activation
//! gate policy.
//!
//! **[`time`]**: Host time and durations in opaque ticks.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! scheduling instrumentation, with zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! **[`error`]**: Configuration errors.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod client;
pub mod deadline;
pub mod error;
pub mod gate;
pub mod scheduler;
pub mod surface;
pub mod tick;
pub mod time;
pub mod trace;
