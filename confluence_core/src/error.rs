// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Construction errors.
//!
//! Scheduling itself never fails: every abnormal runtime condition is folded
//! into a deadline decision. Only an invalid [`SchedulerConfig`] is rejected.
//!
//! [`SchedulerConfig`]: crate::scheduler::SchedulerConfig

/// An invalid [`SchedulerConfig`](crate::scheduler::SchedulerConfig).
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq)]
pub enum ConfigError {
    /// The swap budget must allow at least one swap in flight.
    #[error("max_pending_swaps must be at least 1")]
    ZeroPendingSwaps,

    /// Draw-cost fractions must lie in `[0, 1)`.
    #[error("draw cost fraction {0} is outside [0, 1)")]
    InvalidDrawFraction(f32),

    /// EMA smoothing factors must lie in `(0, 1]`.
    #[error("ema_alpha {0} is outside (0, 1]")]
    InvalidEmaAlpha(f32),

    /// Safety multipliers must be finite and non-negative.
    #[error("safety multiplier {0} must be finite and non-negative")]
    InvalidSafetyMultiplier(f32),
}
