// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-surface tick bookkeeping.
//!
//! The [`SurfaceTracker`] remembers, for every producer surface the scheduler
//! has heard from, the last [`Tick`] the surface was sent and the last
//! [`Acknowledgment`] it returned. From that it answers one question: is any
//! surface still expected to contribute to the currently open interval?

use alloc::collections::BTreeMap;
use core::fmt;

use crate::tick::{Acknowledgment, Tick};

/// An opaque reference to a content-producing surface.
///
/// Surface identities are assigned by the surrounding display system; the
/// scheduler only compares them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

impl fmt::Debug for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceId({})", self.0)
    }
}

/// What the scheduler knows about one surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceRecord {
    /// Last tick the surface's producer was sent.
    pub last_seen_tick: Option<Tick>,
    /// Last acknowledgment accepted from the producer.
    pub last_ack: Option<Acknowledgment>,
}

impl SurfaceRecord {
    /// Returns `true` if this surface still owes an answer for `current`.
    ///
    /// A surface does not block `current` when it never saw that tick (it
    /// belongs to another hierarchy or joined late) or when it already
    /// acknowledged it. Throttled producers are handled by the caller.
    #[must_use]
    pub fn awaits(&self, current: &Tick) -> bool {
        let Some(seen) = &self.last_seen_tick else {
            return false;
        };
        if seen.source_id != current.source_id || seen.sequence_number != current.sequence_number
        {
            return false;
        }
        !self
            .last_ack
            .is_some_and(|ack| current.is_acknowledged_by(&ack))
    }
}

/// Mapping from [`SurfaceId`] to [`SurfaceRecord`].
#[derive(Clone, Debug, Default)]
pub struct SurfaceTracker {
    records: BTreeMap<SurfaceId, SurfaceRecord>,
}

impl SurfaceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `surface` was sent `tick` and is expected to answer.
    ///
    /// Creates the record if this is the first time the surface is seen.
    pub fn expect_damage(&mut self, surface: SurfaceId, tick: Tick) {
        self.records.entry(surface).or_default().last_seen_tick = Some(tick);
    }

    /// Applies an acknowledgment from `surface`.
    ///
    /// Creates the record if needed. Returns `true` if the stored
    /// acknowledgment changed; acknowledgments without a valid sequence
    /// number, and acknowledgments that do not
    /// [supersede](Acknowledgment::supersedes) the stored one, leave it
    /// untouched.
    pub fn apply_ack(&mut self, surface: SurfaceId, ack: Acknowledgment) -> bool {
        let record = self.records.entry(surface).or_default();
        if !ack.is_valid() {
            return false;
        }
        match &record.last_ack {
            Some(stored) if !ack.supersedes(stored) => false,
            _ => {
                record.last_ack = Some(ack);
                true
            }
        }
    }

    /// Forgets `surface`. Returns `true` if it was tracked.
    pub fn remove(&mut self, surface: SurfaceId) -> bool {
        self.records.remove(&surface).is_some()
    }

    /// Returns the record for `surface`, if tracked.
    #[must_use]
    pub fn get(&self, surface: SurfaceId) -> Option<&SurfaceRecord> {
        self.records.get(&surface)
    }

    /// Returns the number of tracked surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no surface is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over all tracked surfaces.
    pub fn iter(&self) -> impl Iterator<Item = (SurfaceId, &SurfaceRecord)> + '_ {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    /// Finds a surface that still owes an answer for `current`.
    ///
    /// `has_unacked_frame` reports producers that already have a frame in
    /// flight; those are throttled and cannot contribute more this interval,
    /// so they never block. Stops at the first blocking surface.
    pub fn first_pending(
        &self,
        current: &Tick,
        mut has_unacked_frame: impl FnMut(SurfaceId) -> bool,
    ) -> Option<SurfaceId> {
        self.records
            .iter()
            .filter(|(_, record)| record.awaits(current))
            .map(|(id, _)| *id)
            .find(|id| !has_unacked_frame(*id))
    }
}
