// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ticks and the acknowledgments producers send back for them.
//!
//! A [`Tick`] is one opportunity to produce and present a frame. It is
//! delivered by a [`TickSource`](crate::client::TickSource) to the
//! [`FrameScheduler`](crate::scheduler::FrameScheduler), and (through the
//! surrounding system) to every producer. Each producer eventually answers
//! with an [`Acknowledgment`] naming the tick it responded to.
//!
//! Ticks are identified by `(source_id, sequence_number)`. Sequence numbers
//! are monotonic per source and start at [`STARTING_SEQUENCE`];
//! [`INVALID_SEQUENCE`] marks an acknowledgment that was not sent in response
//! to any tick.

use crate::time::{Duration, HostTime};

/// Sequence number carried by acknowledgments not tied to a tick.
pub const INVALID_SEQUENCE: u64 = 0;

/// The first valid sequence number a tick source hands out.
pub const STARTING_SEQUENCE: u64 = 1;

/// Identifies the tick source that produced a [`Tick`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct TickSourceId(pub u64);

/// How a tick was delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TickKind {
    /// Delivered on time by the periodic signal.
    #[default]
    Normal,
    /// Replayed late, typically to a newly added subscriber.
    Missed,
    /// Producers only animate; no content is expected. The scheduler treats
    /// these exactly like [`TickKind::Normal`].
    AnimateOnly,
}

/// A frame opportunity delivered by the tick source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tick {
    /// Which source produced this tick.
    pub source_id: TickSourceId,
    /// Monotonic per source.
    pub sequence_number: u64,
    /// Time the tick represents (the vsync timestamp).
    pub frame_time: HostTime,
    /// Refresh interval of the source.
    pub interval: Duration,
    /// Latest time producers should submit by.
    pub deadline: HostTime,
    /// Delivery kind.
    pub kind: TickKind,
}

impl Tick {
    /// Returns `true` if this tick has a valid sequence number.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.sequence_number >= STARTING_SEQUENCE
    }

    /// Returns the time one full interval after `frame_time`.
    #[inline]
    #[must_use]
    pub const fn interval_end(&self) -> HostTime {
        self.frame_time.saturating_add(self.interval)
    }

    /// Returns a copy of this tick marked as [`TickKind::Missed`].
    #[inline]
    #[must_use]
    pub const fn as_missed(self) -> Self {
        Self {
            kind: TickKind::Missed,
            ..self
        }
    }

    /// Returns `true` if `ack` answers exactly this tick.
    #[inline]
    #[must_use]
    pub fn is_acknowledged_by(&self, ack: &Acknowledgment) -> bool {
        ack.source_id == self.source_id && ack.sequence_number == self.sequence_number
    }
}

/// A producer's completion signal for a specific [`Tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Acknowledgment {
    /// Source of the acknowledged tick.
    pub source_id: TickSourceId,
    /// Sequence number of the acknowledged tick, or [`INVALID_SEQUENCE`].
    pub sequence_number: u64,
    /// Whether the producer submitted new content.
    pub has_damage: bool,
}

impl Acknowledgment {
    /// Builds an acknowledgment answering `tick`.
    #[inline]
    #[must_use]
    pub const fn for_tick(tick: &Tick, has_damage: bool) -> Self {
        Self {
            source_id: tick.source_id,
            sequence_number: tick.sequence_number,
            has_damage,
        }
    }

    /// An acknowledgment not tied to any tick, reporting full damage.
    ///
    /// Used when content changes outside the tick cycle, e.g. a new root
    /// surface.
    #[inline]
    #[must_use]
    pub const fn manual() -> Self {
        Self {
            source_id: TickSourceId(0),
            sequence_number: INVALID_SEQUENCE,
            has_damage: true,
        }
    }

    /// Returns `true` if this acknowledges an actual tick.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.sequence_number >= STARTING_SEQUENCE
    }

    /// Returns `true` if `self` may replace `stored` as a surface's latest
    /// acknowledgment.
    ///
    /// Acknowledgments from a different source always supersede. From the
    /// same source, only a strictly greater sequence number does; stray acks
    /// for older ticks are discarded.
    #[inline]
    #[must_use]
    pub fn supersedes(&self, stored: &Self) -> bool {
        self.source_id != stored.source_id || self.sequence_number > stored.sequence_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(source: u64, seq: u64) -> Tick {
        Tick {
            source_id: TickSourceId(source),
            sequence_number: seq,
            frame_time: HostTime(1_000_000),
            interval: Duration(16_666_667),
            deadline: HostTime(1_012_000),
            kind: TickKind::Normal,
        }
    }

    #[test]
    fn ack_for_tick_matches_tick() {
        let t = tick(3, 7);
        let ack = Acknowledgment::for_tick(&t, true);
        assert!(t.is_acknowledged_by(&ack));
        assert!(ack.is_valid());
        assert!(!t.is_acknowledged_by(&Acknowledgment::for_tick(&tick(3, 8), true)));
        assert!(!t.is_acknowledged_by(&Acknowledgment::for_tick(&tick(4, 7), true)));
    }

    #[test]
    fn manual_ack_is_invalid_but_damaged() {
        let ack = Acknowledgment::manual();
        assert!(!ack.is_valid());
        assert!(ack.has_damage);
    }

    #[test]
    fn regressing_acks_do_not_supersede() {
        let stored = Acknowledgment::for_tick(&tick(1, 5), false);
        assert!(Acknowledgment::for_tick(&tick(1, 6), false).supersedes(&stored));
        assert!(!Acknowledgment::for_tick(&tick(1, 5), true).supersedes(&stored));
        assert!(!Acknowledgment::for_tick(&tick(1, 4), true).supersedes(&stored));
        // A different source wins even with a lower number.
        assert!(Acknowledgment::for_tick(&tick(2, 1), false).supersedes(&stored));
    }

    #[test]
    fn interval_end_and_missed_copy() {
        let t = tick(1, 1);
        assert_eq!(t.interval_end(), HostTime(17_666_667));
        let missed = t.as_missed();
        assert_eq!(missed.kind, TickKind::Missed);
        assert_eq!(missed.sequence_number, t.sequence_number);
        assert!(!tick(1, INVALID_SEQUENCE).is_valid());
    }
}
