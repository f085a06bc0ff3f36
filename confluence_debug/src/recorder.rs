// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use confluence_core::deadline::{DeadlineMode, DeadlineReason};
use confluence_core::surface::SurfaceId;
use confluence_core::tick::{TickKind, TickSourceId};
use confluence_core::time::HostTime;
use confluence_core::trace::{
    DeadlineEvent, IntervalEndEvent, PendingSurfacesEvent, SwapEvent, SwapPhase, TickEvent,
    TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_TICK: u8 = 1;
const TAG_DEADLINE: u8 = 2;
const TAG_PENDING_SURFACES: u8 = 3;
const TAG_INTERVAL_END: u8 = 4;
const TAG_SWAP: u8 = 5;
const TAG_BACKPRESSURE: u8 = 6;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_option_u64(&mut self, v: Option<u64>) {
        match v {
            Some(val) => {
                self.write_u8(1);
                self.write_u64(val);
            }
            None => {
                self.write_u8(0);
                self.write_u64(0);
            }
        }
    }

    fn write_kind(&mut self, k: TickKind) {
        self.write_u8(match k {
            TickKind::Normal => 0,
            TickKind::Missed => 1,
            TickKind::AnimateOnly => 2,
        });
    }

    fn write_mode(&mut self, m: DeadlineMode) {
        self.write_u8(match m {
            DeadlineMode::Immediate => 0,
            DeadlineMode::Regular => 1,
            DeadlineMode::Late => 2,
            DeadlineMode::None => 3,
        });
    }

    fn write_reason(&mut self, r: DeadlineReason) {
        self.write_u8(match r {
            DeadlineReason::OutputTargetLost => 0,
            DeadlineReason::SwapThrottled => 1,
            DeadlineReason::RootContentMissing => 2,
            DeadlineReason::AllSurfacesReady => 3,
            DeadlineReason::NoDamageYet => 4,
            DeadlineReason::EntireDisplayDamaged => 5,
            DeadlineReason::MoreDamageExpected => 6,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_tick(&mut self, e: &TickEvent) {
        self.write_u8(TAG_TICK);
        self.write_u64(e.source_id.0);
        self.write_u64(e.sequence_number);
        self.write_u64(e.frame_time.ticks());
        self.write_u64(e.deadline.ticks());
        self.write_kind(e.kind);
        self.write_bool(e.deferred);
    }

    fn on_deadline(&mut self, e: &DeadlineEvent) {
        self.write_u8(TAG_DEADLINE);
        self.write_u64(e.sequence_number);
        self.write_mode(e.mode);
        self.write_reason(e.reason);
        self.write_u64(e.time.ticks());
        self.write_bool(e.rearmed);
    }

    fn on_pending_surfaces(&mut self, e: &PendingSurfacesEvent) {
        self.write_u8(TAG_PENDING_SURFACES);
        self.write_u64(e.sequence_number);
        self.write_bool(e.has_pending);
        self.write_option_u64(e.blocking.map(|id| id.0));
    }

    fn on_interval_end(&mut self, e: &IntervalEndEvent) {
        self.write_u8(TAG_INTERVAL_END);
        self.write_u64(e.source_id.0);
        self.write_u64(e.sequence_number);
        self.write_bool(e.did_draw);
        self.write_bool(e.forced);
    }

    fn on_swap(&mut self, e: &SwapEvent) {
        self.write_u8(TAG_SWAP);
        self.write_u64(e.swap_id);
        self.write_u8(match e.phase {
            SwapPhase::Submitted => 0,
            SwapPhase::Completed => 1,
        });
        self.write_u32(e.pending_swap_count);
    }

    fn on_backpressure(&mut self, busy: bool) {
        self.write_u8(TAG_BACKPRESSURE);
        self.write_bool(busy);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`TickEvent`].
    Tick(TickEvent),
    /// A [`DeadlineEvent`].
    Deadline(DeadlineEvent),
    /// A [`PendingSurfacesEvent`].
    PendingSurfaces(PendingSurfacesEvent),
    /// An [`IntervalEndEvent`].
    IntervalEnd(IntervalEndEvent),
    /// A [`SwapEvent`].
    Swap(SwapEvent),
    /// Back-pressure asserted or cleared.
    Backpressure {
        /// `true` when asserted.
        busy: bool,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
///
/// Stops at the first unknown tag or truncated record.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_option_u64(&mut self) -> Option<Option<u64>> {
        let present = self.read_u8()?;
        let val = self.read_u64()?;
        Some(if present != 0 { Some(val) } else { None })
    }

    fn read_kind(&mut self) -> Option<TickKind> {
        Some(match self.read_u8()? {
            0 => TickKind::Normal,
            1 => TickKind::Missed,
            _ => TickKind::AnimateOnly,
        })
    }

    fn read_mode(&mut self) -> Option<DeadlineMode> {
        Some(match self.read_u8()? {
            0 => DeadlineMode::Immediate,
            1 => DeadlineMode::Regular,
            2 => DeadlineMode::Late,
            _ => DeadlineMode::None,
        })
    }

    fn read_reason(&mut self) -> Option<DeadlineReason> {
        Some(match self.read_u8()? {
            0 => DeadlineReason::OutputTargetLost,
            1 => DeadlineReason::SwapThrottled,
            2 => DeadlineReason::RootContentMissing,
            3 => DeadlineReason::AllSurfacesReady,
            4 => DeadlineReason::NoDamageYet,
            5 => DeadlineReason::EntireDisplayDamaged,
            _ => DeadlineReason::MoreDamageExpected,
        })
    }

    fn decode_tick(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Tick(TickEvent {
            source_id: TickSourceId(self.read_u64()?),
            sequence_number: self.read_u64()?,
            frame_time: HostTime(self.read_u64()?),
            deadline: HostTime(self.read_u64()?),
            kind: self.read_kind()?,
            deferred: self.read_bool()?,
        }))
    }

    fn decode_deadline(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Deadline(DeadlineEvent {
            sequence_number: self.read_u64()?,
            mode: self.read_mode()?,
            reason: self.read_reason()?,
            time: HostTime(self.read_u64()?),
            rearmed: self.read_bool()?,
        }))
    }

    fn decode_pending_surfaces(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PendingSurfaces(PendingSurfacesEvent {
            sequence_number: self.read_u64()?,
            has_pending: self.read_bool()?,
            blocking: self.read_option_u64()?.map(SurfaceId),
        }))
    }

    fn decode_interval_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::IntervalEnd(IntervalEndEvent {
            source_id: TickSourceId(self.read_u64()?),
            sequence_number: self.read_u64()?,
            did_draw: self.read_bool()?,
            forced: self.read_bool()?,
        }))
    }

    fn decode_swap(&mut self) -> Option<RecordedEvent> {
        let swap_id = self.read_u64()?;
        let phase = match self.read_u8()? {
            0 => SwapPhase::Submitted,
            _ => SwapPhase::Completed,
        };
        Some(RecordedEvent::Swap(SwapEvent {
            swap_id,
            phase,
            pending_swap_count: self.read_u32()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_TICK => self.decode_tick(),
            TAG_DEADLINE => self.decode_deadline(),
            TAG_PENDING_SURFACES => self.decode_pending_surfaces(),
            TAG_INTERVAL_END => self.decode_interval_end(),
            TAG_SWAP => self.decode_swap(),
            TAG_BACKPRESSURE => Some(RecordedEvent::Backpressure {
                busy: self.read_bool()?,
            }),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tick_event() -> TickEvent {
        TickEvent {
            source_id: TickSourceId(3),
            sequence_number: 7,
            frame_time: HostTime(1_000_000),
            deadline: HostTime(1_011_000),
            kind: TickKind::Missed,
            deferred: true,
        }
    }

    #[test]
    fn records_a_scheduling_interval_in_order() {
        let mut rec = RecorderSink::new();
        let tick = sample_tick_event();
        let deadline = DeadlineEvent {
            sequence_number: 7,
            mode: DeadlineMode::Regular,
            reason: DeadlineReason::MoreDamageExpected,
            time: HostTime(1_011_000),
            rearmed: true,
        };
        let pending = PendingSurfacesEvent {
            sequence_number: 7,
            has_pending: true,
            blocking: Some(SurfaceId(42)),
        };
        let end = IntervalEndEvent {
            source_id: TickSourceId(3),
            sequence_number: 7,
            did_draw: true,
            forced: false,
        };
        let swap = SwapEvent {
            swap_id: 9,
            phase: SwapPhase::Completed,
            pending_swap_count: 0,
        };

        rec.on_tick(&tick);
        rec.on_pending_surfaces(&pending);
        rec.on_deadline(&deadline);
        rec.on_interval_end(&end);
        rec.on_swap(&swap);
        rec.on_backpressure(false);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(
            events,
            [
                RecordedEvent::Tick(tick),
                RecordedEvent::PendingSurfaces(pending),
                RecordedEvent::Deadline(deadline),
                RecordedEvent::IntervalEnd(end),
                RecordedEvent::Swap(swap),
                RecordedEvent::Backpressure { busy: false },
            ]
        );
    }

    #[test]
    fn never_deadline_survives_recording() {
        let mut rec = RecorderSink::new();
        rec.on_deadline(&DeadlineEvent {
            sequence_number: 1,
            mode: DeadlineMode::None,
            reason: DeadlineReason::NoDamageYet,
            time: HostTime::NEVER,
            rearmed: false,
        });
        match decode(rec.as_bytes()).next() {
            Some(RecordedEvent::Deadline(e)) => {
                assert!(e.time.is_never());
                assert_eq!(e.mode, DeadlineMode::None);
            }
            other => panic!("expected Deadline, got {other:?}"),
        }
    }

    #[test]
    fn truncated_buffer_stops_iteration() {
        let mut rec = RecorderSink::new();
        rec.on_tick(&sample_tick_event());
        rec.on_backpressure(true);
        let bytes = rec.into_bytes();

        let truncated = &bytes[..bytes.len() - 1];
        let events: Vec<_> = decode(truncated).collect();
        assert_eq!(events.len(), 1, "the partial back-pressure record is dropped");
    }

    #[test]
    fn unknown_tag_stops_iteration() {
        let mut rec = RecorderSink::new();
        rec.on_backpressure(true);
        let mut bytes = rec.into_bytes();
        bytes.push(0xff);
        bytes.push(TAG_BACKPRESSURE);
        bytes.push(0);
        assert_eq!(decode(&bytes).count(), 1);
    }

    #[test]
    fn empty_buffer() {
        assert_eq!(decode(&[]).count(), 0);
    }
}
