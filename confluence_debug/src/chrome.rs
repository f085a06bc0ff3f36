// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Tick intervals become duration slices; everything else becomes instant
//! events, plus a `PendingSwaps` counter track. Only ticks and finite
//! deadlines carry timestamps, so untimed events are placed at the latest
//! timestamp seen so far.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use confluence_core::deadline::DeadlineMode;
use confluence_core::time::{HostTime, Timebase};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut cursor = HostTime::ZERO;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::Tick(e) if e.deferred => {
                events.push(json!({
                    "ph": "i",
                    "name": "DeferredTick",
                    "cat": "Tick",
                    "ts": ticks_to_us(cursor, timebase),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "sequence_number": e.sequence_number,
                    }
                }));
            }
            RecordedEvent::Tick(e) => {
                cursor = cursor.max(e.frame_time);
                events.push(json!({
                    "ph": "B",
                    "name": "Interval",
                    "cat": "Tick",
                    "ts": ticks_to_us(cursor, timebase),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "source_id": e.source_id.0,
                        "sequence_number": e.sequence_number,
                        "kind": format!("{:?}", e.kind),
                        "deadline_us": ticks_to_us(e.deadline, timebase),
                    }
                }));
            }
            RecordedEvent::Deadline(e) => {
                let finite = matches!(e.mode, DeadlineMode::Regular | DeadlineMode::Late);
                if finite {
                    cursor = cursor.max(e.time);
                }
                events.push(json!({
                    "ph": "i",
                    "name": "Deadline",
                    "cat": "Scheduler",
                    "ts": ticks_to_us(cursor, timebase),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "sequence_number": e.sequence_number,
                        "mode": format!("{:?}", e.mode),
                        "reason": e.reason.as_str(),
                        "rearmed": e.rearmed,
                    }
                }));
            }
            RecordedEvent::PendingSurfaces(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "PendingSurfaces",
                    "cat": "Scheduler",
                    "ts": ticks_to_us(cursor, timebase),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "sequence_number": e.sequence_number,
                        "has_pending": e.has_pending,
                        "blocking": e.blocking.map(|id| id.0),
                    }
                }));
            }
            RecordedEvent::IntervalEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": "Interval",
                    "cat": "Tick",
                    "ts": ticks_to_us(cursor, timebase),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "sequence_number": e.sequence_number,
                        "did_draw": e.did_draw,
                        "forced": e.forced,
                    }
                }));
            }
            RecordedEvent::Swap(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("Swap{:?}", e.phase),
                    "cat": "Swap",
                    "ts": ticks_to_us(cursor, timebase),
                    "pid": 0,
                    "tid": 1,
                    "s": "t",
                    "args": {
                        "swap_id": e.swap_id,
                    }
                }));
                events.push(json!({
                    "ph": "C",
                    "name": "PendingSwaps",
                    "ts": ticks_to_us(cursor, timebase),
                    "pid": 0,
                    "args": {
                        "count": e.pending_swap_count,
                    }
                }));
            }
            RecordedEvent::Backpressure { busy } => {
                events.push(json!({
                    "ph": "i",
                    "name": "Backpressure",
                    "cat": "Swap",
                    "ts": ticks_to_us(cursor, timebase),
                    "pid": 0,
                    "tid": 1,
                    "s": "p",
                    "args": {
                        "busy": busy,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn ticks_to_us(t: HostTime, timebase: Timebase) -> f64 {
    timebase.ticks_to_nanos(t.ticks()) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use confluence_core::deadline::DeadlineReason;
    use confluence_core::tick::{TickKind, TickSourceId};
    use confluence_core::trace::{
        DeadlineEvent, IntervalEndEvent, SwapEvent, SwapPhase, TickEvent, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_tick(&TickEvent {
            source_id: TickSourceId(1),
            sequence_number: 1,
            frame_time: HostTime(1_000_000),
            deadline: HostTime(1_011_000),
            kind: TickKind::Normal,
            deferred: false,
        });
        rec.on_deadline(&DeadlineEvent {
            sequence_number: 1,
            mode: DeadlineMode::Regular,
            reason: DeadlineReason::MoreDamageExpected,
            time: HostTime(1_011_000),
            rearmed: true,
        });
        rec.on_interval_end(&IntervalEndEvent {
            source_id: TickSourceId(1),
            sequence_number: 1,
            did_draw: true,
            forced: false,
        });
        rec.on_swap(&SwapEvent {
            swap_id: 1,
            phase: SwapPhase::Submitted,
            pending_swap_count: 1,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), Timebase::NANOS, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 5);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "Interval");
        assert_eq!(parsed[0]["ts"], 1000.0);

        assert_eq!(parsed[1]["name"], "Deadline");
        assert_eq!(parsed[1]["args"]["reason"], "More damage expected soon");

        // The interval closes at the deadline, the latest known time.
        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["ts"], 1011.0);

        assert_eq!(parsed[3]["name"], "SwapSubmitted");
        assert_eq!(parsed[4]["ph"], "C");
        assert_eq!(parsed[4]["args"]["count"], 1);
    }

    #[test]
    fn untimed_deadlines_do_not_move_time() {
        let mut rec = RecorderSink::new();
        rec.on_tick(&TickEvent {
            source_id: TickSourceId(1),
            sequence_number: 1,
            frame_time: HostTime(5_000),
            deadline: HostTime(9_000),
            kind: TickKind::Normal,
            deferred: false,
        });
        rec.on_deadline(&DeadlineEvent {
            sequence_number: 1,
            mode: DeadlineMode::None,
            reason: DeadlineReason::MoreDamageExpected,
            time: HostTime::NEVER,
            rearmed: true,
        });
        rec.on_deadline(&DeadlineEvent {
            sequence_number: 1,
            mode: DeadlineMode::Immediate,
            reason: DeadlineReason::AllSurfacesReady,
            time: HostTime::ZERO,
            rearmed: true,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), Timebase::NANOS, &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[1]["ts"], 5.0);
        assert_eq!(parsed[2]["ts"], 5.0);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], Timebase::NANOS, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
