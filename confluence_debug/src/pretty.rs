// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].

use std::io::Write;

use confluence_core::deadline::DeadlineMode;
use confluence_core::time::{HostTime, Timebase};
use confluence_core::trace::{
    DeadlineEvent, IntervalEndEvent, PendingSurfacesEvent, SwapEvent, SwapPhase, TickEvent,
    TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn host_us(&self, t: HostTime) -> f64 {
        self.timebase.ticks_to_nanos(t.ticks()) as f64 / 1000.0
    }
}

fn mode_name(mode: DeadlineMode) -> &'static str {
    match mode {
        DeadlineMode::Immediate => "immediate",
        DeadlineMode::Regular => "regular",
        DeadlineMode::Late => "late",
        DeadlineMode::None => "none",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_tick(&mut self, e: &TickEvent) {
        let deferred = if e.deferred { " (deferred)" } else { "" };
        let _ = writeln!(
            self.writer,
            "[tick] source={} seq={} frame={:.1}µs deadline={:.1}µs kind={:?}{deferred}",
            e.source_id.0,
            e.sequence_number,
            self.host_us(e.frame_time),
            self.host_us(e.deadline),
            e.kind,
        );
    }

    fn on_deadline(&mut self, e: &DeadlineEvent) {
        // Immediate deadlines carry the always-due sentinel, not a time.
        if e.time.is_never() || matches!(e.mode, DeadlineMode::Immediate) {
            let _ = writeln!(
                self.writer,
                "[deadline] seq={} {} ({})",
                e.sequence_number,
                mode_name(e.mode),
                e.reason.as_str(),
            );
            return;
        }
        let _ = writeln!(
            self.writer,
            "[deadline] seq={} {} at {:.1}µs ({})",
            e.sequence_number,
            mode_name(e.mode),
            self.host_us(e.time),
            e.reason.as_str(),
        );
    }

    fn on_pending_surfaces(&mut self, e: &PendingSurfacesEvent) {
        match e.blocking {
            Some(surface) => {
                let _ = writeln!(
                    self.writer,
                    "[pending] seq={} waiting on {surface:?}",
                    e.sequence_number,
                );
            }
            None => {
                let _ = writeln!(self.writer, "[pending] seq={} ready", e.sequence_number);
            }
        }
    }

    fn on_interval_end(&mut self, e: &IntervalEndEvent) {
        let outcome = if e.did_draw { "drew" } else { "skipped" };
        let forced = if e.forced { " (forced)" } else { "" };
        let _ = writeln!(
            self.writer,
            "[end] seq={} {outcome}{forced}",
            e.sequence_number,
        );
    }

    fn on_swap(&mut self, e: &SwapEvent) {
        let phase = match e.phase {
            SwapPhase::Submitted => "submit",
            SwapPhase::Completed => "ack",
        };
        let _ = writeln!(
            self.writer,
            "[swap:{phase}] id={} pending={}",
            e.swap_id, e.pending_swap_count,
        );
    }

    fn on_backpressure(&mut self, busy: bool) {
        let state = if busy { "on" } else { "off" };
        let _ = writeln!(self.writer, "[backpressure] {state}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_core::deadline::DeadlineReason;
    use confluence_core::surface::SurfaceId;
    use confluence_core::tick::{TickKind, TickSourceId};

    fn output(sink: PrettyPrintSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_writer()).unwrap()
    }

    #[test]
    fn pretty_print_tick() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        sink.on_tick(&TickEvent {
            source_id: TickSourceId(1),
            sequence_number: 4,
            frame_time: HostTime(1_000_000),
            deadline: HostTime(1_011_000),
            kind: TickKind::Missed,
            deferred: true,
        });
        let output = output(sink);
        assert!(output.contains("[tick]"), "got: {output}");
        assert!(output.contains("seq=4"), "got: {output}");
        assert!(output.contains("1000.0µs"), "got: {output}");
        assert!(output.contains("(deferred)"), "got: {output}");
    }

    #[test]
    fn deadline_line_names_the_reason() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        sink.on_deadline(&DeadlineEvent {
            sequence_number: 2,
            mode: DeadlineMode::Late,
            reason: DeadlineReason::SwapThrottled,
            time: HostTime(2_000),
            rearmed: true,
        });
        sink.on_deadline(&DeadlineEvent {
            sequence_number: 2,
            mode: DeadlineMode::None,
            reason: DeadlineReason::MoreDamageExpected,
            time: HostTime::NEVER,
            rearmed: true,
        });
        sink.on_deadline(&DeadlineEvent {
            sequence_number: 3,
            mode: DeadlineMode::Immediate,
            reason: DeadlineReason::AllSurfacesReady,
            time: HostTime::ZERO,
            rearmed: true,
        });
        let output = output(sink);
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines[0], "[deadline] seq=2 late at 2.0µs (Swap throttled)");
        assert_eq!(lines[1], "[deadline] seq=2 none (More damage expected soon)");
        assert_eq!(lines[2], "[deadline] seq=3 immediate (All active surfaces ready)");
    }

    #[test]
    fn pending_and_interval_end_lines() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new(), Timebase::NANOS);
        sink.on_pending_surfaces(&PendingSurfacesEvent {
            sequence_number: 3,
            has_pending: true,
            blocking: Some(SurfaceId(5)),
        });
        sink.on_interval_end(&IntervalEndEvent {
            source_id: TickSourceId(1),
            sequence_number: 3,
            did_draw: false,
            forced: true,
        });
        sink.on_backpressure(true);
        let output = output(sink);
        let lines: Vec<_> = output.lines().collect();
        assert!(lines[0].starts_with("[pending] seq=3 waiting on"), "got: {output}");
        assert_eq!(lines[1], "[end] seq=3 skipped (forced)");
        assert_eq!(lines[2], "[backpressure] on");
    }
}
