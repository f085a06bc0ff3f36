// Copyright 2026 the Confluence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Records a short scheduler run and exports it.

use std::cell::RefCell;
use std::rc::Rc;

use confluence_core::client::{DrawClient, TickSource};
use confluence_core::scheduler::{FrameScheduler, SchedulerConfig};
use confluence_core::surface::SurfaceId;
use confluence_core::tick::{Acknowledgment, Tick, TickKind, TickSourceId};
use confluence_core::time::{Duration, HostTime, Timebase};
use confluence_core::trace::{
    DeadlineEvent, IntervalEndEvent, PendingSurfacesEvent, SwapEvent, TickEvent, TraceSink,
};
use confluence_debug::chrome;
use confluence_debug::recorder::{RecordedEvent, RecorderSink, decode};
use serde_json::Value;

struct Source;

impl TickSource for Source {
    fn subscribe(&mut self) -> Option<Tick> {
        None
    }
    fn unsubscribe(&mut self) {}
    fn set_backpressure(&mut self, _busy: bool) {}
    fn notify_interval_ended(&mut self) {}
}

struct Client;

impl DrawClient for Client {
    fn draw_and_present(&mut self) -> bool {
        true
    }
    fn notify_surface_damaged(&mut self, _surface: SurfaceId, _ack: &Acknowledgment) -> bool {
        true
    }
    fn notify_surface_destroyed(&mut self, _surface: SurfaceId) {}
    fn surface_has_unacknowledged_frame(&self, _surface: SurfaceId) -> bool {
        false
    }
}

/// Lets the test read the recording while the scheduler owns the sink.
struct Shared(Rc<RefCell<RecorderSink>>);

impl TraceSink for Shared {
    fn on_tick(&mut self, e: &TickEvent) {
        self.0.borrow_mut().on_tick(e);
    }
    fn on_deadline(&mut self, e: &DeadlineEvent) {
        self.0.borrow_mut().on_deadline(e);
    }
    fn on_pending_surfaces(&mut self, e: &PendingSurfacesEvent) {
        self.0.borrow_mut().on_pending_surfaces(e);
    }
    fn on_interval_end(&mut self, e: &IntervalEndEvent) {
        self.0.borrow_mut().on_interval_end(e);
    }
    fn on_swap(&mut self, e: &SwapEvent) {
        self.0.borrow_mut().on_swap(e);
    }
    fn on_backpressure(&mut self, busy: bool) {
        self.0.borrow_mut().on_backpressure(busy);
    }
}

fn tick(seq: u64) -> Tick {
    let frame = seq * 16_000;
    Tick {
        source_id: TickSourceId(1),
        sequence_number: seq,
        frame_time: HostTime(frame),
        interval: Duration(16_000),
        deadline: HostTime(frame + 14_000),
        kind: TickKind::Normal,
    }
}

#[test]
fn scheduler_run_records_and_exports() {
    let recorder = Rc::new(RefCell::new(RecorderSink::new()));
    let mut scheduler =
        FrameScheduler::new(SchedulerConfig::low_latency(), Source, Client).unwrap();
    scheduler.set_trace_sink(Some(Box::new(Shared(recorder.clone()))));

    scheduler.set_visible(true);
    scheduler.set_root_content_missing(false);
    scheduler.set_new_root_surface(SurfaceId(1));
    scheduler.on_tick(tick(1));
    scheduler.poll(HostTime(16_000));
    scheduler.did_swap_buffers();
    scheduler.did_receive_swap_ack();
    drop(scheduler);

    let bytes = recorder.borrow().as_bytes().to_vec();
    let events: Vec<_> = decode(&bytes).collect();
    assert!(matches!(events[0], RecordedEvent::Tick(e) if e.sequence_number == 1));
    assert!(events.iter().any(
        |e| matches!(e, RecordedEvent::IntervalEnd(end) if end.did_draw && !end.forced)
    ));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, RecordedEvent::Backpressure { busy: true }))
            .count(),
        1
    );

    let mut out = Vec::new();
    chrome::export(&bytes, Timebase::NANOS, &mut out).unwrap();
    let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
    let begins = parsed.iter().filter(|e| e["ph"] == "B").count();
    let ends = parsed.iter().filter(|e| e["ph"] == "E").count();
    assert_eq!(begins, 1);
    assert_eq!(begins, ends);
}
