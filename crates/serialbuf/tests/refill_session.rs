#![allow(missing_docs)]

use std::{
    mem,
    sync::{Arc, Mutex},
    time::Duration,
};

use insta::assert_snapshot;
use serialbuf::{
    BufferHandler, BufferOptions, EventQueue,
    mock::{ManualClock, ScriptedSource},
};

mod common;

type Rx = BufferHandler<Arc<ScriptedSource>, EventQueue, Arc<ManualClock>>;

struct Session {
    clock: Arc<ManualClock>,
    uart: Arc<ScriptedSource>,
    queue: EventQueue,
    rx: Arc<Rx>,
    frames: Arc<Mutex<Vec<String>>>,
}

fn session(capacity: usize) -> Session {
    common::init_test_logging();
    let clock = Arc::new(ManualClock::new());
    let uart = Arc::new(ScriptedSource::with_clock(Arc::clone(&clock)));
    let queue = EventQueue::new();
    let rx = Arc::new(
        BufferHandler::with_clock(
            Arc::clone(&uart),
            queue.clone(),
            Arc::clone(&clock),
            BufferOptions {
                capacity,
                timeout: Duration::from_millis(10),
            },
        )
        .expect("valid options"),
    );

    // The handler owns its completion callback; a strong reference back to
    // the handler would keep it alive forever.
    let frames = Arc::new(Mutex::new(Vec::new()));
    let weak = Arc::downgrade(&rx);
    let sink = Arc::clone(&frames);
    rx.attach(
        move || {
            if let Some(rx) = weak.upgrade() {
                let drained = common::drain_frames(&rx, b"\r\n");
                sink.lock().unwrap().extend(drained);
            }
        },
        Duration::from_millis(10),
    );

    Session {
        clock,
        uart,
        queue,
        rx,
        frames,
    }
}

impl Session {
    fn step(&self, label: &str) -> String {
        let passes = self.queue.dispatch_pending();
        let frames = mem::take(&mut *self.frames.lock().unwrap());
        let staged = self.rx.with_unread(<[u8]>::to_vec);
        format!(
            "{label} -> passes={passes} frames={frames:?} staged={:?} clock={:?}",
            String::from_utf8_lossy(&staged),
            self.clock.elapsed(),
        )
    }

    fn push(&self, chunk: &[u8]) -> String {
        self.uart.push(chunk);
        self.step(&format!("push {:?}", String::from_utf8_lossy(chunk)))
    }
}

#[test]
fn line_frames_across_refill_passes() {
    let s = session(64);
    let transcript = [
        s.push(b"AT\r\nO"),
        s.push(b"K\r\n+CSQ: 9"),
        s.push(b",99\r\n"),
        {
            s.rx.signal_readiness();
            s.step("idle signal")
        },
    ]
    .join("\n");

    assert_snapshot!(transcript, @r#"
    push "AT\r\nO" -> passes=1 frames=["AT"] staged="O" clock=10ms
    push "K\r\n+CSQ: 9" -> passes=1 frames=["OK"] staged="+CSQ: 9" clock=20ms
    push ",99\r\n" -> passes=1 frames=["+CSQ: 9,99"] staged="" clock=30ms
    idle signal -> passes=1 frames=[] staged="" clock=30ms
    "#);
}

#[test]
fn burst_of_signals_runs_one_pass() {
    let s = session(64);
    s.uart.push_quiet(b"PING\r\n");
    for _ in 0..16 {
        s.rx.signal_readiness();
    }
    assert_eq!(s.queue.len(), 1);
    assert_eq!(s.queue.dispatch_pending(), 1);
    assert_eq!(*s.frames.lock().unwrap(), vec!["PING".to_owned()]);
    assert!(s.queue.is_empty());
}

#[test]
fn mid_frame_byte_restarts_inactivity_window() {
    let s = session(64);
    s.uart.push_quiet(b"$GP");
    assert!(s.rx.fill_once(true));

    s.clock.advance(Duration::from_millis(8));
    assert_eq!(s.rx.poll_timeout(true), Duration::from_millis(2));

    s.uart.push_quiet(b"GGA");
    assert!(s.rx.fill_once(true));
    assert_eq!(s.rx.poll_timeout(true), Duration::from_millis(10));

    // Nothing more arrives: the next attempt waits out the window, no longer.
    assert!(!s.rx.fill_once(true));
    assert_eq!(s.clock.elapsed(), Duration::from_millis(18));
    assert_eq!(s.uart.poll_log().last(), Some(&Duration::from_millis(10)));
}

#[test]
fn overflow_discards_and_keeps_running() {
    let s = session(8);
    s.uart.set_chunk_limit(Some(4));
    s.uart.push(b"0123456789AB\r\n");
    s.queue.dispatch_pending();

    // 8 bytes staged, then a reset on overflow, then the tail.
    assert_eq!(*s.frames.lock().unwrap(), vec!["89AB".to_owned()]);
    assert_eq!(s.rx.available_bytes(), 0);
}

#[test]
fn flush_drops_pending_input_without_waiting() {
    let s = session(16);
    s.uart.push_quiet(b"garbage garbage garbage");
    s.rx.flush();
    assert_eq!(s.rx.available_bytes(), 0);
    assert_eq!(s.uart.pending_len(), 0);
    assert_eq!(s.clock.elapsed(), Duration::ZERO);
}
