#![no_main]

use std::{collections::VecDeque, sync::Arc, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serialbuf::{BufferHandler, BufferOptions, EventQueue, mock::ScriptedSource};

#[derive(Debug, Arbitrary)]
enum Op {
    Push(Vec<u8>),
    ChunkLimit(Option<u8>),
    Fill,
    Dispatch,
    Read(u8),
    Peek(u8),
    SeekByte(u8),
    SeekSequence(Vec<u8>),
    Flush,
}

#[derive(Debug, Arbitrary)]
struct Input {
    capacity: u8,
    ops: Vec<Op>,
}

/// Reference model: the unread bytes and whatever the source still holds.
struct Model {
    capacity: usize,
    staged: VecDeque<u8>,
    pending: VecDeque<u8>,
    chunk_limit: Option<usize>,
}

impl Model {
    fn fill(&mut self) -> bool {
        if self.staged.len() == self.capacity {
            self.staged.clear();
        }
        if self.pending.is_empty() {
            return false;
        }
        let mut n = (self.capacity - self.staged.len()).min(self.pending.len());
        if let Some(limit) = self.chunk_limit {
            n = n.min(limit);
        }
        if n == 0 {
            return false;
        }
        self.staged.extend(self.pending.drain(..n));
        true
    }

    fn skip(&mut self, offset: Option<usize>) {
        let n = offset.unwrap_or(self.staged.len());
        self.staged.drain(..n);
    }
}

fn run(input: Input) {
    let capacity = usize::from(input.capacity.max(1));
    let uart = Arc::new(ScriptedSource::new());
    let queue = EventQueue::new();
    let Ok(rx) = BufferHandler::new(
        Arc::clone(&uart),
        queue.clone(),
        BufferOptions {
            capacity,
            timeout: Duration::ZERO,
        },
    ) else {
        return;
    };
    let mut model = Model {
        capacity,
        staged: VecDeque::new(),
        pending: VecDeque::new(),
        chunk_limit: None,
    };

    for op in input.ops {
        match op {
            Op::Push(bytes) => {
                uart.push(&bytes);
                model.pending.extend(bytes);
            }
            Op::ChunkLimit(limit) => {
                // A zero-byte FIFO would make the source readable but never drained.
                let limit = limit.map(|n| usize::from(n.max(1)));
                uart.set_chunk_limit(limit);
                model.chunk_limit = limit;
            }
            Op::Fill => {
                assert_eq!(rx.fill_once(false), model.fill());
            }
            Op::Dispatch => {
                if rx.pending_refill().is_some() {
                    while model.fill() {}
                }
                queue.dispatch_pending();
            }
            Op::Read(n) => {
                let mut dest = vec![0u8; usize::from(n)];
                let take = dest.len().min(model.staged.len());
                let expected: Vec<u8> = model.staged.drain(..take).collect();
                let copied = rx.read_bytes(&mut dest);
                assert_eq!(&dest[..copied], expected.as_slice());
            }
            Op::Peek(index) => {
                let index = usize::from(index);
                match model.staged.get(index) {
                    Some(&byte) => assert_eq!(rx.peek_byte(index), Ok(byte)),
                    None => assert!(rx.peek_byte(index).is_err()),
                }
            }
            Op::SeekByte(target) => {
                let offset = model.staged.iter().position(|&b| b == target);
                model.skip(offset);
                assert_eq!(rx.seek_to_byte(target), model.staged.len());
            }
            Op::SeekSequence(pattern) => {
                if !pattern.is_empty() {
                    let staged = model.staged.make_contiguous();
                    let offset = staged.windows(pattern.len()).position(|w| w == pattern);
                    model.skip(offset);
                }
                assert_eq!(rx.seek_to_sequence(&pattern), model.staged.len());
            }
            Op::Flush => {
                rx.flush();
                model.staged.clear();
                model.pending.clear();
            }
        }

        let (read_cursor, filled_len) = rx.store_layout();
        assert!(read_cursor <= filled_len && filled_len <= capacity);
        assert_eq!(rx.available_bytes(), model.staged.len());
        assert_eq!(uart.pending_len(), model.pending.len());
        assert_eq!(
            rx.with_unread(<[u8]>::to_vec),
            model.staged.iter().copied().collect::<Vec<_>>()
        );
    }
}

fuzz_target!(|input: Input| run(input));
