// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bounded sample bridge between the capture thread and the DSP worker.
//!
//! Single producer, single consumer. Overflow drops the **oldest** queued
//! block so the consumer stays close to real time; the dropped count is
//! tracked for status reporting. A poison marker wakes a blocked consumer
//! immediately so shutdown never waits out the read timeout.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use num_complex::Complex32;

/// A contiguous run of IQ samples tagged with the tuning in force at capture.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    pub samples: Vec<Complex32>,
    pub center_freq: f64,
    pub sample_rate: f64,
}

/// Result of a timed read from the bridge.
#[derive(Debug)]
pub enum BridgeItem {
    Block(SampleBlock),
    Poison,
    TimedOut,
}

#[derive(Debug)]
enum Slot {
    Block(SampleBlock),
    Poison,
}

#[derive(Debug)]
struct Inner {
    queue: VecDeque<Slot>,
    dropped: u64,
}

#[derive(Debug)]
pub struct SampleBridge {
    inner: Mutex<Inner>,
    available: Condvar,
    capacity: usize,
}

impl SampleBridge {
    /// Create a bridge holding at most `capacity` blocks.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity.max(1)),
                dropped: 0,
            }),
            available: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Capacity in blocks for roughly `millis` of audio at `sample_rate`,
    /// given `block_size` samples per block.
    #[must_use]
    pub fn capacity_for(sample_rate: f64, block_size: usize, millis: u64) -> usize {
        if block_size == 0 || sample_rate <= 0.0 {
            return 1;
        }
        let blocks = (sample_rate * millis as f64 / 1000.0 / block_size as f64).ceil() as usize;
        blocks.max(1)
    }

    /// Push a block; drops the oldest queued block when full.
    pub fn push(&self, block: SampleBlock) {
        let mut inner = self.inner.lock().expect("sample bridge mutex poisoned");
        if inner.queue.len() >= self.capacity {
            // Never displace a poison marker; drop the oldest real block.
            let oldest_real = inner
                .queue
                .iter()
                .position(|s| matches!(s, Slot::Block(_)));
            if let Some(idx) = oldest_real {
                inner.queue.remove(idx);
                inner.dropped += 1;
            }
        }
        inner.queue.push_back(Slot::Block(block));
        drop(inner);
        self.available.notify_one();
    }

    /// Inject the poison marker ahead of all queued data. The consumer's next
    /// read returns [`BridgeItem::Poison`] without waiting out its timeout.
    pub fn push_poison(&self) {
        let mut inner = self.inner.lock().expect("sample bridge mutex poisoned");
        inner.queue.push_front(Slot::Poison);
        drop(inner);
        self.available.notify_all();
    }

    /// Blocking read with timeout.
    pub fn pop_timeout(&self, timeout: Duration) -> BridgeItem {
        let mut inner = self.inner.lock().expect("sample bridge mutex poisoned");
        loop {
            match inner.queue.pop_front() {
                Some(Slot::Block(b)) => return BridgeItem::Block(b),
                Some(Slot::Poison) => return BridgeItem::Poison,
                None => {}
            }
            let (guard, res) = self
                .available
                .wait_timeout(inner, timeout)
                .expect("sample bridge mutex poisoned");
            inner = guard;
            if res.timed_out() {
                // One last check: notify may have raced the timeout.
                return match inner.queue.pop_front() {
                    Some(Slot::Block(b)) => BridgeItem::Block(b),
                    Some(Slot::Poison) => BridgeItem::Poison,
                    None => BridgeItem::TimedOut,
                };
            }
        }
    }

    /// Non-blocking read.
    pub fn try_pop(&self) -> Option<BridgeItem> {
        let mut inner = self.inner.lock().expect("sample bridge mutex poisoned");
        match inner.queue.pop_front() {
            Some(Slot::Block(b)) => Some(BridgeItem::Block(b)),
            Some(Slot::Poison) => Some(BridgeItem::Poison),
            None => None,
        }
    }

    /// Total blocks dropped to the overflow policy since creation.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.inner
            .lock()
            .expect("sample bridge mutex poisoned")
            .dropped
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("sample bridge mutex poisoned")
            .queue
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard all queued blocks (poison markers included).
    pub fn clear(&self) {
        self.inner
            .lock()
            .expect("sample bridge mutex poisoned")
            .queue
            .clear();
    }
}
