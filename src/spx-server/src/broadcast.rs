// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Broadcast fan-out with per-client queues.
//!
//! One task consumes the pipeline's outbound queue and replicates each frame
//! into every client's queue under that frame class's drop policy:
//!
//! * live spectrum frames: drop-latest, a new frame replaces the queued one,
//!   so a stalled client resumes at the present instead of replaying a backlog
//! * sweep segments and panoramas: lossless, each carries unique frequency
//!   content; a client whose backlog would overflow is disconnected instead
//!   of receiving a gapped panorama
//! * text frames: lossless up to a small cap, overflow disconnects
//!
//! Per-client queues keep one slow socket from stalling the pipeline or any
//! other client.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

/// Frame classes accepted by the fan-out.
#[derive(Debug, Clone)]
pub enum Outbound {
    Live(Bytes),
    Sweep(Bytes),
    Text(String),
}

/// Frame handed to a client writer.
#[derive(Debug, Clone)]
pub enum OutFrame {
    Binary(Bytes),
    Text(String),
}

pub struct ClientQueue {
    /// Single pending live frame; replaced on push.
    live: Mutex<Option<Bytes>>,
    sweep: Mutex<VecDeque<Bytes>>,
    text: Mutex<VecDeque<String>>,
    notify: Notify,
    closed: AtomicBool,
    sweep_cap: usize,
    text_cap: usize,
}

impl ClientQueue {
    fn new(sweep_cap: usize, text_cap: usize) -> Self {
        Self {
            live: Mutex::new(None),
            sweep: Mutex::new(VecDeque::new()),
            text: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            sweep_cap: sweep_cap.max(1),
            text_cap: text_cap.max(1),
        }
    }

    pub fn push_live(&self, frame: Bytes) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        *self.live.lock().expect("live queue poisoned") = Some(frame);
        self.notify.notify_one();
    }

    /// Lossless push; `Err` means the client is too slow and must go.
    pub fn push_sweep(&self, frame: Bytes) -> Result<(), ()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut queue = self.sweep.lock().expect("sweep queue poisoned");
        if queue.len() >= self.sweep_cap {
            return Err(());
        }
        queue.push_back(frame);
        drop(queue);
        self.notify.notify_one();
        Ok(())
    }

    pub fn push_text(&self, frame: String) -> Result<(), ()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut queue = self.text.lock().expect("text queue poisoned");
        if queue.len() >= self.text_cap {
            return Err(());
        }
        queue.push_back(frame);
        drop(queue);
        self.notify.notify_one();
        Ok(())
    }

    /// Mark the client dead and wake its writer so it exits.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn try_next(&self) -> Option<OutFrame> {
        // Text first (status ordering), then lossless sweep data, then the
        // latest live frame.
        if let Some(t) = self.text.lock().expect("text queue poisoned").pop_front() {
            return Some(OutFrame::Text(t));
        }
        if let Some(b) = self.sweep.lock().expect("sweep queue poisoned").pop_front() {
            return Some(OutFrame::Binary(b));
        }
        if let Some(b) = self.live.lock().expect("live queue poisoned").take() {
            return Some(OutFrame::Binary(b));
        }
        None
    }

    /// Next frame for this client's writer; `None` once the client is closed.
    pub async fn next(&self) -> Option<OutFrame> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            let notified = self.notify.notified();
            if let Some(frame) = self.try_next() {
                return Some(frame);
            }
            notified.await;
        }
    }
}

/// Registry of connected clients, shared by the listener and the fan-out.
pub struct ClientRegistry {
    clients: Mutex<HashMap<u64, Arc<ClientQueue>>>,
    next_id: AtomicU64,
    sweep_cap: usize,
    text_cap: usize,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(sweep_cap: usize, text_cap: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sweep_cap,
            text_cap,
        }
    }

    pub fn add(&self) -> (u64, Arc<ClientQueue>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(ClientQueue::new(self.sweep_cap, self.text_cap));
        self.clients
            .lock()
            .expect("client registry poisoned")
            .insert(id, Arc::clone(&queue));
        (id, queue)
    }

    pub fn remove(&self, id: u64) {
        if let Some(queue) = self
            .clients
            .lock()
            .expect("client registry poisoned")
            .remove(&id)
        {
            queue.close();
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.clients.lock().expect("client registry poisoned").len()
    }

    fn snapshot(&self) -> Vec<(u64, Arc<ClientQueue>)> {
        self.clients
            .lock()
            .expect("client registry poisoned")
            .iter()
            .map(|(&id, q)| (id, Arc::clone(q)))
            .collect()
    }
}

/// Fan-out task: replicate each outbound frame to every client queue.
pub async fn run_broadcast(mut rx: UnboundedReceiver<Outbound>, registry: Arc<ClientRegistry>) {
    tracing::info!("broadcast fan-out started");
    while let Some(frame) = rx.recv().await {
        let clients = registry.snapshot();
        let mut slow: Vec<u64> = Vec::new();
        match frame {
            Outbound::Live(bytes) => {
                for (_, queue) in &clients {
                    queue.push_live(bytes.clone());
                }
            }
            Outbound::Sweep(bytes) => {
                for (id, queue) in &clients {
                    if queue.push_sweep(bytes.clone()).is_err() {
                        slow.push(*id);
                    }
                }
            }
            Outbound::Text(text) => {
                for (id, queue) in &clients {
                    if queue.push_text(text.clone()).is_err() {
                        slow.push(*id);
                    }
                }
            }
        }
        for id in slow {
            tracing::warn!("disconnecting slow client {}", id);
            registry.remove(id);
        }
    }
    tracing::info!("broadcast fan-out exited");
}
