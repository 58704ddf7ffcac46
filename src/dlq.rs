//! Receive dispatch queue (C7): a mutex+condvar FIFO fed by every receive
//! thread and drained by a single consumer thread (spec.md §4.7). Replaces
//! the original's intrusive linked list with an owning `VecDeque`
//! (Design Notes §9): the queue owns every item from `enqueue` to
//! `dequeue`, so there is no separate "next pointer" field to manage.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::ax25::Ax25Packet;

/// Length past which [`Dlq::enqueue`] logs a warning: the only backpressure
/// signal spec.md §4.7 defines ("indicates downstream consumer is
/// stalled").
pub const STALL_WARNING_LEN: usize = 10;

/// Per-receive-path provenance for a [`DlqItemKind::ReceivedFrame`],
/// carried alongside the packet so the consumer/logging can tell which
/// demodulator and FEC path produced it (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOrigin {
    pub channel: usize,
    pub subchannel: usize,
    pub slicer: usize,
    pub fec: FecKind,
    pub corrections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FecKind {
    None,
    Fx25,
    Il2p,
}

/// One entry in the queue. Ownership of any contained packet/buffer moves
/// into the item on construction and out again when the consumer destructures
/// it (spec.md §3 "DLQ item").
#[derive(Debug)]
pub enum DlqItemKind {
    ReceivedFrame { packet: Ax25Packet, origin: FrameOrigin },
    ConnectRequest { client_id: u32 },
    DisconnectRequest { client_id: u32 },
    XmitDataRequest { client_id: u32, data: Vec<u8> },
    RegisterCallsign { client_id: u32, callsign: String },
    UnregisterCallsign { client_id: u32 },
    ChannelBusy { busy: bool },
    SeizeConfirm,
    OutstandingFramesRequest { client_id: u32 },
    ClientCleanup { client_id: u32 },
}

/// Common envelope fields plus the kind-specific payload (spec.md §3).
#[derive(Debug)]
pub struct DlqItem {
    pub channel: usize,
    /// Addresses relevant to this event (source/destination/digis), at
    /// most 10 per spec.md §3.
    pub addrs: Vec<String>,
    pub client_id: Option<u32>,
    pub kind: DlqItemKind,
}

impl DlqItem {
    pub fn new(channel: usize, kind: DlqItemKind) -> Self {
        DlqItem { channel, addrs: Vec::new(), client_id: None, kind }
    }

    pub fn with_addrs(mut self, addrs: Vec<String>) -> Self {
        self.addrs = addrs;
        self
    }

    pub fn with_client(mut self, client_id: u32) -> Self {
        self.client_id = Some(client_id);
        self
    }
}

struct Inner {
    queue: VecDeque<DlqItem>,
    shut_down: bool,
}

/// Multi-producer / single-consumer event queue (spec.md §4.7). Safe under
/// concurrent producers from N receive threads and one consumer (spec.md §5).
pub struct Dlq {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl Default for Dlq {
    fn default() -> Self {
        Self::new()
    }
}

impl Dlq {
    pub fn new() -> Self {
        Dlq { inner: Mutex::new(Inner { queue: VecDeque::new(), shut_down: false }), not_empty: Condvar::new() }
    }

    /// Append `item` and, on an empty-to-nonempty transition, wake one
    /// waiter. Logs a warning if the queue is already longer than
    /// [`STALL_WARNING_LEN`] (spec.md §4.7).
    pub fn enqueue(&self, item: DlqItem) {
        let mut inner = self.inner.lock().unwrap();
        let was_empty = inner.queue.is_empty();
        inner.queue.push_back(item);
        let len = inner.queue.len();
        if len > STALL_WARNING_LEN {
            log::warn!("DLQ length {len} exceeds {STALL_WARNING_LEN}: consumer may be stalled");
        }
        if was_empty {
            self.not_empty.notify_one();
        }
    }

    /// Pop the head item, if any, without blocking.
    pub fn dequeue(&self) -> Option<DlqItem> {
        self.inner.lock().unwrap().queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until the queue is non-empty, `deadline` elapses, or the queue
    /// is shut down. `deadline = None` waits indefinitely (spec.md §4.7: "0
    /// ⇒ infinite"); the absolute-time parameter from the original design is
    /// expressed here as a `Duration` relative to the call, which the
    /// consumer recomputes each wakeup from its own earliest pending timer
    /// (spec.md §5 "Timer discipline").
    pub fn wait_while_empty(&self, deadline: Option<Duration>) {
        let mut inner = self.inner.lock().unwrap();
        let start = Instant::now();
        while inner.queue.is_empty() && !inner.shut_down {
            match deadline {
                None => inner = self.not_empty.wait(inner).unwrap(),
                Some(d) => {
                    let elapsed = start.elapsed();
                    if elapsed >= d {
                        return;
                    }
                    let (guard, timeout) = self.not_empty.wait_timeout(inner, d - elapsed).unwrap();
                    inner = guard;
                    if timeout.timed_out() {
                        return;
                    }
                }
            }
        }
    }

    /// Wake every waiter and mark the queue shut down; used at teardown
    /// (spec.md §5 "Cancellation and shutdown") so `wait_while_empty` never
    /// blocks the consumer past process exit.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.shut_down = true;
        self.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_per_producer() {
        let dlq = Dlq::new();
        dlq.enqueue(DlqItem::new(0, DlqItemKind::ChannelBusy { busy: true }));
        dlq.enqueue(DlqItem::new(0, DlqItemKind::ChannelBusy { busy: false }));
        let first = dlq.dequeue().unwrap();
        let second = dlq.dequeue().unwrap();
        assert!(matches!(first.kind, DlqItemKind::ChannelBusy { busy: true }));
        assert!(matches!(second.kind, DlqItemKind::ChannelBusy { busy: false }));
    }

    #[test]
    fn wait_while_empty_wakes_on_enqueue() {
        let dlq = Arc::new(Dlq::new());
        let dlq2 = Arc::clone(&dlq);
        let handle = thread::spawn(move || {
            dlq2.wait_while_empty(Some(Duration::from_secs(2)));
            dlq2.dequeue()
        });
        thread::sleep(Duration::from_millis(20));
        dlq.enqueue(DlqItem::new(1, DlqItemKind::SeizeConfirm));
        let item = handle.join().unwrap();
        assert!(item.is_some());
    }

    #[test]
    fn wait_while_empty_respects_deadline() {
        let dlq = Dlq::new();
        let start = Instant::now();
        dlq.wait_while_empty(Some(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn shutdown_releases_waiters_without_an_item() {
        let dlq = Arc::new(Dlq::new());
        let dlq2 = Arc::clone(&dlq);
        let handle = thread::spawn(move || {
            dlq2.wait_while_empty(None);
            dlq2.is_empty()
        });
        thread::sleep(Duration::from_millis(20));
        dlq.shutdown();
        assert!(handle.join().unwrap());
    }
}
