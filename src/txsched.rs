//! Transmit scheduler (C8): per-channel priority queues, p-persistent
//! channel access, and TXDELAY/TXTAIL PTT sequencing (spec.md §4.8). One
//! instance is owned by the transmit thread of a single audio device; the
//! data-link state machine (C9) and applications feed it by enqueueing
//! frames rather than calling it directly (Design Notes §9: break the
//! data-link/scheduler cycle with message passing).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::audio::{AudioDevice, PttTransport};
use crate::dlq::{Dlq, DlqItem, DlqItemKind};

/// Relative priority of a queued frame (spec.md §4.8: "expedited / normal
/// / beacon").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Beacon,
    Normal,
    Expedited,
}

const PRIORITIES: [Priority; 3] = [Priority::Expedited, Priority::Normal, Priority::Beacon];

/// One frame ready for the tone codec: the on-air bit stream (already
/// HDLC/FX.25/IL2P framed) for a specific channel.
#[derive(Debug, Clone)]
pub struct TxFrame {
    pub channel: usize,
    pub bits: Vec<u8>,
}

#[derive(Default)]
struct ChannelQueues {
    expedited: VecDeque<TxFrame>,
    normal: VecDeque<TxFrame>,
    beacon: VecDeque<TxFrame>,
}

impl ChannelQueues {
    fn queue_mut(&mut self, p: Priority) -> &mut VecDeque<TxFrame> {
        match p {
            Priority::Expedited => &mut self.expedited,
            Priority::Normal => &mut self.normal,
            Priority::Beacon => &mut self.beacon,
        }
    }

    fn is_empty(&self) -> bool {
        self.expedited.is_empty() && self.normal.is_empty() && self.beacon.is_empty()
    }
}

/// Channel-access timing parameters (spec.md §4.8).
#[derive(Debug, Clone, Copy)]
pub struct TxParams {
    /// p-persistence parameter, compared against a uniform draw in 0..=255.
    pub persist: u8,
    pub slottime_ms: u32,
    pub txdelay_ms: u32,
    pub txtail_ms: u32,
    /// Maximum number of frames sent back-to-back once the channel is
    /// seized.
    pub max_burst: usize,
}

impl Default for TxParams {
    fn default() -> Self {
        TxParams { persist: 63, slottime_ms: 100, txdelay_ms: 300, txtail_ms: 50, max_burst: 8 }
    }
}

/// Per-channel carrier-sense state, shared between the receive path (which
/// updates it) and the transmit scheduler (which reads it), per spec.md §5
/// ("Shared resources... atomic boolean").
#[derive(Default)]
pub struct DcdBank {
    channels: Vec<AtomicBool>,
}

impl DcdBank {
    pub fn new(n_channels: usize) -> Self {
        DcdBank { channels: (0..n_channels).map(|_| AtomicBool::new(false)).collect() }
    }

    pub fn set(&self, channel: usize, busy: bool) {
        if let Some(c) = self.channels.get(channel) {
            c.store(busy, Ordering::Relaxed);
        }
    }

    pub fn is_busy(&self, channel: usize) -> bool {
        self.channels.get(channel).map(|c| c.load(Ordering::Relaxed)).unwrap_or(false)
    }
}

/// Per-audio-device transmit scheduler: one owns the output queues for
/// every channel that device exposes (spec.md §3: up to 2 channels per
/// device).
pub struct TxScheduler {
    channels: Vec<ChannelQueues>,
    params: TxParams,
    shutdown: Arc<AtomicBool>,
}

impl TxScheduler {
    pub fn new(n_channels: usize, params: TxParams) -> Self {
        TxScheduler {
            channels: (0..n_channels).map(|_| ChannelQueues::default()).collect(),
            params,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn enqueue(&mut self, channel: usize, priority: Priority, frame: TxFrame) {
        if let Some(q) = self.channels.get_mut(channel) {
            q.queue_mut(priority).push_back(frame);
        }
    }

    pub fn queue_len(&self, channel: usize, priority: Priority) -> usize {
        self.channels.get(channel).map(|q| q.queue_mut_ref(priority).len()).unwrap_or(0)
    }

    pub fn has_pending(&self) -> bool {
        self.channels.iter().any(|c| !c.is_empty())
    }

    /// Find the highest-priority non-empty queue across every channel of
    /// this device, scanning expedited first on every channel, then
    /// normal, then beacon (spec.md §4.8: "pick highest-priority non-empty
    /// queue on any channel of this device").
    fn pick_next(&self) -> Option<(usize, Priority)> {
        for &p in &PRIORITIES {
            for (ch, q) in self.channels.iter().enumerate() {
                if !q.queue_mut_ref(p).is_empty() {
                    return Some((ch, p));
                }
            }
        }
        None
    }

    /// Pop up to `max_burst` frames from one channel/priority queue.
    fn drain_burst(&mut self, channel: usize, priority: Priority) -> Vec<TxFrame> {
        let max = self.params.max_burst;
        let q = self.channels[channel].queue_mut(priority);
        let n = q.len().min(max);
        q.drain(..n).collect()
    }

    /// One p-persistence dice roll: transmit only if a uniform draw in
    /// 0..=255 is ≤ `p` (spec.md §4.8).
    pub fn p_persistence_roll(p: u8, roll: u8) -> bool {
        roll <= p
    }

    /// Drive the scheduler forever on the calling thread: one transmit
    /// thread per audio device (spec.md §4.8/§5). Checks DCD/PTT, applies
    /// p-persistence, keys PTT, transmits a burst, then unkeys.
    pub fn run<A: AudioDevice, P: PttTransport>(&mut self, audio: &mut A, ptt: &mut P, dcd: &DcdBank, dlq: &Dlq) {
        let mut rng = rand::thread_rng();
        while !self.shutdown.load(Ordering::Relaxed) {
            let Some((channel, priority)) = self.pick_next() else {
                std::thread::sleep(Duration::from_millis(10));
                continue;
            };
            if dcd.is_busy(channel) {
                std::thread::sleep(Duration::from_millis(self.params.slottime_ms as u64));
                continue;
            }
            let roll: u8 = rng.gen_range(0..=255);
            if !Self::p_persistence_roll(self.params.persist, roll) {
                std::thread::sleep(Duration::from_millis(self.params.slottime_ms as u64));
                continue;
            }

            ptt.key();
            std::thread::sleep(Duration::from_millis(self.params.txdelay_ms as u64));
            let burst = self.drain_burst(channel, priority);
            for frame in &burst {
                let samples: Vec<i16> = frame.bits.iter().map(|&b| if b != 0 { 8000 } else { -8000 }).collect();
                audio.write_frame(&samples);
            }
            std::thread::sleep(Duration::from_millis(self.params.txtail_ms as u64));
            ptt.unkey();

            dlq.enqueue(DlqItem::new(channel, DlqItemKind::SeizeConfirm));
        }
    }
}

impl ChannelQueues {
    fn queue_mut_ref(&self, p: Priority) -> &VecDeque<TxFrame> {
        match p {
            Priority::Expedited => &self.expedited,
            Priority::Normal => &self.normal,
            Priority::Beacon => &self.beacon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullPtt;

    struct NullAudio {
        written: usize,
    }
    impl AudioDevice for NullAudio {
        fn read_frame(&mut self, _out: &mut [i16]) -> Option<usize> {
            None
        }
        fn write_frame(&mut self, samples: &[i16]) {
            self.written += samples.len();
        }
        fn channel_count(&self) -> usize {
            1
        }
        fn sample_rate(&self) -> u32 {
            9600
        }
    }

    #[test]
    fn picks_expedited_over_normal_across_channels() {
        let mut sched = TxScheduler::new(2, TxParams::default());
        sched.enqueue(0, Priority::Normal, TxFrame { channel: 0, bits: vec![1] });
        sched.enqueue(1, Priority::Expedited, TxFrame { channel: 1, bits: vec![1] });
        assert_eq!(sched.pick_next(), Some((1, Priority::Expedited)));
    }

    #[test]
    fn drain_burst_respects_max_burst() {
        let mut sched = TxScheduler::new(1, TxParams { max_burst: 2, ..TxParams::default() });
        for i in 0..5 {
            sched.enqueue(0, Priority::Normal, TxFrame { channel: 0, bits: vec![i] });
        }
        let burst = sched.drain_burst(0, Priority::Normal);
        assert_eq!(burst.len(), 2);
        assert_eq!(sched.queue_len(0, Priority::Normal), 3);
    }

    #[test]
    fn p_persistence_roll_is_threshold_comparison() {
        assert!(TxScheduler::p_persistence_roll(63, 0));
        assert!(TxScheduler::p_persistence_roll(63, 63));
        assert!(!TxScheduler::p_persistence_roll(63, 64));
    }

    #[test]
    fn run_posts_seize_confirm_and_transmits_then_shuts_down() {
        let mut sched = TxScheduler::new(1, TxParams { txdelay_ms: 0, txtail_ms: 0, slottime_ms: 0, persist: 255, ..TxParams::default() });
        sched.enqueue(0, Priority::Normal, TxFrame { channel: 0, bits: vec![1, 0, 1, 0] });
        let dcd = DcdBank::new(1);
        let dlq = Dlq::new();
        let shutdown = sched.shutdown_handle();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            shutdown.store(true, Ordering::Relaxed);
        });
        let mut audio = NullAudio { written: 0 };
        let mut ptt = NullPtt::default();
        sched.run(&mut audio, &mut ptt, &dcd, &dlq);
        handle.join().unwrap();
        assert_eq!(audio.written, 4);
        assert!(!ptt.keyed);
        let item = dlq.dequeue().unwrap();
        assert!(matches!(item.kind, DlqItemKind::SeizeConfirm));
    }
}
