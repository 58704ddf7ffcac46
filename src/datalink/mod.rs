//! AX.25 v2.2 data-link state machine (C9): one [`Link`] per
//! (channel, local address, remote address), driven by events the
//! consumer pulls off the DLQ (spec.md §4.9). The state machine never
//! blocks itself; timers are logical and evaluated each time the consumer
//! wakes (spec.md §5 "Timer discipline").

pub mod xid;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::ax25::{Ax25Packet, FrameType, Modulo};
use crate::error::LinkError;
use crate::txsched::Priority;
use xid::{SrejCapability, XidParams};

/// Link state (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    AwaitingConnect,
    AwaitingConnect2_2,
    AwaitingRelease,
    Connected,
    TimerRecovery,
}

/// Identifies one link instance (spec.md §3: "keyed by (channel,
/// local-address, remote-address)").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub channel: usize,
    pub local: String,
    pub remote: String,
}

/// Events the consumer delivers to a link, in DLQ arrival order
/// (spec.md §4.9).
#[derive(Debug, Clone)]
pub enum LinkEvent {
    DlConnectRequest,
    DlDisconnectRequest,
    DlDataRequest(Vec<u8>),
    Incoming(Ax25Packet),
    T1Expiry,
    T3Expiry,
    ChannelBusy(bool),
    SeizeConfirm,
}

/// Output of [`Link::handle_event`]: things the consumer (or the transmit
/// scheduler, or the application) must do in response.
#[derive(Debug, Clone)]
pub enum LinkAction {
    Transmit { priority: Priority, packet: Ax25Packet },
    DeliverToApplication(Vec<u8>),
    ArmT1,
    StopT1,
    ArmT3,
    LinkUp,
    LinkDown,
    Error(LinkError),
}

const DEFAULT_N1_MAX_INFO: usize = 256;
const DEFAULT_N2_RETRIES: u32 = 10;
const DEFAULT_WINDOW: u8 = 7;
const DEFAULT_WINDOW_128: u8 = 127;

fn modulus(modulo: Modulo) -> u16 {
    if modulo == Modulo::Mod128 {
        128
    } else {
        8
    }
}

/// One AX.25 v2.2 connection (spec.md §3 "Link state machine instance").
pub struct Link {
    pub key: LinkKey,
    pub state: LinkState,
    pub modulo: Modulo,
    v_s: u8,
    v_r: u8,
    v_a: u8,
    k: u8,
    k_me: u8,
    n1: usize,
    n2: u32,
    retry_count: u32,
    srej: SrejCapability,
    t1_running: bool,
    t1_deadline: Option<Instant>,
    t1_duration: Duration,
    t3_duration: Duration,
    t3_deadline: Option<Instant>,
    channel_busy: bool,
    send_queue: VecDeque<Vec<u8>>,
    retransmit_list: Vec<Option<Vec<u8>>>,
}

impl Link {
    pub fn new(key: LinkKey) -> Self {
        Link {
            key,
            state: LinkState::Disconnected,
            modulo: Modulo::Mod8,
            v_s: 0,
            v_r: 0,
            v_a: 0,
            k: DEFAULT_WINDOW,
            k_me: DEFAULT_WINDOW,
            n1: DEFAULT_N1_MAX_INFO,
            n2: DEFAULT_N2_RETRIES,
            retry_count: 0,
            srej: SrejCapability::None,
            t1_running: false,
            t1_deadline: None,
            t1_duration: Duration::from_millis(3000),
            t3_duration: Duration::from_secs(300),
            t3_deadline: None,
            channel_busy: false,
            send_queue: VecDeque::new(),
            retransmit_list: Vec::new(),
        }
    }

    /// Duration the consumer should use the next time it sees an `ArmT1`
    /// action for this link (spec.md §3, timer T1).
    pub fn t1_duration(&self) -> Duration {
        self.t1_duration
    }

    pub fn t3_duration(&self) -> Duration {
        self.t3_duration
    }

    /// Record the absolute deadline the consumer computed for T1, so
    /// `earliest_deadline` can feed `Dlq::wait_while_empty` (spec.md §5
    /// "Timer discipline").
    pub fn arm_t1_at(&mut self, deadline: Instant) {
        self.t1_deadline = Some(deadline);
    }

    pub fn arm_t3_at(&mut self, deadline: Instant) {
        self.t3_deadline = Some(deadline);
    }

    pub fn clear_t1(&mut self) {
        self.t1_deadline = None;
    }

    pub fn clear_t3(&mut self) {
        self.t3_deadline = None;
    }

    /// The earlier of this link's pending T1/T3 deadlines, if any.
    pub fn earliest_deadline(&self) -> Option<Instant> {
        match (self.t1_deadline, self.t3_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    fn window(&self) -> u8 {
        if self.modulo == Modulo::Mod128 {
            DEFAULT_WINDOW_128.min(self.k)
        } else {
            self.k
        }
    }

    fn mod_n(&self) -> u16 {
        modulus(self.modulo)
    }

    fn build_frame(&self, control: &[u8], pid: Option<u8>, info: &[u8]) -> Result<Ax25Packet, LinkError> {
        use crate::ax25::Address;
        let (local_call, local_ssid) = split_callsign(&self.key.local);
        let (remote_call, remote_ssid) = split_callsign(&self.key.remote);
        let dest = Address::new(&remote_call, remote_ssid);
        let mut src = Address::new(&local_call, local_ssid);
        src.last = true;
        Ax25Packet::build(&[dest, src], control, pid, info, true, self.modulo)
            .map_err(|_| LinkError::InvalidControl(control.first().copied().unwrap_or(0) as u16))
    }

    fn i_control(&self, ns: u8, pf: bool) -> Vec<u8> {
        if self.modulo == Modulo::Mod128 {
            vec![(ns << 1) & 0xFE, ((self.v_r << 1) & 0xFE) | pf as u8]
        } else {
            vec![((self.v_r & 0x07) << 5) | (if pf { 0x10 } else { 0 }) | ((ns & 0x07) << 1)]
        }
    }

    fn s_control(&self, stype: u8, pf: bool) -> Vec<u8> {
        if self.modulo == Modulo::Mod128 {
            vec![0x01 | (stype << 2), ((self.v_r << 1) & 0xFE) | pf as u8]
        } else {
            vec![0x01 | (stype << 2) | (if pf { 0x10 } else { 0 }) | ((self.v_r & 0x07) << 5)]
        }
    }

    fn rr(&self, pf: bool) -> Vec<u8> {
        self.s_control(0b00, pf)
    }
    fn rnr(&self, pf: bool) -> Vec<u8> {
        self.s_control(0b10, pf)
    }
    fn rej(&self, pf: bool) -> Vec<u8> {
        self.s_control(0b01, pf)
    }

    /// Process one event, returning the actions the caller must carry out.
    /// Events are processed strictly in delivery order (spec.md §4.9).
    pub fn handle_event(&mut self, event: LinkEvent) -> Vec<LinkAction> {
        let actions = match event {
            LinkEvent::DlConnectRequest => self.on_connect_request(),
            LinkEvent::DlDisconnectRequest => self.on_disconnect_request(),
            LinkEvent::DlDataRequest(data) => self.on_data_request(data),
            LinkEvent::Incoming(frame) => self.on_incoming(frame),
            LinkEvent::T1Expiry => self.on_t1_expiry(),
            LinkEvent::T3Expiry => self.on_t3_expiry(),
            LinkEvent::ChannelBusy(busy) => {
                self.channel_busy = busy;
                Vec::new()
            }
            LinkEvent::SeizeConfirm => self.on_seize_confirm(),
        };
        // ArmT1/StopT1 are emitted for the caller to schedule the logical
        // timer; track the running state internally too so later
        // decisions (e.g. "only arm T1 if not already running") don't
        // require the caller to report it back.
        for action in &actions {
            match action {
                LinkAction::ArmT1 => self.t1_running = true,
                LinkAction::StopT1 => self.t1_running = false,
                _ => {}
            }
        }
        actions
    }

    fn on_connect_request(&mut self) -> Vec<LinkAction> {
        self.state = LinkState::AwaitingConnect2_2;
        self.retry_count = 0;
        const SABME: u8 = 0x6F;
        const PF: u8 = 0x10;
        let Ok(sabme) = self.build_frame(&[SABME | PF], None, &[]) else {
            return vec![LinkAction::Error(LinkError::InvalidControl(SABME as u16))];
        };
        vec![LinkAction::Transmit { priority: Priority::Expedited, packet: sabme }, LinkAction::ArmT1]
    }

    /// Build the XID proposal this link would send on setup, carrying the
    /// negotiable parameter set of spec.md §4.9. Callers transmit it as a
    /// `U XID` frame; a responder calls [`xid::decode`] on the reply and
    /// may only reduce what was offered (spec.md §4.9).
    pub fn propose_xid(&self) -> Vec<u8> {
        xid::encode(&XidParams {
            full_duplex: false,
            modulo: Modulo::Mod128,
            srej: SrejCapability::Single,
            i_field_length_rx_bytes: self.n1 as u16,
            window_size_rx: self.k_me,
            ack_timer_ms: self.t1_duration.as_millis() as u16,
            retries: self.n2 as u8,
        })
    }

    /// Apply a negotiated (and possibly peer-reduced) parameter set to this
    /// link.
    pub fn apply_xid(&mut self, params: &XidParams) {
        self.modulo = params.modulo;
        self.srej = params.srej;
        self.k_me = params.window_size_rx;
        self.n1 = params.i_field_length_rx_bytes as usize;
        self.n2 = params.retries as u32;
        self.t1_duration = Duration::from_millis(params.ack_timer_ms as u64);
    }

    fn on_disconnect_request(&mut self) -> Vec<LinkAction> {
        if self.state == LinkState::Disconnected {
            return vec![LinkAction::LinkDown];
        }
        self.state = LinkState::AwaitingRelease;
        const DISC: u8 = 0x43;
        const PF: u8 = 0x10;
        let Ok(disc) = self.build_frame(&[DISC | PF], None, &[]) else {
            return vec![LinkAction::Error(LinkError::InvalidControl(DISC as u16))];
        };
        vec![LinkAction::Transmit { priority: Priority::Expedited, packet: disc }, LinkAction::ArmT1]
    }

    fn window_full(&self) -> bool {
        let diff = (self.v_s as i16 - self.v_a as i16).rem_euclid(self.mod_n() as i16);
        diff as u8 >= self.window()
    }

    fn on_data_request(&mut self, data: Vec<u8>) -> Vec<LinkAction> {
        if !matches!(self.state, LinkState::Connected | LinkState::TimerRecovery) {
            self.send_queue.push_back(data);
            return Vec::new();
        }
        if self.window_full() {
            self.send_queue.push_back(data);
            return Vec::new();
        }
        self.transmit_one_iframe(data)
    }

    /// Ensure `retransmit_list` holds one slot per sequence number in the
    /// current modulus (spec.md §3: "retransmit-list of sent-but-unacked
    /// I-frames (indexed 0..k-1)" generalized to one slot per sequence
    /// number so REJ/SREJ can address any of them directly).
    fn ensure_retransmit_capacity(&mut self) {
        let n = self.mod_n() as usize;
        if self.retransmit_list.len() != n {
            self.retransmit_list = vec![None; n];
        }
    }

    fn transmit_one_iframe(&mut self, data: Vec<u8>) -> Vec<LinkAction> {
        self.ensure_retransmit_capacity();
        let ns = self.v_s;
        let ctrl = self.i_control(ns, false);
        let Ok(frame) = self.build_frame(&ctrl, Some(0xF0), &data) else {
            return vec![LinkAction::Error(LinkError::InfoTooLong { len: data.len(), max: self.n1 })];
        };
        self.retransmit_list[ns as usize] = Some(data);
        self.v_s = (self.v_s + 1) % self.mod_n() as u8;
        let mut actions = vec![LinkAction::Transmit { priority: Priority::Normal, packet: frame }];
        if !self.t1_running {
            actions.push(LinkAction::ArmT1);
        }
        actions
    }

    fn on_seize_confirm(&mut self) -> Vec<LinkAction> {
        if !self.t1_running && matches!(self.state, LinkState::Connected | LinkState::TimerRecovery | LinkState::AwaitingConnect2_2 | LinkState::AwaitingConnect | LinkState::AwaitingRelease) {
            return vec![LinkAction::ArmT1];
        }
        Vec::new()
    }

    fn advance_ack(&mut self, nr: u8) -> bool {
        let nr_ahead = ((nr as i16 - self.v_a as i16).rem_euclid(self.mod_n() as i16)) as u8;
        if nr_ahead == 0 && nr != self.v_a {
            return false;
        }
        for _ in 0..nr_ahead {
            let idx = self.v_a as usize;
            if idx < self.retransmit_list.len() {
                self.retransmit_list[idx] = None;
            }
            self.v_a = (self.v_a + 1) % self.mod_n() as u8;
        }
        true
    }

    fn on_incoming(&mut self, frame: Ax25Packet) -> Vec<LinkAction> {
        let ft = frame.frame_type();
        match ft {
            FrameType::USabme { .. } | FrameType::USabm { .. } => self.on_incoming_sabm(matches!(ft, FrameType::USabme { .. })),
            FrameType::UUa { .. } => self.on_incoming_ua(),
            FrameType::UDm { .. } => self.on_incoming_dm(),
            FrameType::UDisc { pf } => self.on_incoming_disc(pf),
            FrameType::UFrmr { .. } => self.on_incoming_frmr(),
            FrameType::I { ns, nr, pf, .. } => self.on_incoming_i(ns, nr, pf, frame.get_info().to_vec()),
            FrameType::SRr { nr, pf } => self.on_incoming_rr(nr, pf),
            FrameType::SRnr { nr, .. } => self.on_incoming_rnr(nr),
            FrameType::SRej { nr, .. } => self.on_incoming_rej(nr),
            FrameType::SSrej { nr, .. } => self.on_incoming_srej(nr),
            FrameType::UUi { .. } => {
                vec![LinkAction::DeliverToApplication(frame.get_info().to_vec())]
            }
            _ => Vec::new(),
        }
    }

    fn on_incoming_sabm(&mut self, extended: bool) -> Vec<LinkAction> {
        self.v_s = 0;
        self.v_r = 0;
        self.v_a = 0;
        self.retransmit_list.clear();
        self.modulo = if extended { Modulo::Mod128 } else { Modulo::Mod8 };
        self.state = LinkState::Connected;
        const UA: u8 = 0x63;
        const PF: u8 = 0x10;
        let Ok(ua) = self.build_frame(&[UA | PF], None, &[]) else {
            return vec![LinkAction::Error(LinkError::InvalidControl(UA as u16))];
        };
        vec![LinkAction::Transmit { priority: Priority::Expedited, packet: ua }, LinkAction::LinkUp, LinkAction::ArmT3]
    }

    fn on_incoming_ua(&mut self) -> Vec<LinkAction> {
        match self.state {
            LinkState::AwaitingConnect2_2 | LinkState::AwaitingConnect => {
                self.v_s = 0;
                self.v_r = 0;
                self.v_a = 0;
                self.retransmit_list.clear();
                self.state = LinkState::Connected;
                vec![LinkAction::StopT1, LinkAction::LinkUp, LinkAction::ArmT3]
            }
            LinkState::AwaitingRelease => {
                self.state = LinkState::Disconnected;
                vec![LinkAction::StopT1, LinkAction::LinkDown]
            }
            _ => Vec::new(),
        }
    }

    fn on_incoming_dm(&mut self) -> Vec<LinkAction> {
        match self.state {
            LinkState::AwaitingConnect2_2 => {
                // Peer doesn't speak v2.2: fall back to modulo-8 SABM
                // (spec.md §4.9 "Connect request to peer capability
                // detection").
                self.state = LinkState::AwaitingConnect;
                self.modulo = Modulo::Mod8;
                self.srej = SrejCapability::None;
                const SABM: u8 = 0x2F;
                const PF: u8 = 0x10;
                let Ok(sabm) = self.build_frame(&[SABM | PF], None, &[]) else {
                    return vec![LinkAction::Error(LinkError::InvalidControl(SABM as u16))];
                };
                vec![LinkAction::Transmit { priority: Priority::Expedited, packet: sabm }, LinkAction::ArmT1]
            }
            LinkState::AwaitingConnect | LinkState::AwaitingRelease => {
                self.state = LinkState::Disconnected;
                vec![LinkAction::StopT1, LinkAction::LinkDown]
            }
            LinkState::Connected | LinkState::TimerRecovery => {
                self.state = LinkState::Disconnected;
                vec![LinkAction::StopT1, LinkAction::LinkDown]
            }
            LinkState::Disconnected => Vec::new(),
        }
    }

    fn on_incoming_disc(&mut self, pf: bool) -> Vec<LinkAction> {
        self.state = LinkState::Disconnected;
        const UA: u8 = 0x63;
        let ctrl = if pf { UA | 0x10 } else { UA };
        let Ok(ua) = self.build_frame(&[ctrl], None, &[]) else {
            return vec![LinkAction::Error(LinkError::InvalidControl(UA as u16))];
        };
        vec![LinkAction::Transmit { priority: Priority::Expedited, packet: ua }, LinkAction::StopT1, LinkAction::LinkDown]
    }

    fn on_incoming_frmr(&mut self) -> Vec<LinkAction> {
        self.state = LinkState::Disconnected;
        vec![LinkAction::StopT1, LinkAction::Error(LinkError::RetriesExhausted), LinkAction::LinkDown]
    }

    fn on_incoming_i(&mut self, ns: u8, nr: u8, pf: bool, info: Vec<u8>) -> Vec<LinkAction> {
        if !matches!(self.state, LinkState::Connected | LinkState::TimerRecovery) {
            return Vec::new();
        }
        let mut actions = Vec::new();
        if self.advance_ack(nr) && self.v_s == self.v_a {
            actions.push(LinkAction::StopT1);
        }
        if ns == self.v_r {
            self.v_r = (self.v_r + 1) % self.mod_n() as u8;
            actions.push(LinkAction::DeliverToApplication(info));
            actions.push(LinkAction::Transmit { priority: Priority::Normal, packet: self.reply_rr(pf) });
        } else {
            let ctrl = self.rej(pf);
            actions.push(LinkAction::Transmit { priority: Priority::Expedited, packet: self.reply_with(&ctrl) });
        }
        actions
    }

    fn reply_rr(&self, pf: bool) -> Ax25Packet {
        self.reply_with(&self.rr(pf))
    }

    fn reply_with(&self, ctrl: &[u8]) -> Ax25Packet {
        self.build_frame(ctrl, None, &[]).expect("well-formed S frame always builds")
    }

    fn on_incoming_rr(&mut self, nr: u8, pf: bool) -> Vec<LinkAction> {
        let _ = pf;
        if !matches!(self.state, LinkState::Connected | LinkState::TimerRecovery) {
            return Vec::new();
        }
        let advanced = self.advance_ack(nr);
        let mut actions = Vec::new();
        if advanced {
            if self.v_s == self.v_a {
                actions.push(LinkAction::StopT1);
                self.state = LinkState::Connected;
            } else {
                actions.push(LinkAction::ArmT1);
            }
        }
        actions
    }

    fn on_incoming_rnr(&mut self, nr: u8) -> Vec<LinkAction> {
        self.advance_ack(nr);
        Vec::new()
    }

    fn on_incoming_rej(&mut self, nr: u8) -> Vec<LinkAction> {
        self.advance_ack(nr);
        self.retransmit_from(nr)
    }

    fn on_incoming_srej(&mut self, nr: u8) -> Vec<LinkAction> {
        // Selective reject: retransmit only the requested frame, if we
        // still have it.
        let idx = nr as usize;
        if let Some(Some(data)) = self.retransmit_list.get(idx).cloned() {
            let ctrl = self.i_control(nr, false);
            if let Ok(frame) = self.build_frame(&ctrl, Some(0xF0), &data) {
                return vec![LinkAction::Transmit { priority: Priority::Normal, packet: frame }];
            }
        }
        Vec::new()
    }

    fn retransmit_from(&mut self, start: u8) -> Vec<LinkAction> {
        self.state = LinkState::TimerRecovery;
        let mut actions = Vec::new();
        let mut ns = start;
        while ns != self.v_s {
            let idx = ns as usize;
            if let Some(Some(data)) = self.retransmit_list.get(idx).cloned() {
                let ctrl = self.i_control(ns, false);
                if let Ok(frame) = self.build_frame(&ctrl, Some(0xF0), &data) {
                    actions.push(LinkAction::Transmit { priority: Priority::Normal, packet: frame });
                }
            }
            ns = (ns + 1) % self.mod_n() as u8;
        }
        actions.push(LinkAction::ArmT1);
        actions
    }

    fn on_t1_expiry(&mut self) -> Vec<LinkAction> {
        if self.channel_busy {
            // Channel-busy gating (spec.md §5 "Timer discipline"): a busy
            // medium must not count against the retry budget.
            return vec![LinkAction::ArmT1];
        }
        self.retry_count += 1;
        if self.retry_count > self.n2 {
            self.state = LinkState::Disconnected;
            return vec![LinkAction::Error(LinkError::RetriesExhausted), LinkAction::LinkDown];
        }
        match self.state {
            LinkState::AwaitingConnect2_2 | LinkState::AwaitingConnect | LinkState::AwaitingRelease => {
                // Re-send the outstanding U frame.
                vec![LinkAction::ArmT1]
            }
            LinkState::Connected | LinkState::TimerRecovery => self.retransmit_from(self.v_a),
            LinkState::Disconnected => Vec::new(),
        }
    }

    fn on_t3_expiry(&mut self) -> Vec<LinkAction> {
        if !matches!(self.state, LinkState::Connected) {
            return Vec::new();
        }
        let rr = self.reply_rr(true);
        vec![LinkAction::Transmit { priority: Priority::Expedited, packet: rr }, LinkAction::ArmT1]
    }

    /// Drain queued application data into I-frames now that the window has
    /// room; called by the consumer after any event that may have advanced
    /// V(A).
    pub fn pump_send_queue(&mut self) -> Vec<LinkAction> {
        let mut actions = Vec::new();
        while !self.window_full() {
            let Some(data) = self.send_queue.pop_front() else { break };
            actions.extend(self.transmit_one_iframe(data));
        }
        actions
    }
}

fn split_callsign(s: &str) -> (String, u8) {
    match s.split_once('-') {
        Some((call, ssid)) => (call.to_string(), ssid.parse().unwrap_or(0)),
        None => (s.to_string(), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> LinkKey {
        LinkKey { channel: 0, local: "N0CALL-1".to_string(), remote: "N0CALL-2".to_string() }
    }

    #[test]
    fn connect_sends_sabme_and_arms_t1() {
        let mut link = Link::new(key());
        let actions = link.handle_event(LinkEvent::DlConnectRequest);
        assert_eq!(link.state, LinkState::AwaitingConnect2_2);
        assert!(actions.iter().any(|a| matches!(a, LinkAction::ArmT1)));
        assert!(actions.iter().any(|a| matches!(a, LinkAction::Transmit { .. })));
    }

    #[test]
    fn ua_after_sabme_connects() {
        let mut link = Link::new(key());
        link.handle_event(LinkEvent::DlConnectRequest);
        let peer = Ax25Packet::build(
            &[crate::ax25::Address::new("N0CALL", 1), {
                let mut a = crate::ax25::Address::new("N0CALL", 2);
                a.last = true;
                a
            }],
            &[0x63 | 0x10],
            None,
            &[],
            true,
            Modulo::Mod8,
        )
        .unwrap();
        let actions = link.handle_event(LinkEvent::Incoming(peer));
        assert_eq!(link.state, LinkState::Connected);
        assert!(actions.iter().any(|a| matches!(a, LinkAction::LinkUp)));
    }

    #[test]
    fn dm_during_sabme_falls_back_to_sabm_mod8() {
        let mut link = Link::new(key());
        link.handle_event(LinkEvent::DlConnectRequest);
        let dm = Ax25Packet::build(
            &[crate::ax25::Address::new("N0CALL", 1), {
                let mut a = crate::ax25::Address::new("N0CALL", 2);
                a.last = true;
                a
            }],
            &[0x0F],
            None,
            &[],
            true,
            Modulo::Mod8,
        )
        .unwrap();
        let actions = link.handle_event(LinkEvent::Incoming(dm));
        assert_eq!(link.state, LinkState::AwaitingConnect);
        assert!(actions.iter().any(|a| matches!(a, LinkAction::Transmit { .. })));
    }

    #[test]
    fn t1_expiry_past_retry_limit_disconnects() {
        let mut link = Link::new(key());
        link.n2 = 1;
        link.handle_event(LinkEvent::DlConnectRequest);
        link.handle_event(LinkEvent::T1Expiry);
        let actions = link.handle_event(LinkEvent::T1Expiry);
        assert_eq!(link.state, LinkState::Disconnected);
        assert!(actions.iter().any(|a| matches!(a, LinkAction::Error(LinkError::RetriesExhausted))));
    }

    #[test]
    fn channel_busy_gates_t1_without_counting_a_retry() {
        let mut link = Link::new(key());
        link.n2 = 1;
        link.handle_event(LinkEvent::DlConnectRequest);
        link.handle_event(LinkEvent::ChannelBusy(true));
        let actions = link.handle_event(LinkEvent::T1Expiry);
        assert_eq!(link.retry_count, 0);
        assert!(actions.iter().any(|a| matches!(a, LinkAction::ArmT1)));
    }
}
