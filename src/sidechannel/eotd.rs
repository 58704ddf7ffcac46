//! End-of-Train device telemetry decoding (spec.md §6): the 8-byte status
//! packet a rear-of-train marker unit reports over the same AFSK channel as
//! ordinary AX.25 traffic.
//!
//! spec.md names the fields (chain, device-battery, msg-id, 17-bit
//! unit-address, brake-pressure, valve, confirm, motion, marker-light) but
//! not their bit positions or widths. The layout below is this
//! implementation's resolution of that gap (recorded in DESIGN.md): a
//! single MSB-first 64-bit word sized so every named field fits with room
//! to spare, reserved bits zero.

/// Battery condition code (spec.md §6 "device-battery").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryCondition {
    Ok,
    Low,
    Charging,
    Fail,
}

impl BatteryCondition {
    fn from_bits(v: u8) -> Self {
        match v & 0x3 {
            0 => BatteryCondition::Ok,
            1 => BatteryCondition::Low,
            2 => BatteryCondition::Charging,
            _ => BatteryCondition::Fail,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            BatteryCondition::Ok => 0,
            BatteryCondition::Low => 1,
            BatteryCondition::Charging => 2,
            BatteryCondition::Fail => 3,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            BatteryCondition::Ok => "ok",
            BatteryCondition::Low => "low",
            BatteryCondition::Charging => "charging",
            BatteryCondition::Fail => "fail",
        }
    }
}

/// Brake valve state (spec.md §6 "valve").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveState {
    Closed,
    Venting,
    Applied,
    Reserved,
}

impl ValveState {
    fn from_bits(v: u8) -> Self {
        match v & 0x3 {
            0 => ValveState::Closed,
            1 => ValveState::Venting,
            2 => ValveState::Applied,
            _ => ValveState::Reserved,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            ValveState::Closed => 0,
            ValveState::Venting => 1,
            ValveState::Applied => 2,
            ValveState::Reserved => 3,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ValveState::Closed => "closed",
            ValveState::Venting => "venting",
            ValveState::Applied => "applied",
            ValveState::Reserved => "reserved",
        }
    }
}

/// One decoded End-of-Train status packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EotdPacket {
    pub msg_id: u8,
    pub chain: bool,
    pub device_battery: BatteryCondition,
    pub unit_address: u32,
    pub brake_pressure: u8,
    pub valve: ValveState,
    pub confirm: bool,
    pub motion: bool,
    pub marker_light: bool,
}

struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BitReader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> u32 {
        let mut v = 0u32;
        for _ in 0..n {
            let byte = self.bytes[self.pos / 8];
            let bit = (byte >> (7 - self.pos % 8)) & 1;
            v = (v << 1) | bit as u32;
            self.pos += 1;
        }
        v
    }
}

struct BitWriter {
    bytes: [u8; 8],
    pos: usize,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { bytes: [0u8; 8], pos: 0 }
    }

    fn put(&mut self, v: u32, n: usize) {
        for i in (0..n).rev() {
            let bit = ((v >> i) & 1) as u8;
            self.bytes[self.pos / 8] |= bit << (7 - self.pos % 8);
            self.pos += 1;
        }
    }
}

/// Decode an 8-byte End-of-Train packet.
pub fn decode(bytes: &[u8; 8]) -> EotdPacket {
    let mut r = BitReader::new(bytes);
    let msg_id = r.take(4) as u8;
    let chain = r.take(1) != 0;
    let device_battery = BatteryCondition::from_bits(r.take(2) as u8);
    let unit_address = r.take(17);
    let brake_pressure = r.take(8) as u8;
    let valve = ValveState::from_bits(r.take(2) as u8);
    let confirm = r.take(1) != 0;
    let motion = r.take(1) != 0;
    let marker_light = r.take(1) != 0;
    EotdPacket { msg_id, chain, device_battery, unit_address, brake_pressure, valve, confirm, motion, marker_light }
}

/// Encode an [`EotdPacket`] back into its 8-byte wire form, reserved bits
/// zero.
pub fn encode(packet: &EotdPacket) -> [u8; 8] {
    let mut w = BitWriter::new();
    w.put(packet.msg_id as u32, 4);
    w.put(packet.chain as u32, 1);
    w.put(packet.device_battery.to_bits() as u32, 2);
    w.put(packet.unit_address, 17);
    w.put(packet.brake_pressure as u32, 8);
    w.put(packet.valve.to_bits() as u32, 2);
    w.put(packet.confirm as u32, 1);
    w.put(packet.motion as u32, 1);
    w.put(packet.marker_light as u32, 1);
    w.bytes
}

/// Render a decoded packet as the one-line text form spec.md §6 calls for.
pub fn to_text(packet: &EotdPacket) -> String {
    format!(
        "EOTD msg={} addr={} battery={} pressure={}psi valve={} confirm={} motion={} marker={}",
        packet.msg_id,
        packet.unit_address,
        packet.device_battery.as_str(),
        packet.brake_pressure,
        packet.valve.as_str(),
        if packet.confirm { "y" } else { "n" },
        if packet.motion { "y" } else { "n" },
        if packet.marker_light { "on" } else { "off" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode() {
        let packet = EotdPacket {
            msg_id: 3,
            chain: true,
            device_battery: BatteryCondition::Low,
            unit_address: 0x1_8A5A,
            brake_pressure: 64,
            valve: ValveState::Applied,
            confirm: true,
            motion: false,
            marker_light: true,
        };
        let bytes = encode(&packet);
        assert_eq!(decode(&bytes), packet);
    }

    #[test]
    fn text_rendering_includes_every_named_field() {
        let packet = decode(&[0u8; 8]);
        let text = to_text(&packet);
        for needle in ["msg=", "addr=", "battery=", "pressure=", "valve=", "confirm=", "motion=", "marker="] {
            assert!(text.contains(needle), "missing {needle} in {text}");
        }
    }

    #[test]
    fn unit_address_spans_seventeen_bits() {
        let packet = EotdPacket {
            msg_id: 0,
            chain: false,
            device_battery: BatteryCondition::Ok,
            unit_address: 0x1_FFFF,
            brake_pressure: 0,
            valve: ValveState::Closed,
            confirm: false,
            motion: false,
            marker_light: false,
        };
        let bytes = encode(&packet);
        assert_eq!(decode(&bytes).unit_address, 0x1_FFFF);
    }
}
