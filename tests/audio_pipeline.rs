//! Whole-pipeline scenarios (spec.md §8 E1/E2/E3): tone codec through FEC
//! through the AX.25 packet object, crossing module boundaries the way a
//! real receive path would.

use std::sync::Arc;

use packetmodem_core::ax25::{Address, Ax25Packet, Modulo};
use packetmodem_core::config::{AudioConfig, ChannelConfig, Duplex, FecPreference, Modulation, ModemConfig};
use packetmodem_core::dlq::{Dlq, DlqItemKind};
use packetmodem_core::fx25::{encode as fx25_encode, Fx25Pref, Fx25Receiver, Fx25Event};
use packetmodem_core::hdlc::{self, bytes_to_bits};
use packetmodem_core::il2p::{self, Il2pReceiver, Il2pEvent};
use packetmodem_core::supervisor::Supervisor;
use packetmodem_core::tone::afsk::AfskModulator;
use packetmodem_core::tone::ToneSource;

fn wb2osz_test_hello() -> Ax25Packet {
    let dest = Address::new("TEST", 0);
    let src = Address::new("WB2OSZ", 15);
    Ax25Packet::build(&[dest, src], &[0x03], Some(0xF0), b"Hello", true, Modulo::Mod8).unwrap()
}

/// E1: AFSK audio generated from a UI frame decodes back to exactly that
/// frame, and only that frame, through the audio path.
#[test]
fn e1_round_trip_ui_frame_through_afsk_audio() {
    let packet = wb2osz_test_hello();
    let expected = packet.as_bytes().to_vec();
    let bits = hdlc::frame_bits(&expected, 8, 8);

    let sample_rate = 9600u32;
    let mut modulator = AfskModulator::new(1200.0, 2200.0, 1200, sample_rate);
    let samples_per_bit = (sample_rate / 1200).max(1);
    let mut samples = Vec::new();
    for bit in &bits {
        modulator.set_bit(*bit);
        for _ in 0..samples_per_bit {
            samples.push(modulator.next_sample());
        }
    }

    let chan = ChannelConfig::new(Modulation::Afsk { mark_hz: 1200, space_hz: 2200 }, 1200, FecPreference::Off, Duplex::Half).unwrap();
    let config = ModemConfig::new(vec![AudioConfig::mono_at(chan, sample_rate)]).unwrap();
    let dlq = Arc::new(Dlq::new());
    let mut sup = Supervisor::new(config, Arc::clone(&dlq));
    for sample in samples {
        sup.process_device_frame(0, &[sample]);
    }

    let mut frames = Vec::new();
    while let Some(item) = dlq.dequeue() {
        if let DlqItemKind::ReceivedFrame { packet, .. } = item.kind {
            frames.push(packet.as_bytes().to_vec());
        }
    }
    assert_eq!(frames.len(), 1, "expected exactly one decoded frame, got {}", frames.len());
    assert_eq!(frames[0], expected);
}

/// E2: FX.25 tag 0x03 (RS(80,64)) recovers the original frame after 7 of
/// its 80 bytes are corrupted, using at most 8 corrections.
#[test]
fn e2_fx25_recovers_from_seven_corrupted_bytes() {
    let packet = wb2osz_test_hello();
    let payload = packet.as_bytes().to_vec();
    let block = fx25_encode(&payload, Fx25Pref::ForceTag(0x03)).unwrap().unwrap();
    assert_eq!(block.len(), 8 + 80);

    let mut corrupted = block.clone();
    for i in 0..7 {
        let pos = 8 + i * 11;
        corrupted[pos] ^= 0x55;
    }

    let mut rx = Fx25Receiver::new();
    let bits = bytes_to_bits(&corrupted);
    let mut event = None;
    for bit in bits {
        if let Some(ev) = rx.push_bit(bit) {
            event = Some(ev);
            break;
        }
    }
    match event.expect("fx25 receiver should have produced an event") {
        Fx25Event::Frame { payload: recovered, corrections, tag } => {
            assert_eq!(recovered, payload);
            assert!(corrections <= 8, "corrections {corrections} exceeds budget");
            assert_eq!(tag, 0x03);
        }
        other => panic!("expected a recovered frame, got {other:?}"),
    }
}

/// E3: a single bit flip in an IL2P header still yields the original
/// addresses, control, and payload once RS correction runs.
#[test]
fn e3_il2p_header_survives_one_bit_flip() {
    let dest = Address::new("N0CALL", 2);
    let mut src = Address::new("N0CALL", 1);
    src.last = true;
    let mut ax25 = packetmodem_core::ax25::address::encode_field(&[dest, src], true).unwrap();
    ax25.push(0x03);
    ax25.push(0xF0);
    ax25.extend_from_slice(b"abc");

    let mut bits = il2p::encode(&ax25, false).unwrap();
    // First bit after the 24-bit sync word lands inside the header block.
    bits[30] ^= 1;

    let mut rx = Il2pReceiver::new();
    let mut event = None;
    for bit in bits {
        if let Some(ev) = rx.push_bit(bit) {
            event = Some(ev);
            break;
        }
    }
    match event.expect("il2p receiver should have produced an event") {
        Il2pEvent::Frame { ax25_bytes, .. } => assert_eq!(ax25_bytes, ax25),
        other => panic!("expected a recovered frame, got {other:?}"),
    }
}
