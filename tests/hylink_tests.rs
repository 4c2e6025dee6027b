//! Host-side tests for the HYlink protocol module
//!
//! Frames are built with the encoder (or by hand where a test needs a
//! malformed one) and pushed through the parser byte stream.

use hycore::hylink::{
    crc16, encode_frame, header_checksum, Command, DeviceId, HylinkError, HylinkPacket,
    HylinkParser, HEADER_SIZE, MAX_PAYLOAD, SYNC_HI, SYNC_LO,
};

/// The reference heartbeat frame: device 6, sequence 1, heartbeat
/// command, single payload byte 0x42.
const HEARTBEAT: [u8; 12] = [
    0xBB, 0xAA, 0x0C, 0x00, 0x06, 0x01, 0x00, 0x00, 0x76, 0x89, 0x77, 0x42,
];

fn build_frame(device_id: u8, sequence: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE + payload.len()];
    let n = encode_frame(device_id, sequence, command, payload, &mut out).unwrap();
    assert_eq!(n, out.len());
    out
}

mod frame_tests {
    use super::*;

    #[test]
    fn encoder_reproduces_reference_heartbeat() {
        let frame = build_frame(
            DeviceId::IoCircuit as u8,
            1,
            Command::Heartbeat as u8,
            &[0x42],
        );
        assert_eq!(frame, HEARTBEAT);
    }

    #[test]
    fn encoder_checksum_and_crc_fields() {
        let payload = [1u8, 2, 3, 4, 5];
        let frame = build_frame(5, 9, 0x11, &payload);

        let crc = crc16(&payload);
        assert_eq!(frame[8], crc.to_le_bytes()[0]);
        assert_eq!(frame[9], crc.to_le_bytes()[1]);
        assert_eq!(frame[10], header_checksum(&frame[..10]));
        assert_eq!(
            u16::from_le_bytes([frame[2], frame[3]]) as usize,
            HEADER_SIZE + payload.len()
        );
    }

    #[test]
    fn encoder_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let mut out = vec![0u8; HEADER_SIZE + payload.len()];
        assert_eq!(
            encode_frame(0, 0, 0, &payload, &mut out),
            Err(HylinkError::PayloadTooLong)
        );
    }

    #[test]
    fn encoder_rejects_short_buffer() {
        let mut out = [0u8; HEADER_SIZE];
        assert_eq!(
            encode_frame(0, 0, 0, &[1, 2, 3], &mut out),
            Err(HylinkError::BufferTooSmall)
        );
    }

    #[test]
    fn registry_lookups() {
        assert_eq!(DeviceId::from_u8(6), Some(DeviceId::IoCircuit));
        assert_eq!(DeviceId::from_u8(3), None);
        assert_eq!(Command::from_u8(0x00), Some(Command::Heartbeat));
        assert_eq!(Command::from_u8(0x11), Some(Command::AttitudeData));
        assert_eq!(Command::from_u8(0x77), None);
    }
}

mod parser_tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
    use std::sync::Mutex;

    #[test]
    fn heartbeat_round_trip() {
        static DELIVERED: AtomicU32 = AtomicU32::new(0);
        static DEVICE: AtomicU8 = AtomicU8::new(0);
        static SEQUENCE: AtomicU8 = AtomicU8::new(0);
        static COMMAND: AtomicU8 = AtomicU8::new(0xFF);
        static PAYLOAD_BYTE: AtomicU8 = AtomicU8::new(0);

        fn on_packet(packet: &HylinkPacket) {
            DELIVERED.fetch_add(1, Ordering::SeqCst);
            DEVICE.store(packet.device_id(), Ordering::SeqCst);
            SEQUENCE.store(packet.sequence(), Ordering::SeqCst);
            COMMAND.store(packet.command(), Ordering::SeqCst);
            assert_eq!(packet.payload().len(), 1);
            PAYLOAD_BYTE.store(packet.payload()[0], Ordering::SeqCst);
        }

        let mut parser = HylinkParser::new(Some(on_packet));
        parser.feed(&HEARTBEAT);

        assert_eq!(DELIVERED.load(Ordering::SeqCst), 1);
        assert_eq!(DEVICE.load(Ordering::SeqCst), 6);
        assert_eq!(SEQUENCE.load(Ordering::SeqCst), 1);
        assert_eq!(COMMAND.load(Ordering::SeqCst), 0);
        assert_eq!(PAYLOAD_BYTE.load(Ordering::SeqCst), 0x42);

        let stats = parser.stats();
        assert_eq!(stats.total_packets, 1);
        assert_eq!(stats.crc_errors, 0);
        assert_eq!(stats.header_errors, 0);
        assert_eq!(stats.length_errors, 0);
    }

    #[test]
    fn leading_garbage_then_empty_payload() {
        static PAYLOAD_LEN: AtomicU32 = AtomicU32::new(u32::MAX);

        fn on_packet(packet: &HylinkPacket) {
            PAYLOAD_LEN.store(packet.payload().len() as u32, Ordering::SeqCst);
        }

        // Two junk bytes, then an empty-payload frame.
        let mut stream = vec![0x00, 0xFF];
        stream.extend_from_slice(&build_frame(0, 0, 0, &[]));
        assert_eq!(stream.len(), 2 + HEADER_SIZE);

        let mut parser = HylinkParser::new(Some(on_packet));
        parser.feed(&stream);

        let stats = parser.stats();
        assert_eq!(stats.total_packets, 1);
        assert_eq!(PAYLOAD_LEN.load(Ordering::SeqCst), 0);
        assert_eq!(stats.crc_errors, 0);
        assert_eq!(stats.header_errors, 0);
        assert_eq!(stats.length_errors, 0);
    }

    #[test]
    fn empty_payload_ignores_crc_field() {
        // Hand-built empty frame with a zeroed CRC field, as produced by
        // senders that skip the CRC for bodiless frames.
        let mut frame = [0u8; HEADER_SIZE];
        frame[0] = SYNC_LO;
        frame[1] = SYNC_HI;
        frame[2] = HEADER_SIZE as u8;
        frame[10] = header_checksum(&frame[..10]);

        let mut parser = HylinkParser::new(None);
        parser.feed(&frame);
        assert_eq!(parser.stats().total_packets, 1);
        assert_eq!(parser.stats().crc_errors, 0);
    }

    #[test]
    fn corrupted_payload_drops_only_that_frame() {
        let mut first = HEARTBEAT;
        first[11] = 0x43; // flip one payload byte; header stays intact

        let second = build_frame(6, 2, 0, &[0x42]);

        static SEQ_SEEN: AtomicU8 = AtomicU8::new(0);
        fn on_packet(packet: &HylinkPacket) {
            SEQ_SEEN.store(packet.sequence(), Ordering::SeqCst);
        }

        let mut parser = HylinkParser::new(Some(on_packet));
        parser.feed(&first);
        parser.feed(&second);

        let stats = parser.stats();
        assert_eq!(stats.crc_errors, 1);
        assert_eq!(stats.total_packets, 1);
        // The surviving packet is the second frame.
        assert_eq!(SEQ_SEEN.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn byte_at_a_time_equals_bulk() {
        let frame = build_frame(10, 7, 0x10, &[9, 8, 7, 6]);

        let mut bulk = HylinkParser::new(None);
        bulk.feed(&frame);

        let mut dribble = HylinkParser::new(None);
        for &byte in &frame {
            dribble.feed(&[byte]);
        }

        assert_eq!(bulk.stats(), dribble.stats());
        assert_eq!(bulk.stats().total_packets, 1);
    }

    #[test]
    fn max_payload_is_delivered() {
        static LEN_SEEN: AtomicU32 = AtomicU32::new(0);
        fn on_packet(packet: &HylinkPacket) {
            LEN_SEEN.store(packet.payload().len() as u32, Ordering::SeqCst);
            assert_eq!(packet.payload()[0], 0xA5);
            assert_eq!(packet.payload()[MAX_PAYLOAD - 1], 0x5A);
        }

        let mut payload = vec![0u8; MAX_PAYLOAD];
        payload[0] = 0xA5;
        payload[MAX_PAYLOAD - 1] = 0x5A;
        let frame = build_frame(1, 0, 0xFE, &payload);

        let mut parser = HylinkParser::new(Some(on_packet));
        parser.feed(&frame);

        assert_eq!(parser.stats().total_packets, 1);
        assert_eq!(LEN_SEEN.load(Ordering::SeqCst), MAX_PAYLOAD as u32);
    }

    #[test]
    fn oversized_length_is_a_header_error() {
        let mut frame = [0u8; HEADER_SIZE];
        frame[0] = SYNC_LO;
        frame[1] = SYNC_HI;
        let bad_len = (HEADER_SIZE + MAX_PAYLOAD + 1) as u16;
        frame[2] = bad_len.to_le_bytes()[0];
        frame[3] = bad_len.to_le_bytes()[1];
        frame[10] = header_checksum(&frame[..10]);

        let mut parser = HylinkParser::new(None);
        parser.feed(&frame);

        let stats = parser.stats();
        assert_eq!(stats.total_packets, 0);
        assert_eq!(stats.header_errors, 1);
        assert_eq!(stats.length_errors, 1);
    }

    #[test]
    fn undersized_length_is_a_header_error() {
        let mut frame = [0u8; HEADER_SIZE];
        frame[0] = SYNC_LO;
        frame[1] = SYNC_HI;
        frame[2] = 5; // < header size
        frame[10] = header_checksum(&frame[..10]);

        let mut parser = HylinkParser::new(None);
        parser.feed(&frame);

        assert_eq!(parser.stats().header_errors, 1);
        assert_eq!(parser.stats().length_errors, 1);
        assert_eq!(parser.stats().total_packets, 0);
    }

    #[test]
    fn bad_checksum_is_a_header_error_not_a_length_error() {
        let mut frame = build_frame(6, 1, 0, &[0x42]);
        frame[10] ^= 0xFF;

        let mut parser = HylinkParser::new(None);
        parser.feed(&frame);

        let stats = parser.stats();
        assert_eq!(stats.header_errors, 1);
        assert_eq!(stats.length_errors, 0);
        assert_eq!(stats.total_packets, 0);
    }

    #[test]
    fn sync_bytes_inside_body_do_not_resync() {
        let payload = [SYNC_LO, SYNC_HI, SYNC_LO, SYNC_HI];
        let frame = build_frame(2, 3, 0x20, &payload);

        let mut parser = HylinkParser::new(None);
        parser.feed(&frame);

        assert_eq!(parser.stats().total_packets, 1);
        assert_eq!(parser.stats().header_errors, 0);
    }

    #[test]
    fn repeated_sync_lo_holds_the_hunt() {
        // A spurious 0xBB ahead of the real frame start: the parser must
        // treat the second 0xBB as the candidate frame start.
        let mut stream = vec![SYNC_LO];
        stream.extend_from_slice(&HEARTBEAT);

        let mut parser = HylinkParser::new(None);
        parser.feed(&stream);

        assert_eq!(parser.stats().total_packets, 1);
        assert_eq!(parser.stats().header_errors, 0);
    }

    #[test]
    fn sync_lo_then_junk_returns_to_hunt() {
        let mut stream = vec![SYNC_LO, 0x55]; // aborted sync attempt
        stream.extend_from_slice(&HEARTBEAT);

        let mut parser = HylinkParser::new(None);
        parser.feed(&stream);

        assert_eq!(parser.stats().total_packets, 1);
        assert_eq!(parser.stats().crc_errors, 0);
        assert_eq!(parser.stats().header_errors, 0);
    }

    #[test]
    fn reset_drops_partial_frame_keeps_stats() {
        let mut parser = HylinkParser::new(None);

        // Half a header, then an out-of-band reset.
        parser.feed(&HEARTBEAT[..6]);
        parser.reset();

        parser.feed(&HEARTBEAT);
        assert_eq!(parser.stats().total_packets, 1);
        assert_eq!(parser.stats().header_errors, 0);
    }

    #[test]
    fn frames_deliver_in_stream_order() {
        static ORDER: Mutex<Vec<u8>> = Mutex::new(Vec::new());
        fn on_packet(packet: &HylinkPacket) {
            ORDER.lock().unwrap().push(packet.sequence());
        }

        let mut stream = Vec::new();
        for seq in 1..=4u8 {
            stream.extend_from_slice(&build_frame(6, seq, 0, &[seq]));
        }

        let mut parser = HylinkParser::new(Some(on_packet));
        parser.feed(&stream);

        assert_eq!(parser.stats().total_packets, 4);
        assert_eq!(*ORDER.lock().unwrap(), vec![1, 2, 3, 4]);
    }
}
