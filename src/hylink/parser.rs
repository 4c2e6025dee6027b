//! HYlink stream parser
//!
//! A deterministic state machine fed one byte at a time. Any validation
//! failure resynchronizes: the context drops back to Idle and the next
//! 0xBB 0xAA pair starts a fresh frame, so a lossy stream never wedges
//! the parser. Each well-formed frame is delivered to the callback
//! exactly once, in arrival order.
//!
//! The feed entry is single-producer: exactly one context (a UART
//! receive callback, or one task) may call it.

use crate::hylink::crc::{crc16, header_checksum};
use crate::hylink::protocol::{
    HylinkPacket, HEADER_SIZE, MAX_PAYLOAD, OFF_CHECKSUM, OFF_LEN_HI, OFF_LEN_LO, SYNC_HI,
    SYNC_LO,
};

/// Delivery callback; the packet reference is only valid for the call
pub type PacketCallback = fn(&HylinkPacket);

/// Parser statistics
///
/// Plain counters under the single-feeder contract. Readers in other
/// contexts may observe a snapshot mid-update unless they take a
/// critical section around [`HylinkParser::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames validated and delivered
    pub total_packets: u32,
    /// Frames dropped on a payload CRC mismatch
    pub crc_errors: u32,
    /// Frames dropped during header validation
    pub header_errors: u32,
    /// Subset of header errors caused by an out-of-range length field
    pub length_errors: u32,
}

/// Parser FSM states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    /// Hunting for the first sync byte
    Idle,
    /// Got SYNC_LO, expecting SYNC_HI
    SyncLo,
    /// Accumulating the remaining header bytes
    Header,
    /// Accumulating the payload
    Body,
}

/// Why a completed header was rejected
enum HeaderFault {
    Sync,
    Length,
    Checksum,
}

/// HYlink stream parser context
pub struct HylinkParser {
    state: ParserState,
    packet: HylinkPacket,
    /// Bytes accumulated in the current state (header offset or payload
    /// index); never exceeds the capacity of the buffer it indexes
    rx_count: u16,
    /// Payload length promised by a validated header
    expected_len: u16,
    callback: Option<PacketCallback>,
    stats: ParserStats,
}

impl HylinkParser {
    /// Create a parser delivering frames to `callback`
    pub const fn new(callback: Option<PacketCallback>) -> Self {
        HylinkParser {
            state: ParserState::Idle,
            packet: HylinkPacket::new(),
            rx_count: 0,
            expected_len: 0,
            callback,
            stats: ParserStats {
                total_packets: 0,
                crc_errors: 0,
                header_errors: 0,
                length_errors: 0,
            },
        }
    }

    /// Replace the delivery callback
    pub fn set_callback(&mut self, callback: Option<PacketCallback>) {
        self.callback = callback;
    }

    /// Feed a chunk of the byte stream
    ///
    /// Byte-at-a-time and bulk feeding are equivalent; the buffer is not
    /// retained after the call returns.
    pub fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            self.process_byte(byte);
        }
    }

    /// Drop any partial frame and return to Idle
    ///
    /// Statistics are preserved.
    pub fn reset(&mut self) {
        self.state = ParserState::Idle;
        self.rx_count = 0;
        self.expected_len = 0;
    }

    /// Snapshot of the statistics counters
    #[inline]
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    fn process_byte(&mut self, byte: u8) {
        match self.state {
            ParserState::Idle => {
                if byte == SYNC_LO {
                    self.packet.header[0] = byte;
                    self.rx_count = 1;
                    self.state = ParserState::SyncLo;
                }
            }

            ParserState::SyncLo => {
                if byte == SYNC_HI {
                    self.packet.header[1] = byte;
                    self.rx_count = 2;
                    self.state = ParserState::Header;
                } else if byte == SYNC_LO {
                    // Hold here: this byte may be the real frame start.
                } else {
                    self.reset();
                }
            }

            ParserState::Header => {
                self.packet.header[self.rx_count as usize] = byte;
                self.rx_count += 1;

                if self.rx_count as usize == HEADER_SIZE {
                    match self.validate_header() {
                        Err(fault) => {
                            self.stats.header_errors += 1;
                            if matches!(fault, HeaderFault::Length) {
                                self.stats.length_errors += 1;
                            }
                            crate::warn!("hylink header rejected");
                            self.reset();
                        }
                        Ok(payload_len) => {
                            self.expected_len = payload_len;
                            if payload_len == 0 {
                                // Nothing to CRC; the frame is complete.
                                self.packet.payload_len = 0;
                                self.deliver();
                                self.reset();
                            } else {
                                self.rx_count = 0;
                                self.state = ParserState::Body;
                            }
                        }
                    }
                }
            }

            ParserState::Body => {
                self.packet.payload[self.rx_count as usize] = byte;
                self.rx_count += 1;

                if self.rx_count == self.expected_len {
                    self.packet.payload_len = self.expected_len;
                    if crc16(self.packet.payload()) == self.packet.payload_crc() {
                        self.deliver();
                    } else {
                        self.stats.crc_errors += 1;
                        crate::warn!("hylink payload crc mismatch");
                    }
                    self.reset();
                }
            }
        }
    }

    /// Validate a completed header; returns the payload length
    ///
    /// Checks run in order: sync bytes, length range, additive checksum.
    /// The first failure dooms the frame.
    fn validate_header(&self) -> Result<u16, HeaderFault> {
        let header = &self.packet.header;

        if header[0] != SYNC_LO || header[1] != SYNC_HI {
            return Err(HeaderFault::Sync);
        }

        let total_len = u16::from_le_bytes([header[OFF_LEN_LO], header[OFF_LEN_HI]]) as usize;
        if total_len < HEADER_SIZE || total_len > HEADER_SIZE + MAX_PAYLOAD {
            return Err(HeaderFault::Length);
        }

        if header_checksum(&header[..OFF_CHECKSUM]) != header[OFF_CHECKSUM] {
            return Err(HeaderFault::Checksum);
        }

        Ok((total_len - HEADER_SIZE) as u16)
    }

    fn deliver(&mut self) {
        self.stats.total_packets += 1;
        if let Some(callback) = self.callback {
            callback(&self.packet);
        }
    }
}
