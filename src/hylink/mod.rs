//! HYlink framed protocol
//!
//! Byte-oriented framing with an 11-byte header, additive header
//! checksum, CRC16-CCITT body check and automatic resynchronization on
//! any validation failure. The parser consumes one byte at a time and
//! never loses the stream; the encoder builds wire-compatible frames.

pub mod crc;
pub mod parser;
pub mod protocol;

pub use crc::{crc16, header_checksum};
pub use parser::{HylinkParser, PacketCallback, ParserStats};
pub use protocol::{
    encode_frame, Command, DeviceId, HylinkError, HylinkPacket, HEADER_SIZE, MAX_PAYLOAD,
    SYNC_HI, SYNC_LO,
};
