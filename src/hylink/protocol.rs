//! HYlink wire format
//!
//! Frame layout (little-endian multi-byte fields):
//!
//! ```text
//! offset 0   SYNC_LO (0xBB)
//! offset 1   SYNC_HI (0xAA)
//! offset 2-3 total length, header + payload, 11..=11+1024
//! offset 4   device id
//! offset 5   sequence number
//! offset 6   command code
//! offset 7   reserved (0)
//! offset 8-9 CRC16-CCITT of the payload bytes
//! offset 10  additive checksum of offsets 0..=9
//! offset 11.. payload
//! ```

use crate::kern::config::CFG_MAX_PAYLOAD_BYTES;

use crate::hylink::crc::{crc16, header_checksum};

/// First sync byte on the wire
pub const SYNC_LO: u8 = 0xBB;
/// Second sync byte on the wire
pub const SYNC_HI: u8 = 0xAA;
/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 11;
/// Largest payload a frame may carry
pub const MAX_PAYLOAD: usize = CFG_MAX_PAYLOAD_BYTES;

// Header field offsets
pub(crate) const OFF_SYNC_LO: usize = 0;
pub(crate) const OFF_SYNC_HI: usize = 1;
pub(crate) const OFF_LEN_LO: usize = 2;
pub(crate) const OFF_LEN_HI: usize = 3;
pub(crate) const OFF_DEVICE_ID: usize = 4;
pub(crate) const OFF_SEQUENCE: usize = 5;
pub(crate) const OFF_COMMAND: usize = 6;
pub(crate) const OFF_RESERVED: usize = 7;
pub(crate) const OFF_CRC_LO: usize = 8;
pub(crate) const OFF_CRC_HI: usize = 9;
pub(crate) const OFF_CHECKSUM: usize = 10;

/// Source device identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceId {
    Broadcast = 0,
    GroundStation = 1,
    Cockpit = 2,
    FlightControl = 5,
    IoCircuit = 6,
    Aircraft = 10,
    Recorder = 15,
    Ins = 45,
    Mems = 50,
    Datalink = 55,
    RadarAlt = 60,
    Bms = 65,
    NavLight = 70,
}

impl DeviceId {
    /// Look up a wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => DeviceId::Broadcast,
            1 => DeviceId::GroundStation,
            2 => DeviceId::Cockpit,
            5 => DeviceId::FlightControl,
            6 => DeviceId::IoCircuit,
            10 => DeviceId::Aircraft,
            15 => DeviceId::Recorder,
            45 => DeviceId::Ins,
            50 => DeviceId::Mems,
            55 => DeviceId::Datalink,
            60 => DeviceId::RadarAlt,
            65 => DeviceId::Bms,
            70 => DeviceId::NavLight,
            _ => return None,
        })
    }
}

/// Command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    // System commands (0x00-0x0F)
    Heartbeat = 0x00,
    Request = 0x01,
    Ack = 0x02,
    Handshake = 0x0E,
    SystemTime = 0x0F,

    // Flight data (0x10-0x1F)
    PositionData = 0x10,
    AttitudeData = 0x11,
    VelocityNed = 0x13,
    AirspeedData = 0x15,

    // Control (0x20-0x2F)
    JoystickControl = 0x20,

    // Battery (0x30-0x3F)
    BatterySystem = 0x30,

    // Fused payloads (0xF0-0xFF)
    FusionPacket = 0xFE,
}

impl Command {
    /// Look up a wire value
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => Command::Heartbeat,
            0x01 => Command::Request,
            0x02 => Command::Ack,
            0x0E => Command::Handshake,
            0x0F => Command::SystemTime,
            0x10 => Command::PositionData,
            0x11 => Command::AttitudeData,
            0x13 => Command::VelocityNed,
            0x15 => Command::AirspeedData,
            0x20 => Command::JoystickControl,
            0x30 => Command::BatterySystem,
            0xFE => Command::FusionPacket,
            _ => return None,
        })
    }
}

/// Encoder errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HylinkError {
    /// Payload exceeds [`MAX_PAYLOAD`]
    PayloadTooLong,
    /// Output buffer cannot hold header + payload
    BufferTooSmall,
}

/// A complete received frame: raw header plus payload scratch
///
/// Handed to the delivery callback by reference; the buffer is reused
/// for the next frame as soon as the callback returns, so consumers must
/// copy anything they keep.
pub struct HylinkPacket {
    pub(crate) header: [u8; HEADER_SIZE],
    pub(crate) payload: [u8; MAX_PAYLOAD],
    pub(crate) payload_len: u16,
}

impl HylinkPacket {
    pub(crate) const fn new() -> Self {
        HylinkPacket {
            header: [0; HEADER_SIZE],
            payload: [0; MAX_PAYLOAD],
            payload_len: 0,
        }
    }

    /// Total frame length from the header, header + payload
    #[inline]
    pub fn total_length(&self) -> u16 {
        u16::from_le_bytes([self.header[OFF_LEN_LO], self.header[OFF_LEN_HI]])
    }

    /// Source device identifier
    #[inline]
    pub fn device_id(&self) -> u8 {
        self.header[OFF_DEVICE_ID]
    }

    /// Frame sequence number
    #[inline]
    pub fn sequence(&self) -> u8 {
        self.header[OFF_SEQUENCE]
    }

    /// Command code
    #[inline]
    pub fn command(&self) -> u8 {
        self.header[OFF_COMMAND]
    }

    /// CRC16 the sender computed over the payload
    #[inline]
    pub fn payload_crc(&self) -> u16 {
        u16::from_le_bytes([self.header[OFF_CRC_LO], self.header[OFF_CRC_HI]])
    }

    /// Additive checksum of the first ten header bytes
    #[inline]
    pub fn header_checksum(&self) -> u8 {
        self.header[OFF_CHECKSUM]
    }

    /// Read-only view of the payload bytes
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_len as usize]
    }
}

/// Build a complete wire frame into `out`
///
/// Fills in the length field, the payload CRC and the header checksum,
/// then appends the payload. Returns the number of bytes written.
pub fn encode_frame(
    device_id: u8,
    sequence: u8,
    command: u8,
    payload: &[u8],
    out: &mut [u8],
) -> Result<usize, HylinkError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(HylinkError::PayloadTooLong);
    }
    let total = HEADER_SIZE + payload.len();
    if out.len() < total {
        return Err(HylinkError::BufferTooSmall);
    }

    let len = total as u16;
    out[OFF_SYNC_LO] = SYNC_LO;
    out[OFF_SYNC_HI] = SYNC_HI;
    out[OFF_LEN_LO] = len.to_le_bytes()[0];
    out[OFF_LEN_HI] = len.to_le_bytes()[1];
    out[OFF_DEVICE_ID] = device_id;
    out[OFF_SEQUENCE] = sequence;
    out[OFF_COMMAND] = command;
    out[OFF_RESERVED] = 0;

    let crc = crc16(payload);
    out[OFF_CRC_LO] = crc.to_le_bytes()[0];
    out[OFF_CRC_HI] = crc.to_le_bytes()[1];

    out[OFF_CHECKSUM] = header_checksum(&out[..OFF_CHECKSUM]);

    out[HEADER_SIZE..total].copy_from_slice(payload);
    Ok(total)
}
