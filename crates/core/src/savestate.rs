//! Snapshots of the simulated chip and raw EEPROM images.
//!
//! A snapshot captures the data space, EEPROM, cycle counter, external
//! inputs and the internal state of each peripheral model, serialized with
//! bincode and deflate-compressed.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "P18S"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Chip id          |  u8 (0x01 = PIC18F4620)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```
//!
//! An EEPROM image is the 1024 EEPROM bytes, uncompressed.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SnapshotError;
use crate::EEPROM_SIZE;

const MAGIC: &[u8; 4] = b"P18S";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 9;
pub const CHIP_PIC18F4620: u8 = 0x01;

// ─── Per-component state structs ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdcState {
    pub inputs: Vec<u16>,
    pub conversions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsspState {
    pub buf: u8,
    pub spi_rx: Vec<u8>,
    pub i2c_targets: Vec<u8>,
    pub i2c_rx: Vec<u8>,
    pub expect_address: bool,
    pub addressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerState {
    pub prescale_count: u8,
    pub postscale_count: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CcpState {
    pub output: bool,
    pub edges: u8,
    pub prev_input: bool,
    pub duty_lsb: u8,
}

// ─── Top-level save state ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub cycles: u64,
    pub data: Vec<u8>,
    pub eeprom: Vec<u8>,
    /// External input level of each port.
    pub inputs: [u8; 5],
    pub adc: AdcState,
    pub mssp: MsspState,
    pub timer1: TimerState,
    pub timer3: TimerState,
    pub timer2: TimerState,
    pub ccp1: CcpState,
    pub ccp2: CcpState,
    pub pressed_key: Option<(usize, usize)>,
}

// ─── Encoding ───────────────────────────────────────────────────────────────

/// Header plus compressed payload.
pub fn encode(state: &SaveState, chip: u8) -> Result<Vec<u8>, SnapshotError> {
    let payload = bincode::serialize(state)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(chip);
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Verify magic, version and chip id, then decompress and decode.
pub fn decode(bytes: &[u8], expected_chip: u8) -> Result<SaveState, SnapshotError> {
    if bytes.len() < HEADER_LEN {
        return Err(SnapshotError::Truncated);
    }
    if &bytes[0..4] != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(SnapshotError::Version { found: version, expected: FORMAT_VERSION });
    }
    if bytes[8] != expected_chip {
        return Err(SnapshotError::Chip { found: bytes[8], expected: expected_chip });
    }
    let payload = miniz_oxide::inflate::decompress_to_vec(&bytes[HEADER_LEN..])
        .map_err(|e| SnapshotError::Decompress(format!("{:?}", e)))?;
    Ok(bincode::deserialize(&payload)?)
}

// ─── File I/O ───────────────────────────────────────────────────────────────

pub fn save_to_file(state: &SaveState, chip: u8, path: &Path) -> Result<(), SnapshotError> {
    let bytes = encode(state, chip)?;
    std::fs::write(path, bytes)?;
    log::info!("snapshot saved to {}", path.display());
    Ok(())
}

pub fn load_from_file(path: &Path, expected_chip: u8) -> Result<SaveState, SnapshotError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes, expected_chip)
}

/// Read an EEPROM image. Short files leave the rest erased (0xFF); longer
/// files are truncated.
pub fn load_eeprom_image(path: &Path) -> Result<Vec<u8>, SnapshotError> {
    let mut image = std::fs::read(path)?;
    image.resize(EEPROM_SIZE, 0xFF);
    Ok(image)
}

pub fn save_eeprom_image(path: &Path, image: &[u8]) -> Result<(), SnapshotError> {
    std::fs::write(path, image)?;
    Ok(())
}
