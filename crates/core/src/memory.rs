//! PIC18F4620 data memory.
//!
//! | Address Range | Content                         |
//! |---------------|---------------------------------|
//! | 0x000–0xF7F   | General purpose RAM (banks 0–15)|
//! | 0xF80–0xFFF   | Special function registers      |
//!
//! The 1 KB data EEPROM is a separate address space reached through
//! EEADRH:EEADR.

use crate::sfr::*;
use crate::{DATA_SIZE, EEPROM_SIZE};

/// Power-on values of the SFRs that do not reset to zero.
const RESET_VALUES: &[(u16, u8)] = &[
    (TRISA, 0xFF),
    (TRISB, 0xFF),
    (TRISC, 0xFF),
    (TRISD, 0xFF),
    (TRISE, 0x07),
    (IPR1, 0xFF),
    (IPR2, 0xDF),
    (PR2, 0xFF),
    (INTCON2, 0xF5),
    (INTCON3, 0xC0),
    (RCON, 0x1C),
];

pub struct Memory {
    pub data: Vec<u8>,
    pub eeprom: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        let mut mem = Memory {
            data: vec![0u8; DATA_SIZE],
            eeprom: vec![0xFFu8; EEPROM_SIZE],
        };
        mem.reset_sfrs();
        mem
    }

    /// Put every SFR back to its power-on value. RAM and EEPROM are kept.
    pub fn reset_sfrs(&mut self) {
        let base = SFR_BASE as usize;
        self.data[base..base + SFR_SIZE].fill(0);
        for &(addr, value) in RESET_VALUES {
            self.data[addr as usize] = value;
        }
    }

    /// Replace EEPROM contents; short images leave the tail erased (0xFF).
    pub fn load_eeprom(&mut self, image: &[u8]) {
        self.eeprom.fill(0xFF);
        let n = image.len().min(EEPROM_SIZE);
        self.eeprom[..n].copy_from_slice(&image[..n]);
    }

    #[inline(always)]
    pub fn sfr(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}
