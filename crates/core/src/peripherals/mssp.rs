//! Master Synchronous Serial Port model (SPI and I2C).
//!
//! Transfers are instant. In SPI master modes a write to SSPBUF shifts the
//! byte out, loads the next queued receive byte (0xFF when the queue is
//! empty), sets BF and raises PIR1.SSPIF. In SPI slave modes the master side
//! is driven with [`Mssp::slave_receive`]. In I2C master mode the SEN, RSEN,
//! PEN, RCEN and ACKEN bits of SSPCON2 run their bus operation immediately,
//! self-clear and raise SSPIF; every bus operation is appended to
//! [`Mssp::events`]. Reading SSPBUF clears BF.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::sfr::{Pir1, Sspcon1, Sspcon2, Sspstat, PIR1, SSPBUF, SSPCON1, SSPCON1_SSPM, SSPCON2, SSPSTAT};

/// One operation observed on the I2C bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusEvent {
    Start,
    RepeatedStart,
    Stop,
    Write(u8),
    Read(u8),
    Ack,
    Nack,
}

pub struct Mssp {
    /// Receive buffer returned by SSPBUF reads.
    pub buf: u8,
    /// Bytes shifted out in SPI modes.
    pub spi_tx: Vec<u8>,
    /// Bytes the SPI peer returns, one per transfer.
    pub spi_rx: VecDeque<u8>,
    /// 7-bit addresses that acknowledge on the I2C bus.
    pub i2c_targets: Vec<u8>,
    /// Bytes returned to RCEN receives.
    pub i2c_rx: VecDeque<u8>,
    pub events: Vec<BusEvent>,
    expect_address: bool,
    addressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Off,
    SpiMaster,
    SpiSlave,
    I2cMaster,
    I2cSlave,
}

impl Mssp {
    pub fn new() -> Self {
        Mssp {
            buf: 0,
            spi_tx: Vec::new(),
            spi_rx: VecDeque::new(),
            i2c_targets: Vec::new(),
            i2c_rx: VecDeque::new(),
            events: Vec::new(),
            expect_address: false,
            addressed: false,
        }
    }

    /// Clears bus state; attached I2C targets stay attached.
    pub fn reset(&mut self) {
        let targets = std::mem::take(&mut self.i2c_targets);
        *self = Mssp::new();
        self.i2c_targets = targets;
    }

    fn mode(data: &[u8]) -> Mode {
        let con1 = data[SSPCON1 as usize];
        if con1 & Sspcon1::SSPEN.bits() == 0 {
            return Mode::Off;
        }
        match SSPCON1_SSPM.get(con1) {
            0x0..=0x3 => Mode::SpiMaster,
            0x4 | 0x5 => Mode::SpiSlave,
            0x8 | 0xB => Mode::I2cMaster,
            0x6 | 0x7 | 0xE | 0xF => Mode::I2cSlave,
            _ => Mode::Off,
        }
    }

    /// Returns true if addr was handled
    pub fn write(&mut self, addr: u16, value: u8, data: &mut [u8]) -> bool {
        match addr {
            SSPSTAT => {
                // only SMP and CKE are writable
                let status = data[SSPSTAT as usize] & 0x3F;
                data[SSPSTAT as usize] = (value & 0xC0) | status;
                true
            }
            SSPBUF => {
                data[SSPBUF as usize] = value;
                match Mssp::mode(data) {
                    Mode::SpiMaster => {
                        self.spi_tx.push(value);
                        self.buf = self.spi_rx.pop_front().unwrap_or(0xFF);
                        data[SSPSTAT as usize] |= Sspstat::BF.bits();
                        data[PIR1 as usize] |= Pir1::SSPIF.bits();
                        log::trace!("spi: tx {:02X} rx {:02X}", value, self.buf);
                    }
                    Mode::SpiSlave => self.spi_tx.push(value),
                    Mode::I2cMaster => self.i2c_transmit(value, data),
                    Mode::I2cSlave => self.events.push(BusEvent::Write(value)),
                    Mode::Off => {}
                }
                true
            }
            SSPCON2 => {
                data[SSPCON2 as usize] = value;
                if Mssp::mode(data) == Mode::I2cMaster {
                    self.i2c_command(data);
                }
                true
            }
            _ => false,
        }
    }

    pub fn read(&mut self, addr: u16, data: &mut [u8]) -> Option<u8> {
        if addr == SSPBUF {
            data[SSPSTAT as usize] &= !Sspstat::BF.bits();
            return Some(self.buf);
        }
        None
    }

    /// A byte clocked in by an external master (SPI slave) or addressed to
    /// us (I2C slave). A byte arriving while BF is still set is lost and
    /// raises SSPOV.
    pub fn slave_receive(&mut self, byte: u8, is_address: bool, data: &mut [u8]) {
        if data[SSPSTAT as usize] & Sspstat::BF.bits() != 0 {
            data[SSPCON1 as usize] |= Sspcon1::SSPOV.bits();
            log::warn!("mssp: receive overflow, byte {:02X} lost", byte);
            return;
        }
        self.buf = byte;
        let stat = &mut data[SSPSTAT as usize];
        *stat |= Sspstat::BF.bits();
        if is_address {
            *stat &= !Sspstat::D_A.bits();
        } else {
            *stat |= Sspstat::D_A.bits();
        }
        data[PIR1 as usize] |= Pir1::SSPIF.bits();
    }

    fn i2c_transmit(&mut self, value: u8, data: &mut [u8]) {
        self.events.push(BusEvent::Write(value));
        let ack = if self.expect_address {
            self.expect_address = false;
            self.addressed = self.i2c_targets.contains(&(value >> 1));
            self.addressed
        } else {
            self.addressed
        };
        let con2 = &mut data[SSPCON2 as usize];
        if ack {
            *con2 &= !Sspcon2::ACKSTAT.bits();
        } else {
            *con2 |= Sspcon2::ACKSTAT.bits();
        }
        data[SSPSTAT as usize] &= !Sspstat::BF.bits();
        data[PIR1 as usize] |= Pir1::SSPIF.bits();
        log::trace!("i2c: wrote {:02X} {}", value, if ack { "ACK" } else { "NACK" });
    }

    fn i2c_command(&mut self, data: &mut [u8]) {
        let con2 = Sspcon2::from_bits_retain(data[SSPCON2 as usize]);
        let stat = SSPSTAT as usize;
        let done = if con2.contains(Sspcon2::SEN) {
            data[stat] = (data[stat] | Sspstat::S.bits()) & !Sspstat::P.bits();
            self.events.push(BusEvent::Start);
            self.expect_address = true;
            Sspcon2::SEN
        } else if con2.contains(Sspcon2::RSEN) {
            data[stat] = (data[stat] | Sspstat::S.bits()) & !Sspstat::P.bits();
            self.events.push(BusEvent::RepeatedStart);
            self.expect_address = true;
            Sspcon2::RSEN
        } else if con2.contains(Sspcon2::PEN) {
            data[stat] = (data[stat] | Sspstat::P.bits()) & !Sspstat::S.bits();
            self.events.push(BusEvent::Stop);
            self.addressed = false;
            Sspcon2::PEN
        } else if con2.contains(Sspcon2::RCEN) {
            self.buf = self.i2c_rx.pop_front().unwrap_or(0xFF);
            self.events.push(BusEvent::Read(self.buf));
            data[stat] |= Sspstat::BF.bits();
            Sspcon2::RCEN
        } else if con2.contains(Sspcon2::ACKEN) {
            let ev = if con2.contains(Sspcon2::ACKDT) { BusEvent::Nack } else { BusEvent::Ack };
            self.events.push(ev);
            Sspcon2::ACKEN
        } else {
            return;
        };
        data[SSPCON2 as usize] &= !done.bits();
        data[PIR1 as usize] |= Pir1::SSPIF.bits();
    }

    pub fn save_state(&self) -> crate::savestate::MsspState {
        crate::savestate::MsspState {
            buf: self.buf,
            spi_rx: self.spi_rx.iter().copied().collect(),
            i2c_targets: self.i2c_targets.clone(),
            i2c_rx: self.i2c_rx.iter().copied().collect(),
            expect_address: self.expect_address,
            addressed: self.addressed,
        }
    }

    pub fn load_state(&mut self, s: &crate::savestate::MsspState) {
        self.buf = s.buf;
        self.spi_rx = s.spi_rx.iter().copied().collect();
        self.i2c_targets = s.i2c_targets.clone();
        self.i2c_rx = s.i2c_rx.iter().copied().collect();
        self.expect_address = s.expect_address;
        self.addressed = s.addressed;
        self.spi_tx.clear();
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(sspm: u8) -> Vec<u8> {
        let mut d = vec![0u8; 0x1000];
        d[SSPCON1 as usize] = Sspcon1::SSPEN.bits() | sspm;
        d
    }

    #[test]
    fn test_spi_master_transfer() {
        let mut d = enabled(0x0);
        let mut m = Mssp::new();
        m.spi_rx.push_back(0x42);
        m.write(SSPBUF, 0x9F, &mut d);
        assert_eq!(m.spi_tx, vec![0x9F]);
        assert_ne!(d[SSPSTAT as usize] & Sspstat::BF.bits(), 0);
        assert_ne!(d[PIR1 as usize] & Pir1::SSPIF.bits(), 0);
        assert_eq!(m.read(SSPBUF, &mut d), Some(0x42));
        assert_eq!(d[SSPSTAT as usize] & Sspstat::BF.bits(), 0);
        // empty queue reads back 0xFF
        m.write(SSPBUF, 0x00, &mut d);
        assert_eq!(m.read(SSPBUF, &mut d), Some(0xFF));
    }

    #[test]
    fn test_sspstat_status_bits_read_only() {
        let mut d = enabled(0x0);
        let mut m = Mssp::new();
        d[SSPSTAT as usize] = Sspstat::BF.bits();
        m.write(SSPSTAT, 0xFF & !Sspstat::BF.bits(), &mut d);
        assert_eq!(d[SSPSTAT as usize], 0xC0 | Sspstat::BF.bits());
    }

    #[test]
    fn test_slave_overflow() {
        let mut d = enabled(0x5);
        let mut m = Mssp::new();
        m.slave_receive(0x11, false, &mut d);
        m.slave_receive(0x22, false, &mut d);
        assert_ne!(d[SSPCON1 as usize] & Sspcon1::SSPOV.bits(), 0);
        assert_eq!(m.read(SSPBUF, &mut d), Some(0x11));
    }

    #[test]
    fn test_i2c_master_sequence() {
        let mut d = enabled(0x8);
        let mut m = Mssp::new();
        m.i2c_targets.push(0x50);
        m.i2c_rx.push_back(0x77);
        m.write(SSPCON2, Sspcon2::SEN.bits(), &mut d);
        assert_ne!(d[SSPSTAT as usize] & Sspstat::S.bits(), 0);
        assert_eq!(d[SSPCON2 as usize] & Sspcon2::SEN.bits(), 0);
        m.write(SSPBUF, 0x50 << 1, &mut d);
        assert_eq!(d[SSPCON2 as usize] & Sspcon2::ACKSTAT.bits(), 0);
        m.write(SSPCON2, Sspcon2::RCEN.bits(), &mut d);
        assert_eq!(m.read(SSPBUF, &mut d), Some(0x77));
        m.write(SSPCON2, Sspcon2::ACKDT.bits() | Sspcon2::ACKEN.bits(), &mut d);
        m.write(SSPCON2, Sspcon2::PEN.bits(), &mut d);
        assert_ne!(d[SSPSTAT as usize] & Sspstat::P.bits(), 0);
        assert_eq!(
            m.events,
            vec![
                BusEvent::Start,
                BusEvent::Write(0xA0),
                BusEvent::Read(0x77),
                BusEvent::Nack,
                BusEvent::Stop,
            ]
        );
    }

    #[test]
    fn test_i2c_unknown_address_nacks() {
        let mut d = enabled(0x8);
        let mut m = Mssp::new();
        m.write(SSPCON2, Sspcon2::SEN.bits(), &mut d);
        m.write(SSPBUF, 0x3C << 1, &mut d);
        assert_ne!(d[SSPCON2 as usize] & Sspcon2::ACKSTAT.bits(), 0);
        m.write(SSPBUF, 0x00, &mut d);
        assert_ne!(d[SSPCON2 as usize] & Sspcon2::ACKSTAT.bits(), 0);
    }
}
