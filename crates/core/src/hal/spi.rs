//! MSSP in SPI mode.
//!
//! Master pins: SDI (RC4) input, SCK (RC3), SS (RA5) and SDO (RC5)
//! outputs. Slave pins: SCK and SS become inputs, SDO stays an output.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hal::interrupt::{self, Irq, Source};
use crate::regs::Registers;
use crate::sfr::{Pir1, Port, Sspcon1, Sspstat, PIR1, SSPBUF, SSPCON1, SSPCON1_SSPM, SSPSTAT};

/// Idle level of SCK (CKP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockPolarity {
    #[default]
    IdleLow,
    IdleHigh,
}

/// Which SCK edge shifts data out (CKE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockPhase {
    /// CKE = 0: transmit on the transition from idle to active.
    #[default]
    TransmitOnLeading,
    /// CKE = 1: transmit on the transition from active to idle.
    TransmitOnTrailing,
}

/// Master input sample point (SMP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplePoint {
    #[default]
    Middle,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClockRate {
    #[default]
    FoscDiv4 = 0,
    FoscDiv16 = 1,
    FoscDiv64 = 2,
    Tmr2Div2 = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlaveMode {
    /// SS pin controls the slave.
    #[default]
    SsEnabled = 4,
    /// SS pin is free for general I/O.
    SsDisabled = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MasterConfig {
    pub polarity: ClockPolarity,
    pub phase: ClockPhase,
    pub sample: SamplePoint,
    pub rate: ClockRate,
    pub irq: Irq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlaveConfig {
    pub polarity: ClockPolarity,
    pub phase: ClockPhase,
    pub mode: SlaveMode,
    pub irq: Irq,
}

fn configure_clock<R: Registers>(regs: &mut R, polarity: ClockPolarity, phase: ClockPhase, sample: SamplePoint) {
    regs.write_bit(SSPCON1, Sspcon1::CKP.bits(), polarity == ClockPolarity::IdleHigh);
    regs.write_bit(SSPSTAT, Sspstat::CKE.bits(), phase == ClockPhase::TransmitOnTrailing);
    regs.write_bit(SSPSTAT, Sspstat::SMP.bits(), sample == SamplePoint::End);
}

pub fn init_master<R: Registers>(regs: &mut R, cfg: &MasterConfig) {
    regs.clear_bits(SSPCON1, Sspcon1::SSPEN.bits());
    regs.set_bits(Port::C.tris(), 1 << 4);
    regs.clear_bits(Port::C.tris(), (1 << 3) | (1 << 5));
    regs.clear_bits(Port::A.tris(), 1 << 5);
    interrupt::enable(regs, Source::Ssp, cfg.irq);
    configure_clock(regs, cfg.polarity, cfg.phase, cfg.sample);
    regs.write_field(SSPCON1, SSPCON1_SSPM, cfg.rate as u8);
    regs.set_bits(SSPCON1, Sspcon1::SSPEN.bits());
    log::debug!("spi: master {:?}", cfg);
}

pub fn init_slave<R: Registers>(regs: &mut R, cfg: &SlaveConfig) {
    regs.clear_bits(SSPCON1, Sspcon1::SSPEN.bits());
    regs.set_bits(Port::C.tris(), (1 << 4) | (1 << 3));
    regs.clear_bits(Port::C.tris(), 1 << 5);
    regs.set_bits(Port::A.tris(), 1 << 5);
    interrupt::enable(regs, Source::Ssp, cfg.irq);
    // SMP must be clear in slave mode
    configure_clock(regs, cfg.polarity, cfg.phase, SamplePoint::Middle);
    regs.write_field(SSPCON1, SSPCON1_SSPM, cfg.mode as u8);
    regs.set_bits(SSPCON1, Sspcon1::SSPEN.bits());
    log::debug!("spi: slave {:?}", cfg);
}

pub fn deinit_master<R: Registers>(regs: &mut R) {
    regs.clear_bits(SSPCON1, Sspcon1::SSPEN.bits());
    interrupt::disable(regs, Source::Ssp);
}

pub fn deinit_slave<R: Registers>(regs: &mut R) {
    deinit_master(regs);
}

/// Wait for a received byte and return it.
pub fn read_byte_blocking<R: Registers>(regs: &mut R) -> Result<u8> {
    regs.poll_bit(SSPSTAT, Sspstat::BF.bits(), true)?;
    Ok(regs.read(SSPBUF))
}

/// Return the received byte if a transfer has completed, `NotReady`
/// otherwise.
pub fn read_byte_nonblocking<R: Registers>(regs: &mut R) -> Result<u8> {
    if !regs.read_bit(PIR1, Pir1::SSPIF.bits()) {
        return Err(Error::NotReady);
    }
    regs.clear_bits(PIR1, Pir1::SSPIF.bits());
    Ok(regs.read(SSPBUF))
}

/// Shift one byte out and return the byte shifted in.
pub fn transfer_byte<R: Registers>(regs: &mut R, byte: u8) -> Result<u8> {
    regs.write(SSPBUF, byte);
    if regs.read_bit(SSPCON1, Sspcon1::WCOL.bits()) {
        return Err(Error::WriteCollision);
    }
    regs.poll_bit(SSPSTAT, Sspstat::BF.bits(), true)?;
    regs.clear_bits(PIR1, Pir1::SSPIF.bits());
    let rx = regs.read(SSPBUF);
    log::trace!("spi: {:02X} -> {:02X}", byte, rx);
    Ok(rx)
}

/// Write a byte and wait for the transfer; the received byte is discarded.
pub fn write_byte_blocking<R: Registers>(regs: &mut R, byte: u8) -> Result<()> {
    transfer_byte(regs, byte).map(|_| ())
}

/// Start a transfer without waiting for it. Fails with `WriteCollision`
/// when the hardware rejected the write.
pub fn write_byte_nonblocking<R: Registers>(regs: &mut R, byte: u8) -> Result<()> {
    regs.clear_bits(PIR1, Pir1::SSPIF.bits());
    regs.write(SSPBUF, byte);
    if regs.read_bit(SSPCON1, Sspcon1::WCOL.bits()) {
        return Err(Error::WriteCollision);
    }
    Ok(())
}

pub fn write_bytes_blocking<R: Registers>(regs: &mut R, bytes: &[u8]) -> Result<()> {
    bytes.iter().try_for_each(|&b| write_byte_blocking(regs, b))
}

pub fn write_bytes_nonblocking<R: Registers>(regs: &mut R, bytes: &[u8]) -> Result<()> {
    bytes.iter().try_for_each(|&b| write_byte_nonblocking(regs, b))
}

pub fn overflow_detected<R: Registers>(regs: &mut R) -> bool {
    regs.read_bit(SSPCON1, Sspcon1::SSPOV.bits())
}

pub fn clear_overflow<R: Registers>(regs: &mut R) {
    regs.clear_bits(SSPCON1, Sspcon1::SSPOV.bits());
}

pub fn collision_detected<R: Registers>(regs: &mut R) -> bool {
    regs.read_bit(SSPCON1, Sspcon1::WCOL.bits())
}

pub fn clear_collision<R: Registers>(regs: &mut R) {
    regs.clear_bits(SSPCON1, Sspcon1::WCOL.bits());
}

/// The MSSP in SPI master mode as an `embedded-hal` bus.
pub struct SpiMaster<'a, R: Registers> {
    regs: &'a mut R,
}

impl<'a, R: Registers> SpiMaster<'a, R> {
    pub fn new(regs: &'a mut R, cfg: &MasterConfig) -> Self {
        init_master(regs, cfg);
        SpiMaster { regs }
    }
}

impl<R: Registers> embedded_hal::spi::ErrorType for SpiMaster<'_, R> {
    type Error = Error;
}

impl<R: Registers> embedded_hal::spi::SpiBus<u8> for SpiMaster<'_, R> {
    fn read(&mut self, words: &mut [u8]) -> Result<()> {
        for w in words {
            *w = transfer_byte(self.regs, 0xFF)?;
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<()> {
        write_bytes_blocking(self.regs, words)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<()> {
        for i in 0..read.len().max(write.len()) {
            let rx = transfer_byte(self.regs, write.get(i).copied().unwrap_or(0xFF))?;
            if let Some(slot) = read.get_mut(i) {
                *slot = rx;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<()> {
        for w in words {
            *w = transfer_byte(self.regs, *w)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
