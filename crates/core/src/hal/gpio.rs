//! Digital I/O on PORTA..PORTE.
//!
//! Directions go to TRISx (1 = input), outputs to LATx, inputs are read from
//! PORTx.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::regs::Registers;
use crate::sfr::Port;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    Output,
    #[default]
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Logic {
    #[default]
    Low,
    High,
}

impl Logic {
    pub fn is_high(self) -> bool {
        self == Logic::High
    }
}

impl From<bool> for Logic {
    fn from(level: bool) -> Self {
        if level { Logic::High } else { Logic::Low }
    }
}

impl core::ops::Not for Logic {
    type Output = Logic;

    fn not(self) -> Logic {
        match self {
            Logic::Low => Logic::High,
            Logic::High => Logic::Low,
        }
    }
}

/// One port pin with its direction and initial level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinConfig {
    pub port: Port,
    pub pin: u8,
    pub direction: Direction,
    pub logic: Logic,
}

impl PinConfig {
    pub const fn output(port: Port, pin: u8, logic: Logic) -> Self {
        PinConfig { port, pin, direction: Direction::Output, logic }
    }

    pub const fn input(port: Port, pin: u8) -> Self {
        PinConfig { port, pin, direction: Direction::Input, logic: Logic::Low }
    }

    fn mask(&self) -> Result<u8> {
        if self.pin >= self.port.width() {
            return Err(Error::InvalidPin { port: self.port, pin: self.pin });
        }
        Ok(1 << self.pin)
    }
}

pub fn pin_direction_init<R: Registers>(regs: &mut R, cfg: &PinConfig) -> Result<()> {
    let mask = cfg.mask()?;
    regs.write_bit(cfg.port.tris(), mask, cfg.direction == Direction::Input);
    Ok(())
}

pub fn pin_get_direction<R: Registers>(regs: &mut R, cfg: &PinConfig) -> Result<Direction> {
    let mask = cfg.mask()?;
    Ok(if regs.read_bit(cfg.port.tris(), mask) { Direction::Input } else { Direction::Output })
}

pub fn pin_write_logic<R: Registers>(regs: &mut R, cfg: &PinConfig, logic: Logic) -> Result<()> {
    let mask = cfg.mask()?;
    regs.write_bit(cfg.port.lat(), mask, logic.is_high());
    Ok(())
}

pub fn pin_read_logic<R: Registers>(regs: &mut R, cfg: &PinConfig) -> Result<Logic> {
    let mask = cfg.mask()?;
    Ok(regs.read_bit(cfg.port.port(), mask).into())
}

pub fn pin_toggle_logic<R: Registers>(regs: &mut R, cfg: &PinConfig) -> Result<()> {
    let mask = cfg.mask()?;
    regs.modify(cfg.port.lat(), |v| v ^ mask);
    Ok(())
}

/// Direction first, then the initial level for outputs.
pub fn pin_initialize<R: Registers>(regs: &mut R, cfg: &PinConfig) -> Result<()> {
    pin_direction_init(regs, cfg)?;
    if cfg.direction == Direction::Output {
        pin_write_logic(regs, cfg, cfg.logic)?;
    }
    Ok(())
}

/// Whole-port direction; each 1 bit makes that pin an input.
pub fn port_direction_init<R: Registers>(regs: &mut R, port: Port, tris: u8) {
    regs.write(port.tris(), tris);
}

pub fn port_get_direction<R: Registers>(regs: &mut R, port: Port) -> u8 {
    regs.read(port.tris())
}

pub fn port_write_logic<R: Registers>(regs: &mut R, port: Port, value: u8) {
    regs.write(port.lat(), value);
}

pub fn port_read_logic<R: Registers>(regs: &mut R, port: Port) -> u8 {
    regs.read(port.port())
}

pub fn port_toggle_logic<R: Registers>(regs: &mut R, port: Port) {
    regs.modify(port.lat(), |v| !v);
}

/// A single pin borrowed as an `embedded-hal` digital pin.
pub struct Pin<'a, R: Registers> {
    regs: &'a mut R,
    cfg: PinConfig,
}

impl<'a, R: Registers> Pin<'a, R> {
    /// Initialize `cfg` and wrap it.
    pub fn new(regs: &'a mut R, cfg: PinConfig) -> Result<Self> {
        pin_initialize(regs, &cfg)?;
        Ok(Pin { regs, cfg })
    }

    pub fn config(&self) -> &PinConfig {
        &self.cfg
    }
}

impl<R: Registers> embedded_hal::digital::ErrorType for Pin<'_, R> {
    type Error = Error;
}

impl<R: Registers> embedded_hal::digital::OutputPin for Pin<'_, R> {
    fn set_low(&mut self) -> Result<()> {
        pin_write_logic(self.regs, &self.cfg, Logic::Low)
    }

    fn set_high(&mut self) -> Result<()> {
        pin_write_logic(self.regs, &self.cfg, Logic::High)
    }
}

impl<R: Registers> embedded_hal::digital::StatefulOutputPin for Pin<'_, R> {
    fn is_set_high(&mut self) -> Result<bool> {
        let mask = self.cfg.mask()?;
        Ok(self.regs.read_bit(self.cfg.port.lat(), mask))
    }

    fn is_set_low(&mut self) -> Result<bool> {
        self.is_set_high().map(|h| !h)
    }

    fn toggle(&mut self) -> Result<()> {
        pin_toggle_logic(self.regs, &self.cfg)
    }
}

impl<R: Registers> embedded_hal::digital::InputPin for Pin<'_, R> {
    fn is_high(&mut self) -> Result<bool> {
        pin_read_logic(self.regs, &self.cfg).map(Logic::is_high)
    }

    fn is_low(&mut self) -> Result<bool> {
        self.is_high().map(|h| !h)
    }
}
