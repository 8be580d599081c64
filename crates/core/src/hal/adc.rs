//! 10-bit ADC driver.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hal::interrupt::{self, Irq, Source};
use crate::regs::Registers;
use crate::sfr::{
    Adcon0, Port, ADCON0, ADCON0_CHS, ADCON1, ADCON1_PCFG, ADCON1_VCFG, ADCON2, ADCON2_ACQT,
    ADCON2_ADCS, ADCON2_ADFM, ADRESH, ADRESL,
};

/// Acquisition time in TAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcqTime {
    Tad0 = 0,
    Tad2,
    #[default]
    Tad4,
    Tad6,
    Tad8,
    Tad12,
    Tad16,
    Tad20,
}

/// Conversion clock source (ADCS encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConvClock {
    FoscDiv2 = 0,
    #[default]
    FoscDiv8 = 1,
    FoscDiv32 = 2,
    Frc = 3,
    FoscDiv4 = 4,
    FoscDiv16 = 5,
    FoscDiv64 = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Channel {
    #[default]
    An0 = 0,
    An1,
    An2,
    An3,
    An4,
    An5,
    An6,
    An7,
    An8,
    An9,
    An10,
    An11,
    An12,
}

impl Channel {
    /// Port pin the channel shares.
    pub fn pin(self) -> (Port, u8) {
        match self {
            Channel::An0 => (Port::A, 0),
            Channel::An1 => (Port::A, 1),
            Channel::An2 => (Port::A, 2),
            Channel::An3 => (Port::A, 3),
            Channel::An4 => (Port::A, 5),
            Channel::An5 => (Port::E, 0),
            Channel::An6 => (Port::E, 1),
            Channel::An7 => (Port::E, 2),
            Channel::An8 => (Port::B, 2),
            Channel::An9 => (Port::B, 3),
            Channel::An10 => (Port::B, 1),
            Channel::An11 => (Port::B, 4),
            Channel::An12 => (Port::B, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoltageRef {
    /// VREF+ on AN3, VREF- on AN2.
    External,
    #[default]
    Supply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultFormat {
    #[default]
    Right,
    Left,
}

/// Analog/digital split of the AN pins (PCFG).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortConfig {
    /// AN0 up to and including the given channel are analog.
    UpTo(Channel),
    AllAnalog,
    AllDigital,
}

impl Default for PortConfig {
    fn default() -> Self {
        PortConfig::UpTo(Channel::An0)
    }
}

impl PortConfig {
    fn pcfg(self) -> u8 {
        match self {
            PortConfig::UpTo(ch) => 0x0E - ch as u8,
            PortConfig::AllAnalog => 0x00,
            PortConfig::AllDigital => 0x0F,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdcConfig {
    pub acquisition: AcqTime,
    pub clock: ConvClock,
    pub channel: Channel,
    pub vref: VoltageRef,
    pub format: ResultFormat,
    pub port_config: PortConfig,
    pub irq: Irq,
}

pub fn init<R: Registers>(regs: &mut R, cfg: &AdcConfig) -> Result<()> {
    regs.clear_bits(ADCON0, Adcon0::ADON.bits());
    regs.write_field(ADCON2, ADCON2_ACQT, cfg.acquisition as u8);
    regs.write_field(ADCON2, ADCON2_ADCS, cfg.clock as u8);
    select_channel(regs, cfg.channel)?;
    regs.write_field(ADCON1, ADCON1_PCFG, cfg.port_config.pcfg());
    interrupt::enable(regs, Source::Adc, cfg.irq);
    regs.write_field(ADCON2, ADCON2_ADFM, (cfg.format == ResultFormat::Right) as u8);
    let vcfg = match cfg.vref {
        VoltageRef::External => 0b11,
        VoltageRef::Supply => 0b00,
    };
    regs.write_field(ADCON1, ADCON1_VCFG, vcfg);
    regs.set_bits(ADCON0, Adcon0::ADON.bits());
    log::debug!("adc: {:?}", cfg);
    Ok(())
}

pub fn deinit<R: Registers>(regs: &mut R) {
    regs.clear_bits(ADCON0, Adcon0::ADON.bits());
    interrupt::disable(regs, Source::Adc);
}

/// Route `channel` to the converter and make its pin an input.
pub fn select_channel<R: Registers>(regs: &mut R, channel: Channel) -> Result<()> {
    regs.write_field(ADCON0, ADCON0_CHS, channel as u8);
    let (port, pin) = channel.pin();
    regs.set_bits(port.tris(), 1 << pin);
    Ok(())
}

pub fn start_conversion<R: Registers>(regs: &mut R) {
    regs.set_bits(ADCON0, Adcon0::GO_DONE.bits());
}

pub fn is_conversion_done<R: Registers>(regs: &mut R) -> bool {
    !regs.read_bit(ADCON0, Adcon0::GO_DONE.bits())
}

/// The 10-bit result, whichever way ADFM justified it.
pub fn conversion_result<R: Registers>(regs: &mut R) -> u16 {
    let high = regs.read(ADRESH) as u16;
    let low = regs.read(ADRESL) as u16;
    let raw = (high << 8) | low;
    if regs.read_field(ADCON2, ADCON2_ADFM) != 0 {
        raw
    } else {
        raw >> 6
    }
}

/// Convert `channel` and wait for the result.
pub fn read_blocking<R: Registers>(regs: &mut R, channel: Channel) -> Result<u16> {
    select_channel(regs, channel)?;
    start_conversion(regs);
    regs.poll_bit(ADCON0, Adcon0::GO_DONE.bits(), false)?;
    Ok(conversion_result(regs))
}

/// Convert `channel`; the ADC interrupt handler picks the result up with
/// [`conversion_result`].
pub fn start_conversion_interrupt<R: Registers>(regs: &mut R, channel: Channel) -> Result<()> {
    select_channel(regs, channel)?;
    start_conversion(regs);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mcu;
    use crate::Pic18;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_init_registers() {
        let mut pic = Pic18::new();
        pic.write_data(Port::A.tris(), 0x00);
        let cfg = AdcConfig {
            acquisition: AcqTime::Tad12,
            clock: ConvClock::FoscDiv16,
            channel: Channel::An2,
            vref: VoltageRef::External,
            format: ResultFormat::Right,
            port_config: PortConfig::UpTo(Channel::An3),
            irq: Irq::Disabled,
        };
        init(&mut pic, &cfg).unwrap();
        assert_eq!(pic.read_data(ADCON0), (2 << 2) | Adcon0::ADON.bits());
        assert_eq!(pic.read_data(ADCON1), 0x30 | 0x0B);
        assert_eq!(pic.read_data(ADCON2), 0x80 | (5 << 3) | 5);
        assert_eq!(pic.read_data(Port::A.tris()), 0x04);
    }

    #[test]
    fn test_read_blocking_both_formats() {
        let mut pic = Pic18::new();
        pic.set_analog_input(1, 0x2C5);
        let mut cfg = AdcConfig { port_config: PortConfig::UpTo(Channel::An1), ..Default::default() };
        init(&mut pic, &cfg).unwrap();
        assert_eq!(read_blocking(&mut pic, Channel::An1).unwrap(), 0x2C5);
        assert!(is_conversion_done(&mut pic));

        cfg.format = ResultFormat::Left;
        init(&mut pic, &cfg).unwrap();
        assert_eq!(read_blocking(&mut pic, Channel::An1).unwrap(), 0x2C5);
        assert_eq!(pic.read_data(ADRESH), 0xB1);
    }

    #[test]
    fn test_channel_pins() {
        assert_eq!(Channel::An4.pin(), (Port::A, 5));
        assert_eq!(Channel::An12.pin(), (Port::B, 0));
        assert_eq!(PortConfig::UpTo(Channel::An12).pcfg(), 0x02);
    }

    #[test]
    fn test_conversion_interrupt() {
        let mut mcu = Mcu::new(Pic18::new());
        mcu.regs.set_analog_input(0, 777);
        let cfg = AdcConfig { irq: Irq::Enabled, ..Default::default() };
        init(&mut mcu, &cfg).unwrap();
        let result = Rc::new(Cell::new(0u16));
        let r = result.clone();
        mcu.attach(Source::Adc, cfg.irq, move |regs: &mut Pic18| r.set(conversion_result(regs)));
        start_conversion_interrupt(&mut mcu, Channel::An0).unwrap();
        assert_eq!(mcu.service_interrupts(), 1);
        assert_eq!(result.get(), 777);
    }

    #[test]
    fn test_deinit() {
        let mut pic = Pic18::new();
        init(&mut pic, &AdcConfig::default()).unwrap();
        deinit(&mut pic);
        assert_eq!(pic.read_data(ADCON0) & Adcon0::ADON.bits(), 0);
    }
}
