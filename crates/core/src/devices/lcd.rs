//! HD44780-compatible 20x4 character LCD driven over port pins.
//!
//! The controller latches RS and the data lines on the falling edge of EN.
//! With a 4-bit bus only D4..D7 are wired and every byte goes out as two
//! nibbles, high nibble first. Rows and columns are 1-based as printed on
//! the module.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use heapless::String;

use crate::error::{Error, Result};
use crate::hal::gpio::{self, Logic, PinConfig};
use crate::regs::Registers;

pub mod command {
    pub const CLEAR: u8 = 0x01;
    pub const RETURN_HOME: u8 = 0x02;
    /// Increment, no display shift.
    pub const ENTRY_MODE: u8 = 0x06;
    pub const DISPLAY_OFF: u8 = 0x08;
    pub const CURSOR_OFF_DISPLAY_ON: u8 = 0x0C;
    pub const CURSOR_ON_BLINK_OFF: u8 = 0x0E;
    pub const CURSOR_ON_BLINK_ON: u8 = 0x0F;
    pub const SHIFT_LEFT: u8 = 0x18;
    pub const SHIFT_RIGHT: u8 = 0x1C;
    pub const FOUR_BIT_TWO_LINE: u8 = 0x28;
    pub const EIGHT_BIT_TWO_LINE: u8 = 0x38;
    pub const CGRAM_START: u8 = 0x40;
    pub const DDRAM_START: u8 = 0x80;
}

pub const ROWS: u8 = 4;
pub const COLUMNS: u8 = 20;

/// DDRAM address of column 1 on each row.
const ROW_START: [u8; ROWS as usize] = [0x80, 0xC0, 0x94, 0xD4];

/// Data lines: D4..D7 for a 4-bit bus, D0..D7 for an 8-bit bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBus {
    FourBit([PinConfig; 4]),
    EightBit([PinConfig; 8]),
}

impl DataBus {
    fn pins(&self) -> &[PinConfig] {
        match self {
            DataBus::FourBit(p) => p,
            DataBus::EightBit(p) => p,
        }
    }
}

/// Delay provider for targets where the bus needs no settling time, such
/// as the simulated chip.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub struct Lcd<D: DelayNs> {
    pub rs: PinConfig,
    pub en: PinConfig,
    pub bus: DataBus,
    delay: D,
}

impl<D: DelayNs> Lcd<D> {
    pub fn new(rs: PinConfig, en: PinConfig, bus: DataBus, delay: D) -> Self {
        Lcd { rs, en, bus, delay }
    }

    /// Configure the pins, run the power-on sequence for the bus width and
    /// leave the display on, cleared, cursor off, at row 1 column 1.
    pub fn init<R: Registers>(&mut self, regs: &mut R) -> Result<()> {
        gpio::pin_initialize(regs, &PinConfig::output(self.rs.port, self.rs.pin, Logic::Low))?;
        gpio::pin_initialize(regs, &PinConfig::output(self.en.port, self.en.pin, Logic::Low))?;
        for pin in self.bus.pins() {
            gpio::pin_initialize(regs, &PinConfig::output(pin.port, pin.pin, Logic::Low))?;
        }
        self.delay.delay_ms(20);
        match self.bus {
            DataBus::FourBit(_) => {
                for (nibble, wait_us) in [(0x3, 5000), (0x3, 150), (0x3, 150)] {
                    self.write_nibble(regs, nibble)?;
                    self.delay.delay_us(wait_us);
                }
                self.write_nibble(regs, 0x2)?;
                self.delay.delay_us(150);
                self.send_command(regs, command::FOUR_BIT_TWO_LINE)?;
            }
            DataBus::EightBit(_) => {
                for wait_us in [5000, 150, 150] {
                    self.send_command(regs, command::EIGHT_BIT_TWO_LINE)?;
                    self.delay.delay_us(wait_us);
                }
            }
        }
        self.send_command(regs, command::CLEAR)?;
        self.send_command(regs, command::RETURN_HOME)?;
        self.send_command(regs, command::ENTRY_MODE)?;
        self.send_command(regs, command::CURSOR_OFF_DISPLAY_ON)?;
        self.send_command(regs, command::DDRAM_START)?;
        log::debug!("lcd: initialized ({} data lines)", self.bus.pins().len());
        Ok(())
    }

    pub fn send_command<R: Registers>(&mut self, regs: &mut R, cmd: u8) -> Result<()> {
        gpio::pin_write_logic(regs, &self.rs, Logic::Low)?;
        self.write_byte(regs, cmd)?;
        if cmd == command::CLEAR || cmd == command::RETURN_HOME {
            self.delay.delay_ms(2);
        }
        Ok(())
    }

    pub fn send_char<R: Registers>(&mut self, regs: &mut R, data: u8) -> Result<()> {
        gpio::pin_write_logic(regs, &self.rs, Logic::High)?;
        self.write_byte(regs, data)
    }

    pub fn send_char_at<R: Registers>(&mut self, regs: &mut R, row: u8, column: u8, data: u8) -> Result<()> {
        self.set_cursor(regs, row, column)?;
        self.send_char(regs, data)
    }

    pub fn send_str<R: Registers>(&mut self, regs: &mut R, s: &str) -> Result<()> {
        for b in s.bytes() {
            self.send_char(regs, b)?;
        }
        Ok(())
    }

    pub fn send_str_at<R: Registers>(&mut self, regs: &mut R, row: u8, column: u8, s: &str) -> Result<()> {
        self.set_cursor(regs, row, column)?;
        self.send_str(regs, s)
    }

    /// Store an 8-row glyph in CGRAM slot `slot` (0..=7) and print it at
    /// the given position.
    pub fn send_custom_char<R: Registers>(
        &mut self,
        regs: &mut R,
        row: u8,
        column: u8,
        glyph: &[u8; 8],
        slot: u8,
    ) -> Result<()> {
        if slot > 7 {
            return Err(Error::InvalidConfig("CGRAM slot must be 0..=7"));
        }
        self.send_command(regs, command::CGRAM_START + slot * 8)?;
        for &line in glyph {
            self.send_char(regs, line)?;
        }
        self.send_char_at(regs, row, column, slot)
    }

    pub fn set_cursor<R: Registers>(&mut self, regs: &mut R, row: u8, column: u8) -> Result<()> {
        if !(1..=ROWS).contains(&row) || !(1..=COLUMNS).contains(&column) {
            return Err(Error::InvalidPosition { row, column });
        }
        self.send_command(regs, ROW_START[(row - 1) as usize] + column - 1)
    }

    /// Decimal, left aligned and padded to 3 characters.
    pub fn send_u8_at<R: Registers>(&mut self, regs: &mut R, row: u8, column: u8, value: u8) -> Result<()> {
        self.send_padded::<R, 3>(regs, row, column, value)
    }

    /// Decimal, left aligned and padded to 5 characters.
    pub fn send_u16_at<R: Registers>(&mut self, regs: &mut R, row: u8, column: u8, value: u16) -> Result<()> {
        self.send_padded::<R, 5>(regs, row, column, value)
    }

    /// Decimal, left aligned and padded to 10 characters.
    pub fn send_u32_at<R: Registers>(&mut self, regs: &mut R, row: u8, column: u8, value: u32) -> Result<()> {
        self.send_padded::<R, 10>(regs, row, column, value)
    }

    fn send_padded<R: Registers, const N: usize>(
        &mut self,
        regs: &mut R,
        row: u8,
        column: u8,
        value: impl core::fmt::Display,
    ) -> Result<()> {
        let mut s: String<N> = String::new();
        write!(s, "{:<1$}", value, N).map_err(|_| Error::InvalidConfig("number wider than its LCD field"))?;
        self.send_str_at(regs, row, column, &s)
    }

    fn write_byte<R: Registers>(&mut self, regs: &mut R, byte: u8) -> Result<()> {
        match self.bus {
            DataBus::FourBit(_) => {
                self.write_nibble(regs, byte >> 4)?;
                self.write_nibble(regs, byte & 0x0F)?;
            }
            DataBus::EightBit(pins) => {
                for (i, pin) in pins.iter().enumerate() {
                    gpio::pin_write_logic(regs, pin, Logic::from(byte & (1 << i) != 0))?;
                }
                self.pulse_enable(regs)?;
            }
        }
        self.delay.delay_us(50);
        Ok(())
    }

    fn write_nibble<R: Registers>(&mut self, regs: &mut R, nibble: u8) -> Result<()> {
        for (i, pin) in self.bus.pins().iter().take(4).enumerate() {
            gpio::pin_write_logic(regs, pin, Logic::from(nibble & (1 << i) != 0))?;
        }
        self.pulse_enable(regs)
    }

    fn pulse_enable<R: Registers>(&mut self, regs: &mut R) -> Result<()> {
        gpio::pin_write_logic(regs, &self.en, Logic::High)?;
        self.delay.delay_us(5);
        gpio::pin_write_logic(regs, &self.en, Logic::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::LcdWiring;
    use crate::sfr::Port;
    use crate::Pic18;

    fn four_bit(pic: &mut Pic18) -> Lcd<NoDelay> {
        pic.attach_lcd(LcdWiring {
            rs: (Port::D, 0),
            en: (Port::D, 1),
            data: (4..8).map(|b| (Port::D, b)).collect(),
        });
        let data = core::array::from_fn(|i| PinConfig::output(Port::D, 4 + i as u8, Logic::Low));
        Lcd::new(
            PinConfig::output(Port::D, 0, Logic::Low),
            PinConfig::output(Port::D, 1, Logic::Low),
            DataBus::FourBit(data),
            NoDelay,
        )
    }

    fn row(pic: &Pic18, row: usize) -> std::string::String {
        pic.lcd.as_ref().unwrap().row_text(row)
    }

    #[test]
    fn test_four_bit_text() {
        let mut pic = Pic18::new();
        let mut lcd = four_bit(&mut pic);
        lcd.init(&mut pic).unwrap();
        let model = pic.lcd.as_ref().unwrap();
        assert!(model.display_on && model.two_line && !model.cursor_on);
        lcd.send_str(&mut pic, "Hello").unwrap();
        lcd.send_str_at(&mut pic, 4, 18, "end").unwrap();
        lcd.send_char_at(&mut pic, 2, 1, b'>').unwrap();
        assert!(row(&pic, 0).starts_with("Hello "));
        assert!(row(&pic, 1).starts_with("> "));
        assert!(row(&pic, 3).ends_with("end"));
    }

    #[test]
    fn test_eight_bit_text() {
        let mut pic = Pic18::new();
        pic.attach_lcd(LcdWiring {
            rs: (Port::E, 0),
            en: (Port::E, 1),
            data: (0..8).map(|b| (Port::D, b)).collect(),
        });
        let data = core::array::from_fn(|i| PinConfig::output(Port::D, i as u8, Logic::Low));
        let mut lcd = Lcd::new(
            PinConfig::output(Port::E, 0, Logic::Low),
            PinConfig::output(Port::E, 1, Logic::Low),
            DataBus::EightBit(data),
            NoDelay,
        );
        lcd.init(&mut pic).unwrap();
        lcd.send_str_at(&mut pic, 3, 2, "PIC18").unwrap();
        assert_eq!(&row(&pic, 2)[..7], " PIC18 ");
    }

    #[test]
    fn test_numbers_overwrite() {
        let mut pic = Pic18::new();
        let mut lcd = four_bit(&mut pic);
        lcd.init(&mut pic).unwrap();
        lcd.send_u16_at(&mut pic, 1, 1, 65535).unwrap();
        lcd.send_u8_at(&mut pic, 1, 1, 7).unwrap();
        assert_eq!(&row(&pic, 0)[..6], "7  35 ");
        lcd.send_u32_at(&mut pic, 2, 1, 4_000_000_000).unwrap();
        assert_eq!(&row(&pic, 1)[..10], "4000000000");
        lcd.send_u32_at(&mut pic, 2, 1, u32::MAX).unwrap();
        assert_eq!(&row(&pic, 1)[..10], "4294967295");
    }

    #[test]
    fn test_number_too_wide_for_field() {
        let mut pic = Pic18::new();
        let mut lcd = four_bit(&mut pic);
        lcd.init(&mut pic).unwrap();
        lcd.send_str_at(&mut pic, 1, 1, "abc").unwrap();
        assert!(matches!(lcd.send_padded::<_, 3>(&mut pic, 1, 1, 1234u16), Err(Error::InvalidConfig(_))));
        assert_eq!(&row(&pic, 0)[..3], "abc");
    }

    #[test]
    fn test_custom_char() {
        let mut pic = Pic18::new();
        let mut lcd = four_bit(&mut pic);
        lcd.init(&mut pic).unwrap();
        let bell = [0x04, 0x0E, 0x0E, 0x0E, 0x1F, 0x00, 0x04, 0x00];
        lcd.send_custom_char(&mut pic, 1, 3, &bell, 2).unwrap();
        let model = pic.lcd.as_ref().unwrap();
        assert_eq!(model.glyph(2), bell);
        assert_eq!(model.row_bytes(0)[2], 2);
        assert!(lcd.send_custom_char(&mut pic, 1, 1, &bell, 8).is_err());
    }

    #[test]
    fn test_cursor_bounds() {
        let mut pic = Pic18::new();
        let mut lcd = four_bit(&mut pic);
        lcd.init(&mut pic).unwrap();
        assert_eq!(lcd.set_cursor(&mut pic, 0, 1), Err(Error::InvalidPosition { row: 0, column: 1 }));
        assert_eq!(lcd.set_cursor(&mut pic, 5, 1), Err(Error::InvalidPosition { row: 5, column: 1 }));
        assert_eq!(lcd.set_cursor(&mut pic, 1, 21), Err(Error::InvalidPosition { row: 1, column: 21 }));
        lcd.set_cursor(&mut pic, 4, 20).unwrap();
        assert_eq!(pic.lcd.as_ref().unwrap().address(), 0x54 + 19);
    }
}
