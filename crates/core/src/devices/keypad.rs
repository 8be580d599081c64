//! Matrix keypad with four rows driven as outputs and 3 or 4 columns read
//! as inputs.

use crate::error::Result;
use crate::hal::gpio::{self, Direction, Logic, PinConfig};
use crate::regs::Registers;

pub const ROWS: usize = 4;

pub const KEYS_4X3: [[char; 3]; ROWS] = [
    ['1', '2', '3'],
    ['4', '5', '6'],
    ['7', '8', '9'],
    ['*', '0', '#'],
];

pub const KEYS_4X4: [[char; 4]; ROWS] = [
    ['7', '8', '9', '/'],
    ['4', '5', '6', '*'],
    ['1', '2', '3', '-'],
    ['#', '0', '=', '+'],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keypad<const C: usize> {
    pub rows: [PinConfig; ROWS],
    pub columns: [PinConfig; C],
    pub keys: [[char; C]; ROWS],
}

impl Keypad<3> {
    pub fn four_by_three(rows: [PinConfig; ROWS], columns: [PinConfig; 3]) -> Self {
        Keypad { rows, columns, keys: KEYS_4X3 }
    }
}

impl Keypad<4> {
    pub fn four_by_four(rows: [PinConfig; ROWS], columns: [PinConfig; 4]) -> Self {
        Keypad { rows, columns, keys: KEYS_4X4 }
    }
}

impl<const C: usize> Keypad<C> {
    /// Rows become outputs at their configured level, columns inputs.
    pub fn init<R: Registers>(&self, regs: &mut R) -> Result<()> {
        for row in &self.rows {
            gpio::pin_initialize(regs, &PinConfig { direction: Direction::Output, ..*row })?;
        }
        for col in &self.columns {
            gpio::pin_direction_init(regs, &PinConfig { direction: Direction::Input, ..*col })?;
        }
        Ok(())
    }

    /// Drive each row high in turn and look for a high column. When several
    /// keys are held the last one in scan order is reported.
    pub fn scan<R: Registers>(&self, regs: &mut R) -> Result<Option<char>> {
        let mut found = None;
        for (r, row) in self.rows.iter().enumerate() {
            for other in &self.rows {
                gpio::pin_write_logic(regs, other, Logic::Low)?;
            }
            gpio::pin_write_logic(regs, row, Logic::High)?;
            for (c, col) in self.columns.iter().enumerate() {
                if gpio::pin_read_logic(regs, col)?.is_high() {
                    found = Some(self.keys[r][c]);
                }
            }
        }
        if let Some(key) = found {
            log::trace!("keypad: {}", key);
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfr::Port;
    use crate::Pic18;

    fn rows() -> [PinConfig; ROWS] {
        core::array::from_fn(|i| PinConfig::output(Port::B, i as u8, Logic::Low))
    }

    fn attach(pic: &mut Pic18, columns: usize) {
        let rows: Vec<_> = (0..4).map(|i| (Port::B, i)).collect();
        let cols: Vec<_> = (0..columns as u8).map(|i| (Port::B, 4 + i)).collect();
        pic.attach_keypad(&rows, &cols);
    }

    #[test]
    fn test_four_by_three() {
        let mut pic = Pic18::new();
        attach(&mut pic, 3);
        let keypad = Keypad::four_by_three(rows(), core::array::from_fn(|i| PinConfig::input(Port::B, 4 + i as u8)));
        keypad.init(&mut pic).unwrap();
        assert_eq!(pic.read_data(Port::B.tris()), 0xF0);
        assert_eq!(keypad.scan(&mut pic).unwrap(), None);
        pic.press_key(Some((3, 2)));
        assert_eq!(keypad.scan(&mut pic).unwrap(), Some('#'));
        pic.press_key(Some((1, 0)));
        assert_eq!(keypad.scan(&mut pic).unwrap(), Some('4'));
        pic.press_key(None);
        assert_eq!(keypad.scan(&mut pic).unwrap(), None);
    }

    #[test]
    fn test_four_by_four() {
        let mut pic = Pic18::new();
        attach(&mut pic, 4);
        let keypad = Keypad::four_by_four(rows(), core::array::from_fn(|i| PinConfig::input(Port::B, 4 + i as u8)));
        keypad.init(&mut pic).unwrap();
        pic.press_key(Some((0, 3)));
        assert_eq!(keypad.scan(&mut pic).unwrap(), Some('/'));
        pic.press_key(Some((3, 2)));
        assert_eq!(keypad.scan(&mut pic).unwrap(), Some('='));
    }

    #[test]
    fn test_invalid_column_pin() {
        let mut pic = Pic18::new();
        let keypad = Keypad::four_by_three(rows(), [
            PinConfig::input(Port::B, 4),
            PinConfig::input(Port::B, 5),
            PinConfig::input(Port::E, 6),
        ]);
        assert!(keypad.init(&mut pic).is_err());
    }
}
