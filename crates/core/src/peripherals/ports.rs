//! GPIO port model.
//!
//! PORTx reads are composed by [`crate::Pic18::port_levels`]: output pins
//! (TRIS bit 0) return the latch, input pins return the external level.
//! Writes to PORTx land in LATx as on the real part.

use crate::sfr::{Port, LATA, PORTA, PORTE, TRISA, TRISE};

pub struct Ports {
    /// External input level per port, as seen on pins configured as inputs.
    pub input: [u8; 5],
}

impl Ports {
    pub fn new() -> Self {
        Ports { input: [0; 5] }
    }

    pub fn reset(&mut self) {
        *self = Ports::new();
    }

    /// Returns true if addr was handled
    pub fn write(&mut self, addr: u16, value: u8, data: &mut [u8]) -> bool {
        match addr {
            PORTA..=PORTE => {
                let port = Port::ALL[(addr - PORTA) as usize];
                data[(LATA + port.index() as u16) as usize] = value & width_mask(port);
                true
            }
            TRISA..=TRISE => {
                let port = Port::ALL[(addr - TRISA) as usize];
                data[addr as usize] = value & width_mask(port);
                true
            }
            _ => false,
        }
    }

    pub fn set_input(&mut self, port: Port, pin: u8, level: bool) {
        let bit = 1 << pin;
        if level {
            self.input[port.index()] |= bit;
        } else {
            self.input[port.index()] &= !bit;
        }
    }

    /// Pin level given the driven (latch) level, the input level and TRIS.
    #[inline]
    pub fn merge(driven: u8, input: u8, tris: u8) -> u8 {
        (driven & !tris) | (input & tris)
    }
}

#[inline]
fn width_mask(port: Port) -> u8 {
    ((1u16 << port.width()) - 1) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfr::{LATE, PORTC};

    #[test]
    fn test_port_write_goes_to_latch() {
        let mut data = vec![0u8; 0x1000];
        let mut ports = Ports::new();
        assert!(ports.write(PORTC, 0xA5, &mut data));
        assert_eq!(data[(LATA + 2) as usize], 0xA5);
        assert!(ports.write(PORTE, 0xFF, &mut data));
        assert_eq!(data[LATE as usize], 0x07);
        assert!(!ports.write(0xFC2, 0x01, &mut data));
    }

    #[test]
    fn test_merge() {
        // low nibble outputs driven 0b0101, high nibble inputs reading 0b1100
        assert_eq!(Ports::merge(0b0000_0101, 0b1100_1111, 0xF0), 0b1100_0101);
    }
}
