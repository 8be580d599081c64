use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hal::gpio::{self, Logic, PinConfig};
use crate::regs::Registers;
use crate::sfr::Port;

/// A relay coil driven from one port pin (high = energized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    pub port: Port,
    pub pin: u8,
    pub initial: Logic,
}

impl Relay {
    pub const fn new(port: Port, pin: u8, initial: Logic) -> Self {
        Relay { port, pin, initial }
    }

    fn pin_config(&self) -> PinConfig {
        PinConfig::output(self.port, self.pin, self.initial)
    }

    pub fn init<R: Registers>(&self, regs: &mut R) -> Result<()> {
        gpio::pin_initialize(regs, &self.pin_config())
    }

    pub fn turn_on<R: Registers>(&self, regs: &mut R) -> Result<()> {
        gpio::pin_write_logic(regs, &self.pin_config(), Logic::High)
    }

    pub fn turn_off<R: Registers>(&self, regs: &mut R) -> Result<()> {
        gpio::pin_write_logic(regs, &self.pin_config(), Logic::Low)
    }

    pub fn is_on<R: Registers>(&self, regs: &mut R) -> Result<bool> {
        gpio::pin_read_logic(regs, &self.pin_config()).map(Logic::is_high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::Pic18;

    #[test]
    fn test_relay() {
        let mut pic = Pic18::new();
        let relay = Relay::new(Port::C, 0, Logic::High);
        relay.init(&mut pic).unwrap();
        assert!(pic.pin_level(Port::C, 0));
        relay.turn_off(&mut pic).unwrap();
        assert!(!relay.is_on(&mut pic).unwrap());
        relay.turn_on(&mut pic).unwrap();
        assert!(pic.pin_level(Port::C, 0));
    }

    #[test]
    fn test_relay_bad_pin() {
        let mut pic = Pic18::new();
        let relay = Relay::new(Port::A, 9, Logic::Low);
        assert_eq!(relay.init(&mut pic), Err(Error::InvalidPin { port: Port::A, pin: 9 }));
    }
}
