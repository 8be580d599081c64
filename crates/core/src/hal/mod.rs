//! On-chip peripheral drivers.
//!
//! Every driver is a set of free functions over a [`crate::Registers`]
//! backend, configured from a plain `Copy` record. Drivers that enable an
//! interrupt only program the enable/priority bits; the handler itself is
//! installed with [`crate::Mcu::attach`].
//!
//! - [`gpio`]: pin and port direction/logic, `embedded-hal` digital pins
//! - [`interrupt`]: interrupt sources, enable bits, dispatcher
//! - [`adc`]: 10-bit ADC
//! - [`spi`]: MSSP in SPI master/slave mode, `embedded-hal` SPI bus
//! - [`i2c`]: MSSP in I2C master/slave mode, `embedded-hal` I2C bus
//! - [`ccp`]: capture, compare and PWM
//! - [`timer`]: Timer1/Timer3 and Timer2
//! - [`eeprom`]: data EEPROM

pub mod gpio;
pub mod interrupt;
pub mod adc;
pub mod spi;
pub mod i2c;
pub mod ccp;
pub mod timer;
pub mod eeprom;
