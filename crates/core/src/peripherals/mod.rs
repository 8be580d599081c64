//! PIC18F4620 peripheral models for the simulated chip.
//!
//! Each model intercepts the SFR addresses it owns: `write` returns true when
//! the address was handled, `read` returns `Some` for registers whose reads
//! are computed or have side effects. Everything else lands in the plain
//! data array.
//!
//! - [`Ports`]: external input levels, PORTx writes redirected to LATx
//! - [`Adc`]: 10-bit converter with settable analog inputs
//! - [`Mssp`]: SPI master/slave and I2C master with a bus-event log
//! - [`EepromCtrl`]: data EEPROM with the 0x55/0xAA unlock sequence
//! - [`Timer16`]: Timer1 and Timer3
//! - [`Timer2`]: 8-bit period timer (PWM time base)
//! - [`Ccp`]: capture / compare / PWM modules
//! - [`KeyMatrix`]: row/column key matrix wired to port pins
//! - [`Hd44780`]: character LCD controller wired to port pins

mod ports;
mod adc;
mod mssp;
mod eeprom;
mod timers;
mod ccp;
mod keymatrix;
mod hd44780;

pub use ports::Ports;
pub use adc::{Adc, ADC_CHANNELS};
pub use mssp::{BusEvent, Mssp};
pub use eeprom::EepromCtrl;
pub use timers::{Timer16, Timer16Addrs, Timer2};
pub use ccp::{Ccp, CcpAddrs, CcpEvent};
pub use keymatrix::KeyMatrix;
pub use hd44780::{Hd44780, LcdWiring, LCD_COLUMNS, LCD_ROWS};
