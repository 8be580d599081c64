//! Board devices built on the GPIO and CCP drivers.

pub mod keypad;
pub mod lcd;
pub mod relay;
pub mod servo;

pub use keypad::Keypad;
pub use lcd::Lcd;
pub use relay::Relay;
pub use servo::{Servo, ServoConfig};
