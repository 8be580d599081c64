//! MSSP in I2C mode.
//!
//! SDA is RC4 and SCL is RC3; both are inputs while the module runs. The
//! master clock comes from the baud rate generator:
//! `SSPADD = XTAL_FREQ / (4 * clock_hz) - 1`. In slave modes SSPADD holds
//! the own address as it appears on the bus.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hal::interrupt::{self, Handler, Irq, Source};
use crate::mcu::Mcu;
use crate::regs::Registers;
use crate::sfr::{
    Pir1, Port, Sspcon1, Sspcon2, Sspstat, PIR1, SSPADD, SSPBUF, SSPCON1, SSPCON1_SSPM, SSPCON2,
    SSPSTAT,
};
use crate::XTAL_FREQ;

/// SSPM encodings for the I2C modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum I2cMode {
    Slave7Bit = 0b0110,
    Slave10Bit = 0b0111,
    /// Master, clock = FOSC / (4 * (SSPADD + 1)).
    #[default]
    Master = 0b1000,
    /// Firmware-controlled master, slave idle.
    FirmwareMaster = 0b1011,
    /// 7-bit slave with start and stop interrupts.
    Slave7BitInterrupts = 0b1110,
    /// 10-bit slave with start and stop interrupts.
    Slave10BitInterrupts = 0b1111,
}

impl I2cMode {
    pub fn is_master(self) -> bool {
        matches!(self, I2cMode::Master | I2cMode::FirmwareMaster)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2cConfig {
    pub mode: I2cMode,
    /// Own address in slave modes, as placed in SSPADD.
    pub slave_address: u8,
    /// Slew rate control for 400 kHz operation (clears SMP).
    pub slew_rate_control: bool,
    /// SMBus input levels (CKE).
    pub smbus: bool,
    /// Respond to the general call address in slave modes.
    pub general_call: bool,
    /// Bus clock for [`I2cMode::Master`].
    pub clock_hz: u32,
    pub irq: Irq,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfig {
            mode: I2cMode::Master,
            slave_address: 0,
            slew_rate_control: false,
            smbus: false,
            general_call: false,
            clock_hz: 100_000,
            irq: Irq::Disabled,
        }
    }
}

/// SSPADD reload for a master clock of `clock_hz`.
pub fn baud_reload(clock_hz: u32) -> Result<u8> {
    if clock_hz == 0 {
        return Err(Error::InvalidConfig("i2c clock must be non-zero"));
    }
    let divider = XTAL_FREQ / 4 / clock_hz;
    match divider.checked_sub(1) {
        Some(v) if v <= 0xFF => Ok(v as u8),
        _ => Err(Error::InvalidConfig("i2c clock out of range")),
    }
}

pub fn init<R: Registers>(regs: &mut R, cfg: &I2cConfig) -> Result<()> {
    regs.clear_bits(SSPCON1, Sspcon1::SSPEN.bits());
    regs.write_field(SSPCON1, SSPCON1_SSPM, cfg.mode as u8);
    match cfg.mode {
        I2cMode::Master => regs.write(SSPADD, baud_reload(cfg.clock_hz)?),
        I2cMode::FirmwareMaster => {}
        _ => {
            regs.write_bit(SSPCON2, Sspcon2::GCEN.bits(), cfg.general_call);
            regs.clear_bits(SSPCON1, (Sspcon1::WCOL | Sspcon1::SSPOV).bits());
            regs.set_bits(SSPCON1, Sspcon1::CKP.bits());
            regs.write(SSPADD, cfg.slave_address);
        }
    }
    regs.set_bits(Port::C.tris(), (1 << 4) | (1 << 3));
    regs.write_bit(SSPSTAT, Sspstat::SMP.bits(), !cfg.slew_rate_control);
    regs.write_bit(SSPSTAT, Sspstat::CKE.bits(), cfg.smbus);
    interrupt::enable(regs, Source::Ssp, cfg.irq);
    regs.set_bits(SSPCON1, Sspcon1::SSPEN.bits());
    log::debug!("i2c: {:?}", cfg);
    Ok(())
}

pub fn deinit<R: Registers>(regs: &mut R) {
    interrupt::disable(regs, Source::Ssp);
    regs.clear_bits(SSPCON1, Sspcon1::SSPEN.bits());
}

fn run_condition<R: Registers>(regs: &mut R, bit: Sspcon2) -> Result<()> {
    regs.set_bits(SSPCON2, bit.bits());
    regs.poll_bit(SSPCON2, bit.bits(), false)?;
    regs.clear_bits(PIR1, Pir1::SSPIF.bits());
    Ok(())
}

pub fn master_start<R: Registers>(regs: &mut R) -> Result<()> {
    run_condition(regs, Sspcon2::SEN)?;
    if !regs.read_bit(SSPSTAT, Sspstat::S.bits()) {
        return Err(Error::StartNotDetected);
    }
    Ok(())
}

pub fn master_repeated_start<R: Registers>(regs: &mut R) -> Result<()> {
    run_condition(regs, Sspcon2::RSEN)
}

pub fn master_stop<R: Registers>(regs: &mut R) -> Result<()> {
    run_condition(regs, Sspcon2::PEN)?;
    if !regs.read_bit(SSPSTAT, Sspstat::P.bits()) {
        return Err(Error::StopNotDetected);
    }
    Ok(())
}

/// Transmit one byte. Returns true when the receiver acknowledged it.
pub fn write_byte<R: Registers>(regs: &mut R, byte: u8) -> Result<bool> {
    regs.write(SSPBUF, byte);
    if regs.read_bit(SSPCON1, Sspcon1::WCOL.bits()) {
        return Err(Error::WriteCollision);
    }
    regs.poll_bit(SSPSTAT, Sspstat::BF.bits(), false)?;
    regs.clear_bits(PIR1, Pir1::SSPIF.bits());
    let ack = !regs.read_bit(SSPCON2, Sspcon2::ACKSTAT.bits());
    log::trace!("i2c: {:02X} {}", byte, if ack { "ack" } else { "nack" });
    Ok(ack)
}

/// Receive one byte, then answer with ACK (`ack = true`) or NACK.
pub fn read_byte<R: Registers>(regs: &mut R, ack: bool) -> Result<u8> {
    regs.set_bits(SSPCON2, Sspcon2::RCEN.bits());
    regs.poll_bit(SSPSTAT, Sspstat::BF.bits(), true)?;
    let byte = regs.read(SSPBUF);
    regs.write_bit(SSPCON2, Sspcon2::ACKDT.bits(), !ack);
    run_condition(regs, Sspcon2::ACKEN)?;
    Ok(byte)
}

/// Release the bus after a failed transfer. The transfer's error is
/// returned; a failing stop is only logged.
fn abort<R: Registers>(regs: &mut R, err: Error) -> Error {
    if let Err(stop) = master_stop(regs) {
        log::warn!("i2c: stop after {:?} failed: {:?}", err, stop);
    }
    err
}

/// Start, address, one data byte, stop.
///
/// `address` is the 7-bit target address; it is shifted left and sent with
/// the write bit (R/W = 0), so pass `0x50`, not `0xA0`.
pub fn send_byte<R: Registers>(regs: &mut R, address: u8, data: u8) -> Result<()> {
    master_start(regs)?;
    let acked = write_byte(regs, address << 1)
        .and_then(|ack| if ack { write_byte(regs, data) } else { Ok(false) })
        .map_err(|e| abort(regs, e))?;
    master_stop(regs)?;
    if acked { Ok(()) } else { Err(Error::Nack) }
}

/// Handlers for the interrupt-driven (slave) path.
pub struct I2cHandlers<R> {
    /// Runs on every MSSP event with SCL held low.
    pub on_event: Handler<R>,
    pub on_write_collision: Option<Handler<R>>,
    pub on_receive_overflow: Option<Handler<R>>,
}

/// Install the MSSP interrupt. The handler stretches the clock (CKP = 0),
/// services WCOL and SSPOV, runs `on_event` and releases SCL again.
pub fn attach_interrupt<R: Registers + 'static>(mcu: &mut Mcu<R>, irq: Irq, handlers: I2cHandlers<R>) {
    let I2cHandlers { mut on_event, mut on_write_collision, mut on_receive_overflow } = handlers;
    mcu.attach(Source::Ssp, irq, move |regs: &mut R| {
        regs.clear_bits(SSPCON1, Sspcon1::CKP.bits());
        if regs.read_bit(SSPCON1, Sspcon1::WCOL.bits()) {
            regs.clear_bits(SSPCON1, Sspcon1::WCOL.bits());
            if let Some(h) = on_write_collision.as_mut() {
                h(regs);
            }
        }
        if regs.read_bit(SSPCON1, Sspcon1::SSPOV.bits()) {
            regs.clear_bits(SSPCON1, Sspcon1::SSPOV.bits());
            if let Some(h) = on_receive_overflow.as_mut() {
                h(regs);
            }
        }
        on_event(regs);
        regs.set_bits(SSPCON1, Sspcon1::CKP.bits());
    });
}

/// The MSSP in I2C master mode as an `embedded-hal` bus.
pub struct I2cMaster<'a, R: Registers> {
    regs: &'a mut R,
}

impl<'a, R: Registers> I2cMaster<'a, R> {
    pub fn new(regs: &'a mut R, clock_hz: u32) -> Result<Self> {
        let cfg = I2cConfig { mode: I2cMode::Master, clock_hz, ..Default::default() };
        init(regs, &cfg)?;
        Ok(I2cMaster { regs })
    }

    fn address(&mut self, address: u8, read: bool) -> Result<()> {
        if write_byte(self.regs, (address << 1) | read as u8)? {
            Ok(())
        } else {
            Err(Error::Nack)
        }
    }

    /// Everything after the first start condition. The caller sends the
    /// stop when this fails.
    fn run(&mut self, address: u8, operations: &mut [embedded_hal::i2c::Operation<'_>]) -> Result<()> {
        use embedded_hal::i2c::Operation;

        let mut prev: Option<bool> = None;
        for i in 0..operations.len() {
            let is_read = matches!(operations[i], Operation::Read(_));
            let next_same = operations
                .get(i + 1)
                .is_some_and(|op| matches!(op, Operation::Read(_)) == is_read);
            if prev != Some(is_read) {
                if prev.is_some() {
                    master_repeated_start(self.regs)?;
                }
                self.address(address, is_read)?;
            }
            match &mut operations[i] {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        if !write_byte(self.regs, b)? {
                            return Err(Error::Nack);
                        }
                    }
                }
                Operation::Read(buf) => {
                    let len = buf.len();
                    for (j, slot) in buf.iter_mut().enumerate() {
                        let last = j + 1 == len && !next_same;
                        *slot = read_byte(self.regs, !last)?;
                    }
                }
            }
            prev = Some(is_read);
        }
        Ok(())
    }
}

impl<R: Registers> embedded_hal::i2c::ErrorType for I2cMaster<'_, R> {
    type Error = Error;
}

impl<R: Registers> embedded_hal::i2c::I2c for I2cMaster<'_, R> {
    fn transaction(&mut self, address: u8, operations: &mut [embedded_hal::i2c::Operation<'_>]) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        master_start(self.regs)?;
        match self.run(address, operations) {
            Ok(()) => master_stop(self.regs),
            Err(e) => Err(abort(self.regs, e)),
        }
    }
}
