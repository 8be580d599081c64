//! Data EEPROM access (1024 bytes).

use crate::error::{Error, Result};
use crate::regs::Registers;
use crate::sfr::{Eecon1, Intcon, EEADR, EEADRH, EECON1, EECON2, EEDATA, INTCON};
use crate::EEPROM_SIZE;

fn check(addr: u16, len: usize) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    let last = addr as usize + len - 1;
    if addr as usize >= EEPROM_SIZE {
        return Err(Error::AddressOutOfRange(addr));
    }
    if last >= EEPROM_SIZE {
        return Err(Error::AddressOutOfRange(last.min(u16::MAX as usize) as u16));
    }
    Ok(())
}

fn select<R: Registers>(regs: &mut R, addr: u16) {
    regs.write(EEADRH, ((addr >> 8) & 0x03) as u8);
    regs.write(EEADR, addr as u8);
    regs.clear_bits(EECON1, (Eecon1::EEPGD | Eecon1::CFGS).bits());
}

/// Program one byte. Interrupts are masked around the unlock sequence and
/// GIE is restored afterwards.
pub fn write_byte<R: Registers>(regs: &mut R, addr: u16, data: u8) -> Result<()> {
    check(addr, 1)?;
    let gie = regs.read_bit(INTCON, Intcon::GIE.bits());
    select(regs, addr);
    regs.write(EEDATA, data);
    regs.set_bits(EECON1, Eecon1::WREN.bits());
    regs.clear_bits(INTCON, Intcon::GIE.bits());
    regs.write(EECON2, 0x55);
    regs.write(EECON2, 0xAA);
    regs.set_bits(EECON1, Eecon1::WR.bits());
    let done = regs.poll_bit(EECON1, Eecon1::WR.bits(), false);
    regs.clear_bits(EECON1, Eecon1::WREN.bits());
    regs.write_bit(INTCON, Intcon::GIE.bits(), gie);
    done
}

pub fn read_byte<R: Registers>(regs: &mut R, addr: u16) -> Result<u8> {
    check(addr, 1)?;
    select(regs, addr);
    regs.set_bits(EECON1, Eecon1::RD.bits());
    Ok(regs.read(EEDATA))
}

/// Fill `buf` from consecutive addresses starting at `addr`.
pub fn read_into<R: Registers>(regs: &mut R, addr: u16, buf: &mut [u8]) -> Result<()> {
    check(addr, buf.len())?;
    for (a, slot) in (addr..).zip(buf.iter_mut()) {
        *slot = read_byte(regs, a)?;
    }
    Ok(())
}

/// Program `data` to consecutive addresses starting at `addr`.
pub fn write_all<R: Registers>(regs: &mut R, addr: u16, data: &[u8]) -> Result<()> {
    check(addr, data.len())?;
    for (a, &b) in (addr..).zip(data) {
        write_byte(regs, a, b)?;
    }
    log::debug!("eeprom: wrote {} bytes at 0x{:03X}", data.len(), addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pic18;

    #[test]
    fn test_write_then_read() {
        let mut pic = Pic18::new();
        write_byte(&mut pic, 0x3FF, 0x5A).unwrap();
        assert_eq!(pic.mem.eeprom[0x3FF], 0x5A);
        assert_eq!(read_byte(&mut pic, 0x3FF).unwrap(), 0x5A);
        assert_eq!(pic.read_data(EECON1) & Eecon1::WREN.bits(), 0);
        assert!(pic.eeprom_dirty);
    }

    #[test]
    fn test_gie_restored() {
        let mut pic = Pic18::new();
        pic.write_data(INTCON, Intcon::GIE.bits());
        write_byte(&mut pic, 7, 1).unwrap();
        assert_ne!(pic.read_data(INTCON) & Intcon::GIE.bits(), 0);
        pic.write_data(INTCON, 0);
        write_byte(&mut pic, 7, 2).unwrap();
        assert_eq!(pic.read_data(INTCON) & Intcon::GIE.bits(), 0);
    }

    #[test]
    fn test_address_range() {
        let mut pic = Pic18::new();
        assert_eq!(write_byte(&mut pic, 1024, 0), Err(Error::AddressOutOfRange(1024)));
        assert_eq!(read_byte(&mut pic, 0xFFFF), Err(Error::AddressOutOfRange(0xFFFF)));
        let mut buf = [0u8; 4];
        assert_eq!(read_into(&mut pic, 1022, &mut buf), Err(Error::AddressOutOfRange(1025)));
    }

    #[test]
    fn test_block_access() {
        let mut pic = Pic18::new();
        write_all(&mut pic, 0x100, b"servo").unwrap();
        let mut buf = [0u8; 6];
        read_into(&mut pic, 0x100, &mut buf).unwrap();
        assert_eq!(&buf, b"servo\xFF");
    }

    #[test]
    fn test_unlock_sequence_required() {
        let mut pic = Pic18::new();
        pic.write_data(EEDATA, 0x11);
        pic.write_data(EECON1, (Eecon1::WREN | Eecon1::WR).bits());
        assert_eq!(pic.mem.eeprom[0], 0xFF);
    }
}
