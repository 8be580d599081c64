//! Data EEPROM controller model.
//!
//! 1024 bytes addressed through EEADRH:EEADR. Setting EECON1.RD copies the
//! addressed byte into EEDATA. A write needs EECON1.WREN and the unlock
//! sequence 0x55, 0xAA on EECON2 immediately before WR is set; the write
//! completes instantly, clears WR and raises PIR2.EEIF. WR without the
//! unlock sequence is ignored.

use crate::sfr::{Eecon1, Pir2, EEADR, EEADRH, EECON1, EECON2, EEDATA, PIR2};

pub struct EepromCtrl {
    unlock: u8,
    /// True if EEPROM contents changed since the last [`EepromCtrl::take_dirty`].
    dirty: bool,
}

impl EepromCtrl {
    pub fn new() -> Self {
        EepromCtrl { unlock: 0, dirty: false }
    }

    pub fn reset(&mut self) {
        self.unlock = 0;
    }

    fn address(data: &[u8]) -> usize {
        (((data[EEADRH as usize] & 0x03) as usize) << 8) | data[EEADR as usize] as usize
    }

    /// Returns true if addr was handled
    pub fn write(&mut self, addr: u16, value: u8, data: &mut [u8], eeprom: &mut [u8]) -> bool {
        match addr {
            EECON2 => {
                self.unlock = match (self.unlock, value) {
                    (_, 0x55) => 1,
                    (1, 0xAA) => 2,
                    _ => 0,
                };
                true
            }
            EECON1 => {
                let req = Eecon1::from_bits_retain(value);
                let data_space = !req.intersects(Eecon1::EEPGD | Eecon1::CFGS);
                let ea = EepromCtrl::address(data);
                if req.contains(Eecon1::RD) && data_space {
                    data[EEDATA as usize] = eeprom.get(ea).copied().unwrap_or(0xFF);
                }
                if req.contains(Eecon1::WR) && data_space {
                    if req.contains(Eecon1::WREN) && self.unlock == 2 {
                        if let Some(cell) = eeprom.get_mut(ea) {
                            *cell = data[EEDATA as usize];
                            self.dirty = true;
                        }
                        data[PIR2 as usize] |= Pir2::EEIF.bits();
                        log::trace!("eeprom: [{:03X}] <- {:02X}", ea, data[EEDATA as usize]);
                    } else {
                        log::warn!("eeprom: WR at 0x{:03X} ignored (write not unlocked)", ea);
                    }
                }
                self.unlock = 0;
                // RD and WR complete immediately
                data[EECON1 as usize] = value & !(Eecon1::RD | Eecon1::WR).bits();
                true
            }
            _ => false,
        }
    }

    pub fn read(&self, addr: u16) -> Option<u8> {
        // EECON2 is not a physical register
        (addr == EECON2).then_some(0)
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (EepromCtrl, Vec<u8>, Vec<u8>) {
        (EepromCtrl::new(), vec![0u8; 0x1000], vec![0xFFu8; 1024])
    }

    #[test]
    fn test_unlocked_write() {
        let (mut ctl, mut d, mut ee) = setup();
        d[EEADRH as usize] = 0x03;
        d[EEADR as usize] = 0xFF;
        d[EEDATA as usize] = 0x5A;
        ctl.write(EECON1, Eecon1::WREN.bits(), &mut d, &mut ee);
        ctl.write(EECON2, 0x55, &mut d, &mut ee);
        ctl.write(EECON2, 0xAA, &mut d, &mut ee);
        ctl.write(EECON1, (Eecon1::WREN | Eecon1::WR).bits(), &mut d, &mut ee);
        assert_eq!(ee[0x3FF], 0x5A);
        assert_eq!(d[EECON1 as usize], Eecon1::WREN.bits());
        assert_ne!(d[PIR2 as usize] & Pir2::EEIF.bits(), 0);
        assert!(ctl.take_dirty());
        assert!(!ctl.take_dirty());
    }

    #[test]
    fn test_write_without_unlock_ignored() {
        let (mut ctl, mut d, mut ee) = setup();
        d[EEDATA as usize] = 0x00;
        ctl.write(EECON2, 0xAA, &mut d, &mut ee);
        ctl.write(EECON1, (Eecon1::WREN | Eecon1::WR).bits(), &mut d, &mut ee);
        assert_eq!(ee[0], 0xFF);
        assert_eq!(d[PIR2 as usize], 0);
    }

    #[test]
    fn test_read() {
        let (mut ctl, mut d, mut ee) = setup();
        ee[0x102] = 0x33;
        d[EEADRH as usize] = 0x01;
        d[EEADR as usize] = 0x02;
        ctl.write(EECON1, Eecon1::RD.bits(), &mut d, &mut ee);
        assert_eq!(d[EEDATA as usize], 0x33);
        assert_eq!(d[EECON1 as usize], 0);
        assert_eq!(ctl.read(EECON2), Some(0));
    }
}
