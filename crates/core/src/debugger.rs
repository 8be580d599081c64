//! Debugging aids for the simulated chip.
//!
//! - **RAM viewer**: hex + ASCII dump of any data-space region
//! - **SFR viewer**: named special function registers with their values
//! - **Watchpoints**: trigger on data-space reads/writes, by address or by
//!   SFR name
//!
//! [`crate::Pic18`] checks watchpoints in `read_data` / `write_data` while
//! any are set.

use crate::sfr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Write,
    Read,
    ReadWrite,
}

impl WatchKind {
    fn matches(self, access: WatchKind) -> bool {
        self == WatchKind::ReadWrite || self == access
    }
}

#[derive(Debug, Clone)]
pub struct Watchpoint {
    pub addr: u16,
    pub kind: WatchKind,
    /// Only writes of this value trigger.
    pub value_match: Option<u8>,
    pub hits: u64,
    pub enabled: bool,
}

/// First watchpoint that fired since the last [`Debugger::take_hit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHit {
    pub index: usize,
    pub addr: u16,
    /// Value before the access (reads: the value read).
    pub old_val: u8,
    pub new_val: u8,
    pub access: WatchKind,
}

pub struct Debugger {
    pub watchpoints: Vec<Watchpoint>,
    pub watch_hit: Option<WatchHit>,
}

impl Debugger {
    pub fn new() -> Self {
        Debugger { watchpoints: Vec::new(), watch_hit: None }
    }

    /// Returns the new watchpoint's index.
    pub fn add_watchpoint(&mut self, addr: u16, kind: WatchKind) -> usize {
        self.watchpoints.push(Watchpoint { addr, kind, value_match: None, hits: 0, enabled: true });
        self.watchpoints.len() - 1
    }

    /// Watch an SFR by name (`"SSPBUF"`, `"ccp1con"`). `None` if the name is
    /// unknown.
    pub fn watch_sfr(&mut self, name: &str, kind: WatchKind) -> Option<usize> {
        sfr::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|&(addr, _)| self.add_watchpoint(addr, kind))
    }

    pub fn remove_watchpoint(&mut self, idx: usize) -> bool {
        if idx < self.watchpoints.len() {
            self.watchpoints.remove(idx);
            true
        } else {
            false
        }
    }

    /// Call before the write lands in data space.
    pub fn check_write(&mut self, addr: u16, old_val: u8, new_val: u8) {
        self.check(addr, old_val, new_val, WatchKind::Write);
    }

    pub fn check_read(&mut self, addr: u16, val: u8) {
        self.check(addr, val, val, WatchKind::Read);
    }

    fn check(&mut self, addr: u16, old_val: u8, new_val: u8, access: WatchKind) {
        for (index, wp) in self.watchpoints.iter_mut().enumerate() {
            if !wp.enabled || wp.addr != addr || !wp.kind.matches(access) {
                continue;
            }
            if access == WatchKind::Write && wp.value_match.is_some_and(|v| v != new_val) {
                continue;
            }
            wp.hits += 1;
            if self.watch_hit.is_none() {
                log::debug!("watchpoint {} hit: {} {:02X} -> {:02X}", index, label(addr), old_val, new_val);
                self.watch_hit = Some(WatchHit { index, addr, old_val, new_val, access });
            }
        }
    }

    pub fn take_hit(&mut self) -> Option<WatchHit> {
        self.watch_hit.take()
    }

    pub fn list_watchpoints(&self) -> String {
        if self.watchpoints.is_empty() {
            return "No watchpoints set.\n".into();
        }
        let mut s = String::new();
        for (i, wp) in self.watchpoints.iter().enumerate() {
            let k = match wp.kind {
                WatchKind::Write => "W",
                WatchKind::Read => "R",
                WatchKind::ReadWrite => "RW",
            };
            let en = if wp.enabled { " " } else { "!" };
            let vm = wp.value_match.map(|v| format!(" =0x{:02X}", v)).unwrap_or_default();
            s.push_str(&format!("  [{}]{} {:>8} {:<2} hits={}{}\n", i, en, label(wp.addr), k, wp.hits, vm));
        }
        s
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

/// SFR name, or the hex address for GPRs.
fn label(addr: u16) -> String {
    sfr::name(addr).map(str::to_string).unwrap_or_else(|| format!("0x{:03X}", addr))
}

// ─── RAM viewer ─────────────────────────────────────────────────────────────

/// 16 bytes per line: address, hex, ASCII.
pub fn dump_ram(data: &[u8], start: u16, length: u16) -> String {
    let mut s = String::new();
    let end = (start as usize + length as usize).min(data.len());
    let mut addr = start as usize;
    while addr < end {
        let line_end = (addr + 16).min(end);
        s.push_str(&format!("{:03X}: ", addr));
        for i in addr..addr + 16 {
            if i < line_end {
                s.push_str(&format!("{:02X} ", data[i]));
            } else {
                s.push_str("   ");
            }
            if i == addr + 7 {
                s.push(' ');
            }
        }
        s.push(' ');
        s.extend(data[addr..line_end].iter().map(|&c| if (0x20..0x7F).contains(&c) { c as char } else { '.' }));
        s.push('\n');
        addr += 16;
    }
    s
}

// ─── SFR viewer ─────────────────────────────────────────────────────────────

/// Named SFRs with a non-zero value, one per line with the binary pattern.
pub fn dump_sfr(data: &[u8]) -> String {
    let mut s = String::new();
    for &(addr, name) in sfr::NAMES {
        let val = data.get(addr as usize).copied().unwrap_or(0);
        if val != 0 {
            s.push_str(&format!("  {:>8} (0x{:03X}) = 0x{:02X}  {:08b}\n", name, addr, val, val));
        }
    }
    if s.is_empty() {
        s.push_str("  (all zero)\n");
    }
    s
}

/// Every named SFR, four per line.
pub fn dump_sfr_all(data: &[u8]) -> String {
    let mut s = String::new();
    for (col, &(addr, name)) in sfr::NAMES.iter().enumerate() {
        let val = data.get(addr as usize).copied().unwrap_or(0);
        s.push_str(&format!("{:>8}={:02X}", name, val));
        s.push_str(if col % 4 == 3 { "\n" } else { "  " });
    }
    if sfr::NAMES.len() % 4 != 0 {
        s.push('\n');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfr::{CCP1CON, SSPBUF};
    use crate::Pic18;

    #[test]
    fn test_dump_ram() {
        let mut data = vec![0u8; 512];
        data[0x100] = b'O';
        data[0x101] = b'K';
        let dump = dump_ram(&data, 0x100, 16);
        assert!(dump.starts_with("100: 4F 4B"));
        assert!(dump.contains("OK.."));
    }

    #[test]
    fn test_dump_sfr() {
        let mut pic = Pic18::new();
        pic.write_data(CCP1CON, 0x0C);
        let dump = pic.dump_sfr();
        assert!(dump.contains("CCP1CON (0xFBD) = 0x0C"));
        assert!(pic.dump_sfr_all().contains("SSPBUF="));
    }

    #[test]
    fn test_watch_by_name() {
        let mut pic = Pic18::new();
        assert!(pic.debugger.watch_sfr("nosuch", WatchKind::Write).is_none());
        let idx = pic.debugger.watch_sfr("ccp1con", WatchKind::Write).unwrap();
        pic.debugger.watchpoints[idx].value_match = Some(0x08);
        pic.write_data(CCP1CON, 0x0C);
        assert!(pic.debugger.take_hit().is_none());
        pic.write_data(CCP1CON, 0x08);
        let hit = pic.debugger.take_hit().unwrap();
        assert_eq!((hit.addr, hit.old_val, hit.new_val), (CCP1CON, 0x0C, 0x08));
        assert_eq!(pic.debugger.watchpoints[idx].hits, 1);
    }

    #[test]
    fn test_read_watchpoint() {
        let mut dbg = Debugger::new();
        dbg.add_watchpoint(SSPBUF, WatchKind::ReadWrite);
        dbg.check_read(SSPBUF, 0x5A);
        let hit = dbg.take_hit().unwrap();
        assert_eq!(hit.access, WatchKind::Read);
        assert!(dbg.list_watchpoints().contains("SSPBUF RW hits=1"));
    }
}
