//! Row/column key matrix wired to port pins.
//!
//! Columns are pulled low. A pressed key connects its row to its column, so
//! the column pin reads whatever level the row pin drives.

use serde::{Deserialize, Serialize};

use crate::sfr::Port;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMatrix {
    pub rows: Vec<(Port, u8)>,
    pub cols: Vec<(Port, u8)>,
    /// Pressed key as (row, column).
    pub pressed: Option<(usize, usize)>,
}

impl KeyMatrix {
    pub fn new(rows: &[(Port, u8)], cols: &[(Port, u8)]) -> Self {
        KeyMatrix { rows: rows.to_vec(), cols: cols.to_vec(), pressed: None }
    }

    /// Overlay the column levels on the external input of `port`, given the
    /// levels driven on every port.
    pub fn apply(&self, port: Port, input: u8, driven: &[u8; 5]) -> u8 {
        let mut v = input;
        for (c, &(cp, cb)) in self.cols.iter().enumerate() {
            if cp != port {
                continue;
            }
            let high = match self.pressed {
                Some((r, pc)) if pc == c => self
                    .rows
                    .get(r)
                    .map(|&(rp, rb)| driven[rp.index()] & (1 << rb) != 0)
                    .unwrap_or(false),
                _ => false,
            };
            if high {
                v |= 1 << cb;
            } else {
                v &= !(1 << cb);
            }
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_follows_row() {
        let mut km = KeyMatrix::new(
            &[(Port::B, 0), (Port::B, 1), (Port::B, 2), (Port::B, 3)],
            &[(Port::B, 4), (Port::B, 5), (Port::B, 6)],
        );
        let mut driven = [0u8; 5];
        driven[Port::B.index()] = 0b0000_0010; // row 1 high
        assert_eq!(km.apply(Port::B, 0xFF, &driven) & 0x70, 0);
        km.pressed = Some((1, 2));
        assert_eq!(km.apply(Port::B, 0x00, &driven), 0b0100_0000);
        km.pressed = Some((0, 2));
        assert_eq!(km.apply(Port::B, 0x00, &driven), 0);
        // other ports untouched
        assert_eq!(km.apply(Port::D, 0xAA, &driven), 0xAA);
    }
}
