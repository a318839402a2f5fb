//! Object definition bytecode.
//!
//! A tileset carries two files: an index of 6-byte entries
//! `(u16 offset, u8 width, u8 height, u16 random)` and a data file holding
//! the row bytecode each entry points at.

use byteorder::{BigEndian, ByteOrder};

use crate::error::CourseError;
use crate::model::TILES_PER_SLOT;

/// Ends the current row.
pub const ROW_END: u8 = 0xFE;
/// Ends the definition.
pub const DEF_END: u8 = 0xFF;
/// Size of one index entry.
pub const INDEX_ENTRY_SIZE: usize = 6;
/// Object kinds are a single byte.
pub const MAX_OBJECTS: usize = 256;

/// One element of a definition row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Slope or section control byte; high bit set.
    Marker(u8),
    /// A tile with its tiling control bits.
    Tile {
        /// Repeat and slope flags
        control: u8,
        /// Tile number, already offset into its tileset slot
        tile: u16,
        /// Upper six bits of the third byte
        extra: u8,
    },
}

impl Opcode {
    /// Control byte of either variant.
    pub fn control(&self) -> u8 {
        match *self {
            Opcode::Marker(c) => c,
            Opcode::Tile { control, .. } => control,
        }
    }

    /// Whether this is a one-byte marker.
    pub fn is_marker(&self) -> bool {
        matches!(self, Opcode::Marker(_))
    }
}

/// A single object's layout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectDef {
    /// Natural width in tiles, as listed in the index.
    pub width: u8,
    /// Natural height in tiles.
    pub height: u8,
    /// Random-tile settings from the index; not used for rendering.
    pub random: u16,
    /// Opcode rows, top to bottom
    pub rows: Vec<Vec<Opcode>>,
}

impl ObjectDef {
    /// Parse the bytecode starting at `offset` up to its `0xFF`.
    ///
    /// Running off the end of `data` before the terminator is
    /// [`CourseError::OutOfBounds`].
    pub fn parse(data: &[u8], offset: usize) -> Result<Self, CourseError> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut i = offset;

        loop {
            let Some(&b) = data.get(i) else {
                return Err(CourseError::OutOfBounds {
                    offset: i,
                    wanted: 1,
                    len: data.len(),
                });
            };
            match b {
                DEF_END => break,
                ROW_END => {
                    rows.push(std::mem::take(&mut row));
                    i += 1;
                }
                _ if b & 0x80 != 0 => {
                    row.push(Opcode::Marker(b));
                    i += 1;
                }
                _ => {
                    let Some(&[_, second, extra]) = data.get(i..i + 3) else {
                        return Err(CourseError::OutOfBounds {
                            offset: i,
                            wanted: 3,
                            len: data.len(),
                        });
                    };
                    let slot = u16::from((extra & 7) >> 1);
                    row.push(Opcode::Tile {
                        control: b,
                        tile: u16::from(second) + slot * TILES_PER_SLOT,
                        extra: extra >> 2,
                    });
                    i += 3;
                }
            }
        }

        // an unterminated last row still counts
        if !row.is_empty() {
            rows.push(row);
        }

        Ok(Self {
            rows,
            ..Self::default()
        })
    }

    /// Sloped objects start with a marker.
    pub fn is_diagonal(&self) -> bool {
        self.rows
            .first()
            .and_then(|r| r.first())
            .is_some_and(Opcode::is_marker)
    }
}

/// Every object of one tileset, indexed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectDefinitions {
    defs: Vec<ObjectDef>,
}

impl ObjectDefinitions {
    /// Parse the index and data files of a tileset.
    pub fn parse(index: &[u8], data: &[u8]) -> Result<Self, CourseError> {
        let count = (index.len() / INDEX_ENTRY_SIZE).min(MAX_OBJECTS);
        let mut defs = Vec::with_capacity(count);
        for entry in index.chunks_exact(INDEX_ENTRY_SIZE).take(count) {
            let offset = BigEndian::read_u16(entry) as usize;
            let mut def = ObjectDef::parse(data, offset)?;
            def.width = entry[2];
            def.height = entry[3];
            def.random = BigEndian::read_u16(&entry[4..]);
            defs.push(def);
        }
        Ok(Self { defs })
    }

    /// Definition for an object kind, if the tileset has one.
    pub fn get(&self, kind: u8) -> Option<&ObjectDef> {
        self.defs.get(kind as usize)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether the tileset defines no objects.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in index order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectDef> {
        self.defs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_number_folds_in_the_slot_bits() {
        // extra 0b000101_10: slot 3, extra field 5
        let def = ObjectDef::parse(&[0x00, 0x12, 0x16, 0xFE, 0xFF], 0).expect("parse");
        assert_eq!(def.rows.len(), 1);
        assert_eq!(
            def.rows[0][0],
            Opcode::Tile {
                control: 0,
                tile: 0x12 + 3 * 0x200,
                extra: 5,
            }
        );
    }

    #[test]
    fn markers_and_rows_are_split() {
        let data = [0x81, 0x00, 0x01, 0x00, 0xFE, 0x02, 0x02, 0x00, 0xFE, 0xFF];
        let def = ObjectDef::parse(&data, 0).expect("parse");
        assert!(def.is_diagonal());
        assert_eq!(def.rows.len(), 2);
        assert_eq!(def.rows[0][0], Opcode::Marker(0x81));
        assert_eq!(def.rows[1][0].control(), 2);
    }

    #[test]
    fn missing_terminator_is_out_of_bounds() {
        let err = ObjectDef::parse(&[0x00, 0x01, 0x00, 0xFE], 0).unwrap_err();
        assert!(matches!(err, CourseError::OutOfBounds { offset: 4, .. }));

        let err = ObjectDef::parse(&[0x00, 0x01], 0).unwrap_err();
        assert!(matches!(err, CourseError::OutOfBounds { wanted: 3, .. }));
    }

    #[test]
    fn index_supplies_dimensions() {
        let data = [0x00, 0x05, 0x00, 0xFE, 0xFF, 0x00, 0x06, 0x00, 0xFE, 0xFF];
        let index = [0, 0, 1, 1, 0, 0, 0, 5, 2, 3, 0, 4];
        let defs = ObjectDefinitions::parse(&index, &data).expect("parse");
        assert_eq!(defs.len(), 2);
        let second = defs.get(1).expect("kind 1");
        assert_eq!((second.width, second.height, second.random), (2, 3, 4));
        assert!(defs.get(2).is_none());
    }
}
