//! The block table at the start of every course file.
//!
//! Layout: 17 big-endian `(offset: u32, length: u32)` pairs, then the
//! metadata blob (zero-padded to a multiple of 4), then the block bodies in
//! table order.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};
use std::fmt;

use crate::error::{CourseError, Warnings};

/// Number of blocks in a course file.
pub const BLOCK_COUNT: usize = 17;
/// First byte after the block table; the metadata blob starts here.
pub const TABLE_END: usize = BLOCK_COUNT * 8;

/// The fixed purpose of each block, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// 1: four 32-byte tileset names
    TilesetNames,
    /// 2: area options
    Options,
    /// 3: zone camera bounds
    Bounding,
    /// 4: not interpreted
    Unused4,
    /// 5: background layer A
    BackgroundA,
    /// 6: background layer B
    BackgroundB,
    /// 7
    Entrances,
    /// 8: terminated by `FF FF FF FF`
    Sprites,
    /// 9: sprite kinds to preload
    LoadedSprites,
    /// 10
    Zones,
    /// 11
    Locations,
    /// 12: not interpreted
    Unused12,
    /// 13: path headers
    Paths,
    /// 14
    PathNodes,
    /// 15: not interpreted
    Unused15,
    /// 16: progress path headers
    ProgressPaths,
    /// 17
    ProgressPathNodes,
}

impl BlockKind {
    /// Every block kind in table order.
    pub const ALL: [BlockKind; BLOCK_COUNT] = [
        BlockKind::TilesetNames,
        BlockKind::Options,
        BlockKind::Bounding,
        BlockKind::Unused4,
        BlockKind::BackgroundA,
        BlockKind::BackgroundB,
        BlockKind::Entrances,
        BlockKind::Sprites,
        BlockKind::LoadedSprites,
        BlockKind::Zones,
        BlockKind::Locations,
        BlockKind::Unused12,
        BlockKind::Paths,
        BlockKind::PathNodes,
        BlockKind::Unused15,
        BlockKind::ProgressPaths,
        BlockKind::ProgressPathNodes,
    ];

    /// Zero-based position in the block table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Blocks the library does not interpret and copies through verbatim.
    pub fn is_passthrough(self) -> bool {
        matches!(self, BlockKind::Unused4 | BlockKind::Unused12 | BlockKind::Unused15)
    }

    fn name(self) -> &'static str {
        match self {
            BlockKind::TilesetNames => "tileset names",
            BlockKind::Options => "options",
            BlockKind::Bounding => "bounding",
            BlockKind::Unused4 => "block 4",
            BlockKind::BackgroundA => "background A",
            BlockKind::BackgroundB => "background B",
            BlockKind::Entrances => "entrances",
            BlockKind::Sprites => "sprites",
            BlockKind::LoadedSprites => "loaded sprites",
            BlockKind::Zones => "zones",
            BlockKind::Locations => "locations",
            BlockKind::Unused12 => "block 12",
            BlockKind::Paths => "paths",
            BlockKind::PathNodes => "path nodes",
            BlockKind::Unused15 => "block 15",
            BlockKind::ProgressPaths => "progress paths",
            BlockKind::ProgressPathNodes => "progress path nodes",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (block {})", self.name(), self.index() + 1)
    }
}

/// Raw block bodies and metadata blob of one course file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseBlocks {
    blocks: [Vec<u8>; BLOCK_COUNT],
    /// Metadata blob as stored between the table and the first block,
    /// including any trailing padding.
    pub metadata: Vec<u8>,
}

impl Default for CourseBlocks {
    fn default() -> Self {
        Self {
            blocks: std::array::from_fn(|_| Vec::new()),
            metadata: Vec::new(),
        }
    }
}

impl CourseBlocks {
    /// All blocks empty, no metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Body of a block; empty when the block has length 0.
    pub fn get(&self, kind: BlockKind) -> &[u8] {
        &self.blocks[kind.index()]
    }

    /// Replace a block body.
    pub fn set(&mut self, kind: BlockKind, body: Vec<u8>) {
        self.blocks[kind.index()] = body;
    }

    /// Lengths of all blocks in table order.
    pub fn lengths(&self) -> [usize; BLOCK_COUNT] {
        std::array::from_fn(|i| self.blocks[i].len())
    }

    /// Split a course buffer into its blocks.
    ///
    /// Fails only when the buffer cannot hold the block table. Entries that
    /// point outside the buffer are reported as warnings and read as empty.
    pub fn decode(buf: &[u8]) -> Result<(Self, Warnings), CourseError> {
        if buf.len() < TABLE_END {
            return Err(CourseError::OutOfBounds {
                offset: 0,
                wanted: TABLE_END,
                len: buf.len(),
            });
        }

        let mut out = Self::default();
        let mut warnings = Warnings::new();

        for kind in BlockKind::ALL {
            let entry = &buf[kind.index() * 8..];
            let offset = BigEndian::read_u32(entry) as usize;
            let length = BigEndian::read_u32(&entry[4..]) as usize;
            if length == 0 {
                continue;
            }

            match offset.checked_add(length) {
                Some(end) if end <= buf.len() => {
                    out.blocks[kind.index()] = buf[offset..end].to_vec();
                }
                _ => {
                    warn!("{kind} points outside the course file, reading it as empty");
                    warnings.push(CourseError::malformed(
                        kind,
                        format!(
                            "offset {offset:#x} + length {length:#x} exceeds file size {:#x}",
                            buf.len()
                        ),
                    ));
                }
            }
        }

        let first = BigEndian::read_u32(buf) as usize;
        if first > TABLE_END {
            let end = first.min(buf.len());
            out.metadata = buf[TABLE_END..end].to_vec();
            debug!("course file carries {} bytes of metadata", out.metadata.len());
        }

        Ok((out, warnings))
    }

    /// Lay the blocks out into a course buffer.
    pub fn encode(&self) -> Result<Vec<u8>, CourseError> {
        let meta_len = self.metadata.len().div_ceil(4) * 4;
        let body_len: usize = self.blocks.iter().map(Vec::len).sum();
        let file_len = TABLE_END + meta_len + body_len;
        if u32::try_from(file_len).is_err() {
            return Err(CourseError::overflow(format!(
                "course file of {file_len} bytes"
            )));
        }

        let mut out = vec![0u8; file_len];
        out[TABLE_END..TABLE_END + self.metadata.len()].copy_from_slice(&self.metadata);

        let mut offset = TABLE_END + meta_len;
        for (i, block) in self.blocks.iter().enumerate() {
            BigEndian::write_u32(&mut out[i * 8..], offset as u32);
            BigEndian::write_u32(&mut out[i * 8 + 4..], block.len() as u32);
            out[offset..offset + block.len()].copy_from_slice(block);
            offset += block.len();
        }

        Ok(out)
    }
}
