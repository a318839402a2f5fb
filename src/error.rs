//! Errors shared by the codec, tileset loading and level I/O.

use std::io;
use std::path::PathBuf;

use crate::codec::blocks::BlockKind;

/// Error type for course, layer and tileset decoding/encoding.
///
/// Load paths never abort on the recoverable variants; they are collected
/// into a warning list next to the decoded value instead.
#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    /// A block's byte length does not match its record layout, or a record
    /// points past the end of the block it indexes into.
    #[error("malformed {block} block: {reason}")]
    MalformedBlock {
        /// Block that failed to decode
        block: BlockKind,
        /// What was wrong with it
        reason: String,
    },

    /// An object layer stream is not a whole number of object records.
    #[error("malformed object layer {layer}: {reason}")]
    MalformedLayer {
        /// Layer 0-2
        layer: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A cursor ran past the end of a buffer.
    #[error("read of {wanted} bytes at offset {offset} runs past the end of a {len}-byte buffer")]
    OutOfBounds {
        /// Cursor position
        offset: usize,
        /// Bytes requested
        wanted: usize,
        /// Buffer length
        len: usize,
    },

    /// A tileset referenced by an area could not be found.
    #[error("tileset '{name}' (slot {slot}) could not be found")]
    MissingTileset {
        /// Tileset slot 0-3
        slot: usize,
        /// Tileset name as stored in the course file
        name: String,
    },

    /// A tileset was found but its object definitions are unusable.
    #[error("tileset '{name}' is corrupted: {source}")]
    CorruptedTileset {
        /// Tileset name
        name: String,
        /// Underlying decode failure
        #[source]
        source: Box<CourseError>,
    },

    /// Internal state cannot be represented in the file format.
    #[error("cannot encode {what}: value does not fit the file format")]
    EncodeOverflow {
        /// Field or block that overflowed
        what: String,
    },

    /// The editor metadata blob could not be decoded.
    #[error("metadata is unreadable: {0}")]
    Metadata(String),

    /// A string cannot be stored as one byte per character.
    #[error("'{0}' contains characters outside latin-1")]
    NotLatin1(String),

    /// Area numbers are 1-based and a level holds at most 4 areas.
    #[error("invalid area number {0}")]
    InvalidArea(usize),

    /// A level needs at least one area.
    #[error("level has no areas")]
    NoAreas,

    /// File I/O error
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl CourseError {
    pub(crate) fn malformed(block: BlockKind, reason: impl Into<String>) -> Self {
        CourseError::MalformedBlock {
            block,
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(what: impl Into<String>) -> Self {
        CourseError::EncodeOverflow { what: what.into() }
    }
}

/// Recoverable problems reported alongside a successful load.
pub type Warnings = Vec<CourseError>;
