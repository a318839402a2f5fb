//! Byte-level codecs: the block table, the fixed-size records inside the
//! blocks and the editor metadata blob.

pub mod blocks;
pub mod metadata;
pub mod records;
