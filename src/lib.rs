#![warn(missing_docs)]

//! Course file codec and tileset object renderer for level editors.
//!
//! A [`Level`] holds up to four [`Area`]s. Each area is stored as a course
//! file of fixed-size big-endian records plus three object layer streams.
//! [`Tileset`] turns placed objects into tile grids, and [`EditorSession`]
//! ties a level, its tilesets and change notifications together.

pub mod area;
pub mod clip;
pub mod codec;
pub mod config;
pub mod error;
pub mod level;
pub mod model;
pub mod session;
pub mod tileset;

pub use area::Area;
pub use clip::Clip;
pub use codec::metadata::Metadata;
pub use config::{LengthPolicy, LoadOptions};
pub use error::CourseError;
pub use level::Level;
pub use session::{AreaEvent, EditorSession};
pub use tileset::render::TileGrid;
pub use tileset::Tileset;
