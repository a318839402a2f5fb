//! Tilesets as far as object layout is concerned: definitions, rendering
//! to tile grids and loading by name.

pub mod objects;
pub mod render;
pub mod source;

use crate::error::CourseError;
use objects::ObjectDefinitions;
use render::{render_object, TileGrid};
use source::TilesetFiles;

/// A named tileset with its parsed object definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tileset {
    /// Name as referenced from the course file
    pub name: String,
    /// Object layouts indexed by kind
    pub objects: ObjectDefinitions,
}

impl Tileset {
    /// Parse a tileset's object files.
    ///
    /// Any decode failure aborts the whole tileset and is reported as
    /// [`CourseError::CorruptedTileset`].
    pub fn from_files(name: &str, files: &TilesetFiles) -> Result<Self, CourseError> {
        let objects = ObjectDefinitions::parse(&files.index, &files.data).map_err(|e| {
            CourseError::CorruptedTileset {
                name: name.to_owned(),
                source: Box::new(e),
            }
        })?;
        Ok(Self {
            name: name.to_owned(),
            objects,
        })
    }

    /// Render object `kind` at the given size.
    pub fn render(&self, kind: u8, width: usize, height: usize, fullslope: bool) -> TileGrid {
        render_object(self.objects.get(kind), width, height, fullslope)
    }
}
