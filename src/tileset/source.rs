//! Where tileset object files come from.

use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::Tileset;
use crate::error::{CourseError, Warnings};
use crate::model::{Object, TILESET_SLOTS};
use crate::tileset::render::{render_object, TileGrid};

/// Index and data bytes of one tileset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetFiles {
    /// `BG_unt/<name>_hd.bin`
    pub index: Vec<u8>,
    /// `BG_unt/<name>.bin`
    pub data: Vec<u8>,
}

/// Looks up tilesets by name.
pub trait TilesetSource {
    /// `Ok(None)` when no tileset of that name exists.
    fn object_files(&self, name: &str) -> Result<Option<TilesetFiles>, CourseError>;
}

/// Unpacked tileset archives under a common root:
/// `<root>/<name>/BG_unt/<name>.bin` and `<name>_hd.bin`.
#[derive(Debug, Clone)]
pub struct DirTilesetSource {
    root: PathBuf,
}

impl DirTilesetSource {
    /// Tilesets below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The folder tilesets are looked up in.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn read(path: &Path) -> Result<Vec<u8>, CourseError> {
    std::fs::read(path).map_err(|source| CourseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Names come from course files; anything that could leave the root is
/// treated as not found.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

impl TilesetSource for DirTilesetSource {
    fn object_files(&self, name: &str) -> Result<Option<TilesetFiles>, CourseError> {
        if !is_plain_name(name) {
            warn!("refusing tileset name '{name}'");
            return Ok(None);
        }
        let unt = self.root.join(name).join("BG_unt");
        let index = unt.join(format!("{name}_hd.bin"));
        let data = unt.join(format!("{name}.bin"));
        if !index.is_file() || !data.is_file() {
            return Ok(None);
        }
        Ok(Some(TilesetFiles {
            index: read(&index)?,
            data: read(&data)?,
        }))
    }
}

/// Tilesets held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryTilesetSource {
    tilesets: HashMap<String, TilesetFiles>,
}

impl MemoryTilesetSource {
    /// Register `files` under `name`, replacing any earlier entry.
    pub fn insert(&mut self, name: impl Into<String>, files: TilesetFiles) {
        self.tilesets.insert(name.into(), files);
    }
}

impl TilesetSource for MemoryTilesetSource {
    fn object_files(&self, name: &str) -> Result<Option<TilesetFiles>, CourseError> {
        Ok(self.tilesets.get(name).cloned())
    }
}

/// The tilesets loaded for the current area, one per slot.
#[derive(Debug, Clone, Default)]
pub struct TilesetCache {
    slots: [Option<Tileset>; TILESET_SLOTS],
}

impl TilesetCache {
    /// Replace every slot with the tilesets `names` refers to.
    ///
    /// Empty names leave a slot empty. Missing and corrupted tilesets are
    /// reported and leave the slot empty; they never fail the whole load.
    pub fn load(&mut self, names: &[String; TILESET_SLOTS], source: &dyn TilesetSource) -> Warnings {
        let mut warnings = Warnings::new();
        for (slot, name) in names.iter().enumerate() {
            self.slots[slot] = None;
            if name.is_empty() {
                continue;
            }
            match load_slot(slot, name, source) {
                Ok(ts) => {
                    debug!("loaded tileset '{name}' into slot {slot} ({} objects)", ts.objects.len());
                    self.slots[slot] = Some(ts);
                }
                Err(e) => {
                    warn!("{e}");
                    warnings.push(e);
                }
            }
        }
        warnings
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        self.slots = Default::default();
    }

    /// Tileset in `slot`, if one loaded.
    pub fn get(&self, slot: usize) -> Option<&Tileset> {
        self.slots.get(slot)?.as_ref()
    }

    /// Render a placed object with the tileset in its slot; a blank grid if
    /// the slot is empty.
    pub fn render(&self, obj: &Object, fullslope: bool) -> TileGrid {
        let def = self
            .get(obj.tileset as usize)
            .and_then(|ts| ts.objects.get(obj.kind));
        render_object(def, obj.width as usize, obj.height as usize, fullslope)
    }
}

fn load_slot(slot: usize, name: &str, source: &dyn TilesetSource) -> Result<Tileset, CourseError> {
    let files = source
        .object_files(name)?
        .ok_or_else(|| CourseError::MissingTileset {
            slot,
            name: name.to_owned(),
        })?;
    Tileset::from_files(name, &files)
}
