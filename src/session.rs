//! Editor state: the open level, the area being edited, its tilesets and
//! what the views should show.
//!
//! Views do not hold references into the level. They subscribe to
//! [`AreaEvent`]s and re-read whatever changed.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::Path;

use crate::area::Area;
use crate::config::LoadOptions;
use crate::error::{CourseError, Warnings};
use crate::level::Level;
use crate::model::{PathNode, LAYER_COUNT};
use crate::tileset::render::TileGrid;
use crate::tileset::source::{TilesetCache, TilesetSource};

/// Change notifications published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaEvent {
    /// A level was opened or created; area 1 is current.
    LevelOpened {
        /// Number of areas in the level
        areas: usize,
    },
    /// Another area became current.
    AreaSwitched {
        /// The new current area
        area: usize,
    },
    /// The contents of an area changed.
    AreaEdited {
        /// Area number
        area: usize,
    },
    /// A path gained, lost or moved a node.
    PathChanged {
        /// Area number
        area: usize,
        /// Path id
        path: u8,
    },
    /// A path lost its last node and is gone.
    PathRemoved {
        /// Area number
        area: usize,
        /// Id the path had
        path: u8,
    },
    /// The level was serialized for saving.
    Saved,
}

/// What the editor views draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewFlags {
    /// Per object layer
    pub layers: [bool; LAYER_COUNT],
    /// Sprites
    pub sprites: bool,
    /// Paths and progress paths
    pub paths: bool,
    /// Locations
    pub locations: bool,
    /// In-level comments
    pub comments: bool,
    /// Render slopes as far as they fit along the longer axis.
    pub fullslope: bool,
}

impl Default for ViewFlags {
    fn default() -> Self {
        Self {
            layers: [true; LAYER_COUNT],
            sprites: true,
            paths: true,
            locations: true,
            comments: true,
            fullslope: false,
        }
    }
}

/// Everything the editor works on, owned in one place.
pub struct EditorSession {
    level: Option<Level>,
    current: usize,
    tilesets: TilesetCache,
    source: Box<dyn TilesetSource>,
    options: LoadOptions,
    /// Display toggles
    pub view: ViewFlags,
    subscribers: Vec<Sender<AreaEvent>>,
    dirty: bool,
}

impl EditorSession {
    /// A session with no level open.
    pub fn new(source: Box<dyn TilesetSource>, options: LoadOptions) -> Self {
        Self {
            level: None,
            current: 1,
            tilesets: TilesetCache::default(),
            source,
            options,
            view: ViewFlags::default(),
            subscribers: Vec::new(),
            dirty: false,
        }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&mut self) -> Receiver<AreaEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: AreaEvent) {
        debug!("{event:?}");
        // dropped receivers unsubscribe
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Open a level from its archive entries and make area 1 current.
    pub fn open(&mut self, files: &BTreeMap<String, Vec<u8>>) -> Result<Warnings, CourseError> {
        let (level, mut warnings) = Level::from_files(files, &self.options)?;
        warnings.extend(self.install(level));
        Ok(warnings)
    }

    /// Open an unpacked level folder.
    pub fn open_dir(&mut self, dir: impl AsRef<Path>) -> anyhow::Result<Warnings> {
        let (level, mut warnings) = Level::read_dir(dir, &self.options)?;
        warnings.extend(self.install(level));
        Ok(warnings)
    }

    /// Start a new level with one empty area.
    pub fn new_level(&mut self) -> Warnings {
        self.install(Level::new())
    }

    fn install(&mut self, level: Level) -> Warnings {
        let areas = level.areas().len();
        self.level = Some(level);
        self.current = 1;
        self.dirty = false;
        let warnings = self.reload_tilesets();
        info!("opened level with {areas} areas");
        self.publish(AreaEvent::LevelOpened { areas });
        warnings
    }

    fn reload_tilesets(&mut self) -> Warnings {
        self.tilesets.clear();
        if !self.options.load_tilesets {
            return Warnings::new();
        }
        let Some(area) = self.level.as_ref().and_then(|l| l.area(self.current)) else {
            return Warnings::new();
        };
        self.tilesets.load(&area.tilesets, self.source.as_ref())
    }

    /// The open level, if any.
    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    /// Number of the current area, counting from 1.
    pub fn current_area(&self) -> usize {
        self.current
    }

    /// The current area of the open level.
    pub fn area(&self) -> Option<&Area> {
        self.level.as_ref()?.area(self.current)
    }

    /// Tilesets of the current area.
    pub fn tilesets(&self) -> &TilesetCache {
        &self.tilesets
    }

    /// Whether anything changed since the level was opened or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Make area `n` current and load its tilesets.
    pub fn switch_area(&mut self, n: usize) -> Result<Warnings, CourseError> {
        let level = self.level.as_ref().ok_or(CourseError::NoAreas)?;
        if level.area(n).is_none() {
            return Err(CourseError::InvalidArea(n));
        }
        self.current = n;
        let warnings = self.reload_tilesets();
        self.publish(AreaEvent::AreaSwitched { area: n });
        Ok(warnings)
    }

    /// Apply `f` to the current area and notify subscribers.
    pub fn edit_area<R>(&mut self, f: impl FnOnce(&mut Area) -> R) -> Result<R, CourseError> {
        let n = self.current;
        let area = self.area_mut()?;
        let out = f(area);
        self.dirty = true;
        self.publish(AreaEvent::AreaEdited { area: n });
        Ok(out)
    }

    fn area_mut(&mut self) -> Result<&mut Area, CourseError> {
        let n = self.current;
        self.level
            .as_mut()
            .ok_or(CourseError::NoAreas)?
            .area_mut(n)
            .ok_or(CourseError::InvalidArea(n))
    }

    /// Tiles of object `index` on `layer` of the current area.
    pub fn render_object(&self, layer: usize, index: usize) -> Option<TileGrid> {
        let obj = self.area()?.layers.get(layer)?.get(index)?;
        Some(self.tilesets.render(obj, self.view.fullslope))
    }

    /// Insert a path node; see [`Area::insert_path_node`].
    pub fn insert_path_node(&mut self, path: u8, index: usize, node: PathNode) -> Result<bool, CourseError> {
        let done = self.area_mut()?.insert_path_node(path, index, node);
        if done {
            self.path_changed(path, false);
        }
        Ok(done)
    }

    /// Move a path node.
    pub fn move_path_node(&mut self, path: u8, index: usize, x: u16, y: u16) -> Result<bool, CourseError> {
        let done = self.area_mut()?.move_path_node(path, index, x, y);
        if done {
            self.path_changed(path, false);
        }
        Ok(done)
    }

    /// Remove a path node; the path goes with its last node.
    pub fn remove_path_node(&mut self, path: u8, index: usize) -> Result<Option<PathNode>, CourseError> {
        let area = self.area_mut()?;
        let node = area.remove_path_node(path, index);
        let gone = area.path(path).is_none();
        if node.is_some() {
            self.path_changed(path, gone);
        }
        Ok(node)
    }

    fn path_changed(&mut self, path: u8, removed: bool) {
        self.dirty = true;
        let area = self.current;
        self.publish(if removed {
            AreaEvent::PathRemoved { area, path }
        } else {
            AreaEvent::PathChanged { area, path }
        });
    }

    /// Serialize the level for an autosave without touching it.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Vec<u8>>, CourseError> {
        self.level.as_ref().ok_or(CourseError::NoAreas)?.to_files()
    }

    /// Group sprites by zone in every area, then serialize the level.
    ///
    /// The open level only takes the new sprite order once encoding has
    /// succeeded; on error it is left as it was.
    pub fn save(&mut self) -> Result<BTreeMap<String, Vec<u8>>, CourseError> {
        let mut sorted = self.level.as_ref().ok_or(CourseError::NoAreas)?.clone();
        for n in 1..=sorted.areas().len() {
            if let Some(area) = sorted.area_mut(n) {
                area.sort_sprites_by_zone();
            }
        }
        let files = sorted.to_files()?;
        self.level = Some(sorted);
        self.dirty = false;
        self.publish(AreaEvent::Saved);
        Ok(files)
    }
}
