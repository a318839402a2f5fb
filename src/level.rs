//! A level: up to four areas, stored as `course<n>.bin` plus
//! `course<n>_bgdatL<k>.bin` layer files inside the level archive.

use anyhow::Context;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::Path;

use crate::area::Area;
use crate::codec::metadata::InfoField;
use crate::config::LoadOptions;
use crate::error::{CourseError, Warnings};
use crate::model::LAYER_COUNT;

/// Areas per level.
pub const MAX_AREAS: usize = 4;

/// Archive entry name of area `n`'s course file.
pub fn course_file_name(n: usize) -> String {
    format!("course{n}.bin")
}

/// Archive entry name of area `n`'s layer `layer`.
pub fn layer_file_name(n: usize, layer: usize) -> String {
    format!("course{n}_bgdatL{layer}.bin")
}

/// The areas of one level, numbered from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    areas: Vec<Area>,
}

impl Default for Level {
    fn default() -> Self {
        Self::new()
    }
}

impl Level {
    /// A level with one empty area.
    pub fn new() -> Self {
        Self {
            areas: vec![Area::new(1)],
        }
    }

    /// Decode every area present in an archive's file map.
    ///
    /// Areas are renumbered in order, so a gap in the file numbers closes.
    /// Each area is decoded under its file number first, so its comments
    /// are found before the renumbering.
    pub fn from_files(
        files: &BTreeMap<String, Vec<u8>>,
        opts: &LoadOptions,
    ) -> Result<(Self, Warnings), CourseError> {
        let mut areas = Vec::new();
        let mut warnings = Warnings::new();
        for n in 1..=MAX_AREAS {
            let Some(course) = files.get(&course_file_name(n)) else {
                continue;
            };
            let layers: [Option<&[u8]>; LAYER_COUNT] =
                std::array::from_fn(|k| files.get(&layer_file_name(n, k)).map(Vec::as_slice));
            let (mut area, w) = Area::load(course, layers, n, opts)?;
            area.number = areas.len() + 1;
            debug!("area {n} loaded as area {}: {} warnings", area.number, w.len());
            warnings.extend(w);
            areas.push(area);
        }
        if areas.is_empty() {
            return Err(CourseError::NoAreas);
        }
        Ok((Self { areas }, warnings))
    }

    /// Encode every area into archive entries.
    pub fn to_files(&self) -> Result<BTreeMap<String, Vec<u8>>, CourseError> {
        let mut files = BTreeMap::new();
        for area in &self.areas {
            let saved = area.save()?;
            files.insert(course_file_name(area.number), saved.course);
            for (k, layer) in saved.layers.into_iter().enumerate() {
                if let Some(bytes) = layer {
                    files.insert(layer_file_name(area.number, k), bytes);
                }
            }
        }
        Ok(files)
    }

    /// Load an unpacked level folder.
    pub fn read_dir(dir: impl AsRef<Path>, opts: &LoadOptions) -> anyhow::Result<(Self, Warnings)> {
        let dir = dir.as_ref();
        let mut files = BTreeMap::new();
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("Reading level folder {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("Listing {}", dir.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with("course") && name.ends_with(".bin")) {
                continue;
            }
            let bytes = std::fs::read(entry.path())
                .with_context(|| format!("Reading {}", entry.path().display()))?;
            files.insert(name, bytes);
        }
        Self::from_files(&files, opts).with_context(|| format!("Loading level {}", dir.display()))
    }

    /// Write the level into a folder, replacing course files left over
    /// from areas that no longer exist.
    pub fn write_dir(&self, dir: impl AsRef<Path>) -> anyhow::Result<()> {
        let dir = dir.as_ref();
        let files = self.to_files()?;
        std::fs::create_dir_all(dir).with_context(|| format!("Creating {}", dir.display()))?;

        for n in 1..=MAX_AREAS {
            let stale = std::iter::once(course_file_name(n))
                .chain((0..LAYER_COUNT).map(|k| layer_file_name(n, k)))
                .filter(|name| !files.contains_key(name));
            for name in stale {
                let path = dir.join(&name);
                if path.is_file() {
                    std::fs::remove_file(&path)
                        .with_context(|| format!("Removing stale {}", path.display()))?;
                }
            }
        }

        for (name, bytes) in &files {
            let path = dir.join(name);
            std::fs::write(&path, bytes).with_context(|| format!("Writing {}", path.display()))?;
        }
        info!("wrote {} files to {}", files.len(), dir.display());
        Ok(())
    }

    /// All areas, area 1 first.
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Area `n`, counting from 1.
    pub fn area(&self, n: usize) -> Option<&Area> {
        self.areas.get(n.checked_sub(1)?)
    }

    /// Mutable area `n`, counting from 1.
    pub fn area_mut(&mut self, n: usize) -> Option<&mut Area> {
        self.areas.get_mut(n.checked_sub(1)?)
    }

    /// Append an empty area and return its number.
    pub fn add_area(&mut self) -> Result<usize, CourseError> {
        let n = self.areas.len() + 1;
        if n > MAX_AREAS {
            return Err(CourseError::InvalidArea(n));
        }
        self.areas.push(Area::new(n));
        Ok(n)
    }

    /// Remove area `n`; later areas move down one number. The last
    /// remaining area cannot be removed.
    pub fn remove_area(&mut self, n: usize) -> Result<Area, CourseError> {
        if n == 0 || n > self.areas.len() || self.areas.len() == 1 {
            return Err(CourseError::InvalidArea(n));
        }
        let removed = self.areas.remove(n - 1);
        for (i, area) in self.areas.iter_mut().enumerate() {
            area.number = i + 1;
        }
        Ok(removed)
    }

    /// Level information, stored with the first area.
    pub fn info(&self, field: InfoField) -> Option<String> {
        self.areas.first()?.metadata.info(field)
    }

    /// Set a level information field; fails on non-latin-1 text.
    pub fn set_info(&mut self, field: InfoField, value: &str) -> Result<(), CourseError> {
        let area = self.areas.first_mut().ok_or(CourseError::NoAreas)?;
        area.metadata.set_info(field, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comment, Object};

    #[test]
    fn file_names_follow_archive_layout() {
        assert_eq!(course_file_name(2), "course2.bin");
        assert_eq!(layer_file_name(2, 1), "course2_bgdatL1.bin");
    }

    #[test]
    fn files_round_trip() {
        let mut level = Level::new();
        level.area_mut(1).expect("area 1").layers[1].push(Object::new(0, 1, 2, 3));
        level.add_area().expect("room for area 2");
        level.set_info(InfoField::Author, "someone").expect("latin-1");

        let files = level.to_files().expect("encode");
        let names: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["course1.bin", "course1_bgdatL1.bin", "course2.bin"]);

        let (back, warnings) = Level::from_files(&files, &LoadOptions::strict()).expect("decode");
        assert!(warnings.is_empty());
        assert_eq!(back.areas().len(), 2);
        assert_eq!(back.info(InfoField::Author).as_deref(), Some("someone"));
        assert_eq!(back.area(1).map(|a| a.layers[1].len()), Some(1));
    }

    #[test]
    fn at_most_four_areas() {
        let mut level = Level::new();
        for n in 2..=4 {
            assert_eq!(level.add_area().expect("room"), n);
        }
        assert!(matches!(level.add_area(), Err(CourseError::InvalidArea(5))));
    }

    #[test]
    fn removing_renumbers_and_moves_comments() {
        let mut level = Level::new();
        level.add_area().expect("room");
        level.add_area().expect("room");
        level.area_mut(3).expect("area 3").comments.push(Comment {
            x: 1,
            y: 2,
            text: "third".into(),
        });

        level.remove_area(2).expect("area 2 exists");
        assert_eq!(level.areas().len(), 2);
        assert_eq!(level.area(2).map(|a| a.number), Some(2));

        let files = level.to_files().expect("encode");
        let (back, _) = Level::from_files(&files, &LoadOptions::default()).expect("decode");
        assert_eq!(back.area(2).map(|a| a.comments.len()), Some(1));
    }

    #[test]
    fn gap_in_area_files_keeps_comments() {
        let mut level = Level::new();
        level.add_area().expect("room");
        level.add_area().expect("room");
        level.area_mut(3).expect("area 3").comments.push(Comment {
            x: 8,
            y: 9,
            text: "behind the pipe".into(),
        });
        let mut files = level.to_files().expect("encode");
        files.remove(&course_file_name(2));

        let (back, warnings) = Level::from_files(&files, &LoadOptions::strict()).expect("decode");
        assert!(warnings.is_empty());
        let area = back.area(2).expect("area 3 moved down");
        assert_eq!(area.number, 2);
        assert_eq!(area.comments.len(), 1);
        assert_eq!(area.metadata.keys().count(), 0);

        let files = back.to_files().expect("re-encode");
        let (again, _) = Level::from_files(&files, &LoadOptions::strict()).expect("decode");
        assert_eq!(again.area(2).map(|a| a.comments.clone()), Some(area.comments.clone()));
    }

    #[test]
    fn last_area_cannot_be_removed() {
        let mut level = Level::new();
        assert!(matches!(level.remove_area(1), Err(CourseError::InvalidArea(1))));
        assert!(matches!(level.remove_area(0), Err(CourseError::InvalidArea(0))));
    }

    #[test]
    fn empty_archive_is_an_error() {
        let files = BTreeMap::new();
        assert!(matches!(
            Level::from_files(&files, &LoadOptions::default()),
            Err(CourseError::NoAreas)
        ));
    }
}
