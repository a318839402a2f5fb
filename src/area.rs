//! One area of a level: the decoded contents of a course file plus its
//! three object layers.

pub mod comments;
pub mod diagnostics;
pub mod zones;

use log::{debug, warn};
use std::collections::BTreeSet;

use crate::codec::blocks::{BlockKind, CourseBlocks};
use crate::codec::metadata::Metadata;
use crate::codec::records::{
    decode_records, decode_tileset_names, encode_records, encode_tileset_names, read_records,
    BackgroundRecord, BoundingRecord, LoadedSprite, PathHeader, Record, ZoneRecord,
    LAYER_TERMINATOR, SPRITE_TERMINATOR,
};
use crate::config::{LengthPolicy, LoadOptions};
use crate::error::{CourseError, Warnings};
use crate::model::*;

/// Blocks that are stored but not interpreted.
const PASSTHROUGH: [BlockKind; 3] = [BlockKind::Unused4, BlockKind::Unused12, BlockKind::Unused15];

/// Output of [`Area::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArea {
    /// The course file
    pub course: Vec<u8>,
    /// Layer streams; `None` for layers without objects
    pub layers: [Option<Vec<u8>>; LAYER_COUNT],
}

/// A decoded area.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    /// 1-based position in the level; selects the comment metadata key.
    pub number: usize,
    /// Tileset name per slot, empty when unused.
    pub tilesets: [String; TILESET_SLOTS],
    /// General settings (block 2)
    pub options: AreaOptions,
    /// Entrances in stored order
    pub entrances: Vec<Entrance>,
    /// Sprites in stored order
    pub sprites: Vec<Sprite>,
    /// Zones with their bounds and backgrounds
    pub zones: Vec<Zone>,
    /// Locations in stored order
    pub locations: Vec<Location>,
    /// Paths with their nodes
    pub paths: Vec<Path>,
    /// Progress paths with their nodes
    pub progress_paths: Vec<ProgressPath>,
    /// Editor comments, kept in the metadata blob on disk
    pub comments: Vec<Comment>,
    /// Objects per layer, in drawing order.
    pub layers: [Vec<Object>; LAYER_COUNT],
    /// Editor metadata, without the comment entry.
    pub metadata: Metadata,
    passthrough: [Vec<u8>; 3],
}

impl Area {
    /// An empty area with the editor's defaults.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            tilesets: ["Pa0_jyotyu".to_owned(), String::new(), String::new(), String::new()],
            options: AreaOptions::default(),
            entrances: Vec::new(),
            sprites: Vec::new(),
            zones: Vec::new(),
            locations: Vec::new(),
            paths: Vec::new(),
            progress_paths: Vec::new(),
            comments: Vec::new(),
            layers: Default::default(),
            metadata: Metadata::default(),
            passthrough: Default::default(),
        }
    }

    /// Decode a course file and its layer streams.
    ///
    /// Fails only when the block table itself is unreadable. Every other
    /// problem leaves the affected list empty and is returned as a warning.
    pub fn load(
        course: &[u8],
        layers: [Option<&[u8]>; LAYER_COUNT],
        number: usize,
        opts: &LoadOptions,
    ) -> Result<(Self, Warnings), CourseError> {
        let (blocks, mut warnings) = CourseBlocks::decode(course)?;
        let policy = opts.record_lengths;
        let mut area = Self::new(number);

        area.tilesets = match decode_tileset_names(blocks.get(BlockKind::TilesetNames)) {
            Ok(names) => names,
            Err(e) => {
                warn!("area {number}: {e}");
                warnings.push(e);
                Default::default()
            }
        };

        let options: Vec<AreaOptions> = or_warn(
            number,
            decode_records(BlockKind::Options, blocks.get(BlockKind::Options), &[], LengthPolicy::Lenient),
            &mut warnings,
        );
        area.options = options.into_iter().next().unwrap_or_default();

        area.entrances = or_warn(
            number,
            decode_records(BlockKind::Entrances, blocks.get(BlockKind::Entrances), &[], policy),
            &mut warnings,
        );
        area.sprites = or_warn(
            number,
            decode_records(
                BlockKind::Sprites,
                blocks.get(BlockKind::Sprites),
                &SPRITE_TERMINATOR,
                policy,
            ),
            &mut warnings,
        );

        let zones: Vec<ZoneRecord> =
            or_warn(number, decode_records(BlockKind::Zones, blocks.get(BlockKind::Zones), &[], policy), &mut warnings);
        let bounding: Vec<BoundingRecord> = or_warn(
            number,
            decode_records(BlockKind::Bounding, blocks.get(BlockKind::Bounding), &[], policy),
            &mut warnings,
        );
        let bg_a: Vec<BackgroundRecord> = or_warn(
            number,
            decode_records(BlockKind::BackgroundA, blocks.get(BlockKind::BackgroundA), &[], policy),
            &mut warnings,
        );
        let bg_b: Vec<BackgroundRecord> = or_warn(
            number,
            decode_records(BlockKind::BackgroundB, blocks.get(BlockKind::BackgroundB), &[], policy),
            &mut warnings,
        );
        area.zones = zones
            .iter()
            .map(|z| merge_zone(z, &bounding, &bg_a, &bg_b, &mut warnings))
            .collect();

        area.locations = or_warn(
            number,
            decode_records(BlockKind::Locations, blocks.get(BlockKind::Locations), &[], policy),
            &mut warnings,
        );

        let headers: Vec<PathHeader> =
            or_warn(number, decode_records(BlockKind::Paths, blocks.get(BlockKind::Paths), &[], policy), &mut warnings);
        let nodes: Vec<PathNode> = or_warn(
            number,
            decode_records(BlockKind::PathNodes, blocks.get(BlockKind::PathNodes), &[], policy),
            &mut warnings,
        );
        area.paths = headers
            .iter()
            .filter_map(|h| {
                let nodes = node_slice(BlockKind::PathNodes, h, &nodes, &mut warnings)?;
                Some(Path {
                    id: h.id,
                    loops: h.flags == PathHeader::LOOPS,
                    nodes: nodes.to_vec(),
                })
            })
            .collect();

        let headers: Vec<PathHeader> = or_warn(
            number,
            decode_records(BlockKind::ProgressPaths, blocks.get(BlockKind::ProgressPaths), &[], policy),
            &mut warnings,
        );
        let nodes: Vec<ProgressNode> = or_warn(
            number,
            decode_records(
                BlockKind::ProgressPathNodes,
                blocks.get(BlockKind::ProgressPathNodes),
                &[],
                policy,
            ),
            &mut warnings,
        );
        area.progress_paths = headers
            .iter()
            .filter_map(|h| {
                let nodes = node_slice(BlockKind::ProgressPathNodes, h, &nodes, &mut warnings)?;
                Some(ProgressPath {
                    id: h.id,
                    loops: h.flags == PathHeader::LOOPS,
                    nodes: nodes.to_vec(),
                })
            })
            .collect();

        for (slot, kind) in PASSTHROUGH.iter().enumerate() {
            area.passthrough[slot] = blocks.get(*kind).to_vec();
        }

        area.metadata = match Metadata::decode(&blocks.metadata) {
            Ok(m) => m,
            Err(e) => {
                warn!("area {number}: {e}, starting with empty metadata");
                warnings.push(e);
                Metadata::default()
            }
        };

        let key = comments::key(number);
        if let Some(raw) = area.metadata.bin_data(&key) {
            match comments::decode(raw) {
                Ok(c) => {
                    area.comments = c;
                    area.metadata.remove(&key);
                }
                // the entry stays in the metadata and is written back as is
                Err(e) => {
                    warn!("area {number}: {e}");
                    warnings.push(e);
                }
            }
        }

        for (i, stream) in layers.iter().enumerate() {
            if let Some(data) = stream {
                match decode_layer(i, data, policy) {
                    Ok(objs) => area.layers[i] = objs,
                    Err(e) => {
                        warn!("area {number}: {e}");
                        warnings.push(e);
                    }
                }
            }
        }

        debug!(
            "loaded area {number}: {} sprites, {} zones, {} entrances, {} warnings",
            area.sprites.len(),
            area.zones.len(),
            area.entrances.len(),
            warnings.len()
        );
        Ok((area, warnings))
    }

    /// Encode the area.
    ///
    /// Sprite zone ids are recomputed from their positions in the output;
    /// `self` is left untouched, including on error.
    pub fn save(&self) -> Result<SavedArea, CourseError> {
        let mut blocks = CourseBlocks::new();

        blocks.set(BlockKind::TilesetNames, encode_tileset_names(&self.tilesets)?);
        blocks.set(BlockKind::Options, encode_records([&self.options], &[]));
        blocks.set(BlockKind::Entrances, encode_records(&self.entrances, &[]));

        let sprites: Vec<Sprite> = self
            .sprites
            .iter()
            .map(|s| {
                let mut s = s.clone();
                if let Some(id) = self.zone_id_at(s.x.into(), s.y.into()) {
                    s.zone_id = id.into();
                }
                s
            })
            .collect();
        blocks.set(BlockKind::Sprites, encode_records(&sprites, &SPRITE_TERMINATOR));

        let loaded: BTreeSet<u16> = self.sprites.iter().map(|s| s.kind).collect();
        let loaded: Vec<LoadedSprite> = loaded.into_iter().map(LoadedSprite).collect();
        blocks.set(BlockKind::LoadedSprites, encode_records(&loaded, &[]));

        let (zones, bounding, bg_a, bg_b) = split_zones(&self.zones)?;
        blocks.set(BlockKind::Zones, encode_records(&zones, &[]));
        blocks.set(BlockKind::Bounding, encode_records(&bounding, &[]));
        blocks.set(BlockKind::BackgroundA, encode_records(&bg_a, &[]));
        blocks.set(BlockKind::BackgroundB, encode_records(&bg_b, &[]));

        blocks.set(BlockKind::Locations, encode_records(&self.locations, &[]));

        let (headers, nodes) = pack_paths(self.paths.iter().map(|p| (p.id, p.loops, &p.nodes[..])))?;
        blocks.set(BlockKind::Paths, encode_records(&headers, &[]));
        blocks.set(BlockKind::PathNodes, encode_records(nodes, &[]));

        let (headers, nodes) =
            pack_paths(self.progress_paths.iter().map(|p| (p.id, p.loops, &p.nodes[..])))?;
        blocks.set(BlockKind::ProgressPaths, encode_records(&headers, &[]));
        blocks.set(BlockKind::ProgressPathNodes, encode_records(nodes, &[]));

        for (slot, kind) in PASSTHROUGH.iter().enumerate() {
            blocks.set(*kind, self.passthrough[slot].clone());
        }

        let mut metadata = self.metadata.clone();
        if !self.comments.is_empty() {
            metadata.set_bin_data(&comments::key(self.number), comments::encode(&self.comments)?);
        }
        blocks.metadata = metadata.encode()?;

        let course = blocks.encode()?;
        let layers = std::array::from_fn(|i| {
            let objs = &self.layers[i];
            (!objs.is_empty()).then(|| encode_records(objs, &LAYER_TERMINATOR))
        });

        debug!("saved area {}: {} bytes", self.number, course.len());
        Ok(SavedArea { course, layers })
    }

    /// Id of the zone at a position; see [`zones::map_position_to_zone_id`].
    pub fn zone_id_at(&self, x: i32, y: i32) -> Option<u8> {
        zones::map_position_to_zone_id(&self.zones, x, y)
    }

    /// Recompute every sprite's zone id and group sprites by zone,
    /// keeping their relative order inside each zone.
    pub fn sort_sprites_by_zone(&mut self) {
        for i in 0..self.sprites.len() {
            let (x, y) = (self.sprites[i].x, self.sprites[i].y);
            if let Some(id) = self.zone_id_at(x.into(), y.into()) {
                self.sprites[i].zone_id = id.into();
            }
        }
        self.sprites.sort_by_key(|s| s.zone_id);
    }

    /// Append an object on top of `layer`; returns its index there.
    pub fn add_object(&mut self, layer: usize, obj: Object) -> Option<usize> {
        let objs = self.layers.get_mut(layer)?;
        objs.push(obj);
        Some(objs.len() - 1)
    }

    /// Remove the object at `index` of `layer`; objects above it move down
    /// one place.
    pub fn remove_object(&mut self, layer: usize, index: usize) -> Option<Object> {
        let objs = self.layers.get_mut(layer)?;
        (index < objs.len()).then(|| objs.remove(index))
    }

    /// Add an entrance under the lowest unused id. `None` when all 256 ids
    /// are taken.
    pub fn add_entrance(&mut self, mut entrance: Entrance) -> Option<u8> {
        let id = lowest_free(self.entrances.iter().map(|e| e.id), 0)?;
        entrance.id = id;
        self.entrances.push(entrance);
        Some(id)
    }

    /// Add a location under the lowest unused id in `1..=255`.
    pub fn add_location(&mut self, mut location: Location) -> Option<u8> {
        let id = lowest_free(self.locations.iter().map(|l| l.id), 1)?;
        location.id = id;
        self.locations.push(location);
        Some(id)
    }

    /// Path with id `id`.
    pub fn path(&self, id: u8) -> Option<&Path> {
        self.paths.iter().find(|p| p.id == id)
    }

    /// Start a new path at `node` under the lowest unused id.
    pub fn add_path(&mut self, node: PathNode) -> Option<u8> {
        let id = lowest_free(self.paths.iter().map(|p| p.id), 0)?;
        self.paths.push(Path {
            id,
            loops: false,
            nodes: vec![node],
        });
        Some(id)
    }

    /// Insert `node` before position `index` of path `id`; an index past
    /// the end appends.
    pub fn insert_path_node(&mut self, id: u8, index: usize, node: PathNode) -> bool {
        let Some(path) = self.paths.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        let index = index.min(path.nodes.len());
        path.nodes.insert(index, node);
        true
    }

    /// Remove a node. Removing the last node of a path removes the path.
    pub fn remove_path_node(&mut self, id: u8, index: usize) -> Option<PathNode> {
        let pos = self.paths.iter().position(|p| p.id == id)?;
        let path = &mut self.paths[pos];
        if index >= path.nodes.len() {
            return None;
        }
        let node = path.nodes.remove(index);
        if path.nodes.is_empty() {
            debug!("path {id} lost its last node, removing it");
            self.paths.remove(pos);
        }
        Some(node)
    }

    /// Move a node to a new position.
    pub fn move_path_node(&mut self, id: u8, index: usize, x: u16, y: u16) -> bool {
        let node = self
            .paths
            .iter_mut()
            .find(|p| p.id == id)
            .and_then(|p| p.nodes.get_mut(index));
        match node {
            Some(n) => {
                n.x = x;
                n.y = y;
                true
            }
            None => false,
        }
    }
}

fn or_warn<T>(number: usize, r: Result<Vec<T>, CourseError>, warnings: &mut Warnings) -> Vec<T> {
    match r {
        Ok(v) => v,
        Err(e) => {
            warn!("area {number}: {e}");
            warnings.push(e);
            Vec::new()
        }
    }
}

/// Lowest id `>= min` not yielded by `used`.
pub(crate) fn lowest_free(used: impl Iterator<Item = u8>, min: u8) -> Option<u8> {
    let used: BTreeSet<u8> = used.collect();
    (min..=u8::MAX).find(|id| !used.contains(id))
}

fn merge_zone(
    z: &ZoneRecord,
    bounding: &[BoundingRecord],
    bg_a: &[BackgroundRecord],
    bg_b: &[BackgroundRecord],
    warnings: &mut Warnings,
) -> Zone {
    let mut lookup = |kind: BlockKind, id: u8, found: Option<()>| {
        if found.is_none() {
            let e = CourseError::malformed(kind, format!("zone {} refers to missing record {id}", z.id));
            warn!("{e}");
            warnings.push(e);
        }
    };

    // last match wins
    let bounds = bounding.iter().rev().find(|b| b.id == u16::from(z.bounding_id));
    lookup(BlockKind::Bounding, z.bounding_id, bounds.map(|_| ()));
    let a = bg_a.iter().rev().find(|b| b.id == u16::from(z.background_a_id));
    lookup(BlockKind::BackgroundA, z.background_a_id, a.map(|_| ()));
    let b = bg_b.iter().rev().find(|b| b.id == u16::from(z.background_b_id));
    lookup(BlockKind::BackgroundB, z.background_b_id, b.map(|_| ()));

    Zone {
        x: z.x,
        y: z.y,
        width: z.width,
        height: z.height,
        theme: z.theme,
        lighting: z.lighting,
        id: z.id,
        camera_mode: z.camera_mode,
        camera_zoom: z.camera_zoom,
        visibility: z.visibility,
        camera_track: z.camera_track,
        music: z.music,
        sound: z.sound,
        bounds: bounds.map(|b| b.bounds.clone()).unwrap_or_default(),
        background_a: a.map(|b| b.background.clone()).unwrap_or_default(),
        background_b: b.map(|b| b.background.clone()).unwrap_or_default(),
    }
}

/// Index of `value` in `pool`, appending it when new.
fn intern<T: PartialEq + Clone>(pool: &mut Vec<T>, value: &T, what: &str) -> Result<u8, CourseError> {
    let idx = match pool.iter().position(|v| v == value) {
        Some(i) => i,
        None => {
            pool.push(value.clone());
            pool.len() - 1
        }
    };
    u8::try_from(idx).map_err(|_| CourseError::overflow(format!("{what} record ids")))
}

type ZoneBlocks = (
    Vec<ZoneRecord>,
    Vec<BoundingRecord>,
    Vec<BackgroundRecord>,
    Vec<BackgroundRecord>,
);

/// Zone records in stored order plus deduplicated bounding and background
/// records, numbered in order of first use by ascending zone id.
fn split_zones(zones: &[Zone]) -> Result<ZoneBlocks, CourseError> {
    let mut order: Vec<usize> = (0..zones.len()).collect();
    order.sort_by_key(|&i| zones[i].id);

    let mut bounds: Vec<ZoneBounds> = Vec::new();
    let mut a: Vec<Background> = Vec::new();
    let mut b: Vec<Background> = Vec::new();
    let mut ids = vec![(0u8, 0u8, 0u8); zones.len()];
    for &i in &order {
        let z = &zones[i];
        ids[i] = (
            intern(&mut bounds, &z.bounds, "bounding")?,
            intern(&mut a, &z.background_a, "background A")?,
            intern(&mut b, &z.background_b, "background B")?,
        );
    }

    let records = zones
        .iter()
        .zip(&ids)
        .map(|(z, &(bounding_id, background_a_id, background_b_id))| ZoneRecord {
            x: z.x,
            y: z.y,
            width: z.width,
            height: z.height,
            theme: z.theme,
            lighting: z.lighting,
            id: z.id,
            bounding_id,
            camera_mode: z.camera_mode,
            camera_zoom: z.camera_zoom,
            visibility: z.visibility,
            background_a_id,
            background_b_id,
            camera_track: z.camera_track,
            music: z.music,
            sound: z.sound,
        })
        .collect();

    let bounding = bounds
        .into_iter()
        .enumerate()
        .map(|(id, bounds)| BoundingRecord { id: id as u16, bounds })
        .collect();
    let to_bg = |v: Vec<Background>| {
        v.into_iter()
            .enumerate()
            .map(|(id, background)| BackgroundRecord {
                id: id as u16,
                background,
            })
            .collect()
    };
    Ok((records, bounding, to_bg(a), to_bg(b)))
}

/// Headers and the concatenated node list. Paths without nodes are
/// dropped.
fn pack_paths<'a, N: Record + 'a>(
    paths: impl Iterator<Item = (u8, bool, &'a [N])>,
) -> Result<(Vec<PathHeader>, Vec<&'a N>), CourseError> {
    let mut headers = Vec::new();
    let mut nodes = Vec::new();
    for (id, loops, path_nodes) in paths {
        if path_nodes.is_empty() {
            continue;
        }
        let start = u16::try_from(nodes.len()).map_err(|_| CourseError::overflow("path node index"))?;
        let count =
            u16::try_from(path_nodes.len()).map_err(|_| CourseError::overflow("path node count"))?;
        headers.push(PathHeader {
            id,
            start,
            count,
            flags: if loops { PathHeader::LOOPS } else { 0 },
        });
        nodes.extend(path_nodes);
    }
    Ok((headers, nodes))
}

fn node_slice<'n, N>(
    kind: BlockKind,
    h: &PathHeader,
    nodes: &'n [N],
    warnings: &mut Warnings,
) -> Option<&'n [N]> {
    let start = h.start as usize;
    let end = start + h.count as usize;
    let slice = nodes.get(start..end);
    if slice.is_none() {
        let e = CourseError::malformed(
            kind,
            format!("path {} wants nodes {start}..{end} of {}", h.id, nodes.len()),
        );
        warn!("{e}");
        warnings.push(e);
    }
    slice
}

fn decode_layer(layer: usize, data: &[u8], policy: LengthPolicy) -> Result<Vec<Object>, CourseError> {
    let malformed = |reason: String| CourseError::MalformedLayer { layer, reason };
    let (objs, rem) = read_records::<Object>(data, &LAYER_TERMINATOR).map_err(|e| malformed(e.to_string()))?;
    if rem != 0 {
        if policy == LengthPolicy::Strict {
            return Err(malformed(format!(
                "length {} is not a multiple of {}",
                data.len(),
                Object::SIZE
            )));
        }
        warn!("object layer {layer}: dropping {rem} trailing bytes");
    }
    Ok(objs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: u8, x: u16, y: u16) -> Zone {
        Zone {
            id,
            x,
            y,
            width: 512,
            height: 256,
            ..Zone::default()
        }
    }

    fn sample() -> Area {
        let mut area = Area::new(1);
        area.zones = vec![zone(0, 256, 256), zone(1, 1024, 256)];
        area.zones[1].bounds.y_upper = -64;
        area.entrances.push(Entrance {
            id: 0,
            x: 300,
            y: 300,
            ..Entrance::default()
        });
        area.sprites = vec![
            Sprite {
                kind: 20,
                x: 1100,
                y: 300,
                ..Sprite::default()
            },
            Sprite {
                kind: 5,
                x: 300,
                y: 300,
                ..Sprite::default()
            },
        ];
        area.layers[0].push(Object::new(0, 3, 10, 20));
        area
    }

    fn reload(saved: &SavedArea, number: usize) -> (Area, Warnings) {
        let layers = [0, 1, 2].map(|i| saved.layers[i].as_deref());
        Area::load(&saved.course, layers, number, &LoadOptions::strict()).expect("load")
    }

    #[test]
    fn save_sets_zone_ids_without_reordering() {
        let area = sample();
        let saved = area.save().expect("save");
        let (back, warnings) = reload(&saved, 1);
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(back.sprites[0].zone_id, 1);
        assert_eq!(back.sprites[1].zone_id, 0);
        assert_eq!(back.sprites[0].kind, 20);
        // in-memory sprites are untouched
        assert_eq!(area.sprites[0].zone_id, 0);
    }

    #[test]
    fn sort_groups_sprites_by_zone() {
        let mut area = sample();
        area.sort_sprites_by_zone();
        assert_eq!(area.sprites[0].kind, 5);
        assert_eq!(area.sprites[1].zone_id, 1);
    }

    #[test]
    fn zones_keep_their_bounds_and_backgrounds() {
        let mut area = sample();
        area.zones[0].background_b.bg1 = 0x0A;
        let (back, _) = reload(&area.save().expect("save"), 1);
        assert_eq!(back.zones, area.zones);
    }

    #[test]
    fn identical_bounding_records_are_shared() {
        let mut area = sample();
        area.zones.push(zone(2, 2048, 256));
        let saved = area.save().expect("save");
        let (blocks, _) = CourseBlocks::decode(&saved.course).expect("blocks");
        // zones 0 and 2 share default bounds, zone 1 differs
        assert_eq!(blocks.get(BlockKind::Bounding).len(), 2 * BoundingRecord::SIZE);
        assert_eq!(blocks.get(BlockKind::BackgroundA).len(), BackgroundRecord::SIZE);
    }

    #[test]
    fn loaded_sprites_are_sorted_unique_kinds() {
        let mut area = sample();
        area.sprites.push(Sprite {
            kind: 5,
            ..Sprite::default()
        });
        let saved = area.save().expect("save");
        let (blocks, _) = CourseBlocks::decode(&saved.course).expect("blocks");
        assert_eq!(blocks.get(BlockKind::LoadedSprites), &[0, 5, 0, 0, 0, 20, 0, 0]);
    }

    #[test]
    fn empty_layers_are_not_written() {
        let saved = sample().save().expect("save");
        assert_eq!(saved.layers[0].as_ref().map(Vec::len), Some(16 + 2));
        assert!(saved.layers[1].is_none());
        assert!(saved.layers[2].is_none());
    }

    #[test]
    fn saving_twice_gives_identical_bytes() {
        let mut area = sample();
        area.comments.push(Comment {
            x: 5,
            y: 6,
            text: "note".into(),
        });
        area.paths.push(Path {
            id: 3,
            loops: true,
            nodes: vec![PathNode::default(); 2],
        });
        let first = area.save().expect("save");
        let (back, _) = reload(&first, 1);
        assert_eq!(back.comments, area.comments);
        assert!(back.metadata.is_empty());
        assert_eq!(back.save().expect("resave"), first);
    }

    #[test]
    fn passthrough_blocks_are_kept() {
        let mut blocks = CourseBlocks::decode(&sample().save().expect("save").course)
            .expect("blocks")
            .0;
        blocks.set(BlockKind::Unused12, vec![1, 2, 3, 4]);
        let (area, _) = Area::load(&blocks.encode().expect("encode"), [None; 3], 1, &LoadOptions::default())
            .expect("load");
        let (again, _) = CourseBlocks::decode(&area.save().expect("save").course).expect("blocks");
        assert_eq!(again.get(BlockKind::Unused12), &[1, 2, 3, 4]);
    }

    #[test]
    fn malformed_block_only_empties_its_list() {
        let mut blocks = CourseBlocks::decode(&sample().save().expect("save").course)
            .expect("blocks")
            .0;
        let mut ents = blocks.get(BlockKind::Entrances).to_vec();
        ents.push(0);
        blocks.set(BlockKind::Entrances, ents);
        let course = blocks.encode().expect("encode");

        let (strict, warnings) =
            Area::load(&course, [None; 3], 1, &LoadOptions::strict()).expect("load");
        assert!(strict.entrances.is_empty());
        assert_eq!(strict.zones.len(), 2);
        assert!(matches!(
            warnings[0],
            CourseError::MalformedBlock { block: BlockKind::Entrances, .. }
        ));

        let (lenient, warnings) =
            Area::load(&course, [None; 3], 1, &LoadOptions::default()).expect("load");
        assert_eq!(lenient.entrances.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn path_editing() {
        let mut area = Area::new(1);
        let id = area.add_path(PathNode::default()).expect("free id");
        assert!(area.insert_path_node(id, 5, PathNode { x: 16, ..PathNode::default() }));
        assert!(area.move_path_node(id, 1, 32, 48));
        assert_eq!(area.path(id).map(|p| p.nodes[1].x), Some(32));

        assert!(area.remove_path_node(id, 0).is_some());
        assert!(area.path(id).is_some());
        assert!(area.remove_path_node(id, 0).is_some());
        assert!(area.path(id).is_none());
    }

    #[test]
    fn new_entrances_and_locations_take_free_ids() {
        let mut area = sample();
        assert_eq!(area.add_entrance(Entrance::default()), Some(1));
        assert_eq!(area.add_location(Location::default()), Some(1));
        assert_eq!(area.add_location(Location::default()), Some(2));
    }

    #[test]
    fn object_layers_keep_order() {
        let mut area = Area::new(1);
        area.add_object(1, Object::new(1, 2, 0, 0));
        area.add_object(1, Object::new(1, 3, 0, 0));
        assert_eq!(area.add_object(3, Object::new(0, 0, 0, 0)), None);
        let removed = area.remove_object(1, 0).expect("object");
        assert_eq!(removed.kind, 2);
        assert_eq!(area.layers[1][0].kind, 3);
    }

    #[test]
    fn fully_populated_area_reloads_equal() {
        let mut area = sample();
        area.tilesets = ["Pa0_jyotyu", "Pa1_nohara", "", "Pa3_rail"].map(str::to_owned);
        area.options = AreaOptions {
            default_events: 0x0102_0304,
            time_limit: 300,
            wrap_flags: 1,
            start_entrance: 2,
            unknown: [1, 2, 3],
        };
        area.entrances.push(Entrance {
            x: 600,
            y: 320,
            camera_x: -16,
            camera_y: 24,
            id: 2,
            dest_area: 3,
            dest_entrance: 7,
            kind: 19,
            zone: 1,
            layer: 2,
            path: 4,
            settings: 0x0180,
            cp_direction: 5,
        });
        area.zones[0].theme = 3;
        area.zones[0].music = 9;
        area.zones[0].background_a.bg1 = 0x0A;
        area.zones[0].background_b = Background {
            x_scroll: 2,
            y_scroll: 1,
            y_pos: -8,
            x_pos: 12,
            bg1: 0x14,
            bg2: 0x15,
            bg3: 0x16,
            zoom: 3,
        };
        area.zones[1].bounds.y_lower2 = 96;
        area.zones[1].bounds.unknown = 7;
        area.zones[1].camera_mode = 2;
        area.sprites[0].zone_id = 1;
        area.sprites[0].data = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        area.sprites[1].tail = [0xAB, 0xCD];
        area.locations.push(Location {
            x: 32,
            y: 48,
            width: 64,
            height: 16,
            id: 3,
        });
        area.paths.push(Path {
            id: 1,
            loops: true,
            nodes: vec![
                PathNode {
                    x: 10,
                    y: 20,
                    speed: 1.5,
                    accel: 0.25,
                    delay: 30,
                },
                PathNode {
                    x: 40,
                    y: 20,
                    speed: 2.0,
                    accel: -0.5,
                    delay: 0,
                },
            ],
        });
        area.paths.push(Path {
            id: 2,
            loops: false,
            nodes: vec![PathNode::default()],
        });
        area.progress_paths.push(ProgressPath {
            id: 0,
            loops: false,
            nodes: vec![ProgressNode { x: 5, y: -5 }, ProgressNode { x: 50, y: 5 }],
        });
        area.comments = vec![
            Comment {
                x: 64,
                y: 64,
                text: "secret exit".into(),
            },
            Comment {
                x: 900,
                y: 128,
                text: "star coin".into(),
            },
        ];
        area.metadata.set_other_data("Custom", 7, vec![9, 8, 7, 6, 5]);
        area.metadata.set_str_data("Note", "kept").expect("latin-1");
        area.layers[1].push(Object::new(1, 40, 2, 9));
        area.layers[2].push(Object::new(3, 5, -4, 12));
        area.passthrough[1] = vec![0xDE, 0xAD, 0xBE, 0xEF];

        let saved = area.save().expect("save");
        let (back, warnings) = reload(&saved, 1);
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(back, area);
        assert_eq!(back.save().expect("save again"), saved);
    }
}
