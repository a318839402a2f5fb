//! Typed records for everything stored in a course file.
//!
//! Coordinates are in the units the game stores: objects use tiles, all
//! other entities use 1/16 tile.

use serde::Serialize;

/// Number of object layers per area.
pub const LAYER_COUNT: usize = 3;
/// Number of tileset slots per area.
pub const TILESET_SLOTS: usize = 4;
/// Tiles contributed by one tileset slot.
pub const TILES_PER_SLOT: u16 = 0x200;

/// Block 2: general area settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaOptions {
    /// Event flags set when the area starts
    pub default_events: u32,
    /// Level timer
    pub time_limit: i16,
    /// Bit 0 is the horizontal wrap flag; other bits are kept as found.
    pub wrap_flags: u16,
    /// Entrance id the player starts at
    pub start_entrance: u32,
    /// Kept as found
    pub unknown: [u8; 3],
}

impl AreaOptions {
    /// Whether the area wraps horizontally.
    pub fn wraps(&self) -> bool {
        self.wrap_flags & 1 != 0
    }

    /// Set or clear the wrap bit without touching the other flags.
    pub fn set_wraps(&mut self, wraps: bool) {
        if wraps {
            self.wrap_flags |= 1;
        } else {
            self.wrap_flags &= !1;
        }
    }
}

impl Default for AreaOptions {
    fn default() -> Self {
        Self {
            default_events: 0,
            time_limit: 400,
            wrap_flags: 0,
            start_entrance: 0,
            unknown: [100, 100, 100],
        }
    }
}

/// Block 7 entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Entrance {
    /// Left edge
    pub x: u16,
    /// Top edge
    pub y: u16,
    /// Camera offset x
    pub camera_x: i16,
    /// Camera offset y
    pub camera_y: i16,
    /// Entrance id, unique per area
    pub id: u8,
    /// Area a pipe or door leads to
    pub dest_area: u8,
    /// Entrance id in the destination area
    pub dest_entrance: u8,
    /// Entrance type (pipe, door, ...)
    pub kind: u8,
    /// Zone the entrance belongs to
    pub zone: u8,
    /// Layer the player enters on
    pub layer: u8,
    /// Path followed by pipe entrances
    pub path: u8,
    /// Flag bits
    pub settings: u16,
    /// Direction for connected pipes
    pub cp_direction: u8,
}

/// Block 8 entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Sprite {
    /// Sprite type
    pub kind: u16,
    /// Left edge
    pub x: u16,
    /// Top edge
    pub y: u16,
    /// Settings payload, addressed by nybble in sprite field schemas.
    pub data: [u8; 10],
    /// Zone the sprite belongs to. Recomputed from the position on save.
    pub zone_id: u16,
    /// Kept as found
    pub tail: [u8; 2],
}

impl Sprite {
    /// Number of addressable nybbles in `data`.
    pub const NYBBLES: usize = 20;

    /// Nybble `n` of the payload, 0 being the high half of the first byte.
    pub fn nybble(&self, n: usize) -> Option<u8> {
        let byte = *self.data.get(n / 2)?;
        Some(if n % 2 == 0 { byte >> 4 } else { byte & 0xF })
    }

    /// Overwrite nybble `n`; returns false when `n` is out of range.
    pub fn set_nybble(&mut self, n: usize, value: u8) -> bool {
        let Some(byte) = self.data.get_mut(n / 2) else {
            return false;
        };
        let value = value & 0xF;
        *byte = if n % 2 == 0 {
            (*byte & 0x0F) | (value << 4)
        } else {
            (*byte & 0xF0) | value
        };
        true
    }
}

/// Vertical camera limits of a zone (block 3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ZoneBounds {
    /// Upper camera limit
    pub y_upper: i32,
    /// Lower camera limit
    pub y_lower: i32,
    /// Upper limit while scrolling
    pub y_upper2: i32,
    /// Lower limit while scrolling
    pub y_lower2: i32,
    /// Kept as found
    pub unknown: u16,
}

/// Background layer settings (blocks 5 and 6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Background {
    /// Horizontal parallax rate
    pub x_scroll: u8,
    /// Vertical parallax rate
    pub y_scroll: u8,
    /// Vertical offset
    pub y_pos: i16,
    /// Horizontal offset
    pub x_pos: i16,
    /// First background graphic
    pub bg1: u16,
    /// Second background graphic
    pub bg2: u16,
    /// Third background graphic
    pub bg3: u16,
    /// Zoom setting
    pub zoom: u8,
}

/// Block 10 entry, merged with its bounding and background records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Zone {
    /// Left edge
    pub x: u16,
    /// Top edge
    pub y: u16,
    /// Width
    pub width: u16,
    /// Height
    pub height: u16,
    /// Tile graphics theme
    pub theme: u16,
    /// Lighting mode
    pub lighting: u16,
    /// Zone id sprites refer to
    pub id: u8,
    /// Camera mode
    pub camera_mode: u8,
    /// Camera zoom
    pub camera_zoom: u8,
    /// Visibility flags
    pub visibility: u8,
    /// Camera tracking mode
    pub camera_track: u8,
    /// Music track
    pub music: u8,
    /// Sound effect modifier
    pub sound: u8,
    /// Camera limits
    pub bounds: ZoneBounds,
    /// Background layer A
    pub background_a: Background,
    /// Background layer B
    pub background_b: Background,
}

impl Zone {
    /// The zone's rectangle.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x as i32, self.y as i32, self.width as i32, self.height as i32)
    }
}

/// Block 11 entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Location {
    /// Left edge
    pub x: u16,
    /// Top edge
    pub y: u16,
    /// Width
    pub width: u16,
    /// Height
    pub height: u16,
    /// Location id, 1-255
    pub id: u8,
}

/// One stop along a [`Path`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PathNode {
    /// Position x
    pub x: u16,
    /// Position y
    pub y: u16,
    /// Speed towards the next node
    pub speed: f32,
    /// Acceleration towards the next node
    pub accel: f32,
    /// Frames to wait here
    pub delay: i16,
}

/// A path (blocks 13 and 14). Node order defines node identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Path {
    /// Path id
    pub id: u8,
    /// Whether the last node leads back to the first
    pub loops: bool,
    /// Nodes in travel order
    pub nodes: Vec<PathNode>,
}

/// One point of a [`ProgressPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressNode {
    /// Position x
    pub x: i16,
    /// Position y
    pub y: i16,
}

/// A progress path (blocks 16 and 17).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ProgressPath {
    /// Path id
    pub id: u8,
    /// Whether the path loops
    pub loops: bool,
    /// Nodes in travel order
    pub nodes: Vec<ProgressNode>,
}

/// Editor-only annotation, stored in the metadata blob.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Comment {
    /// Position x
    pub x: u32,
    /// Position y
    pub y: u32,
    /// Comment text, latin-1 only
    pub text: String,
}

/// A placed tileset object. The layer is the list it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Object {
    /// Tileset slot 0-3
    pub tileset: u8,
    /// Object definition index inside the tileset
    pub kind: u8,
    /// Left edge in tiles
    pub x: i16,
    /// Top edge in tiles
    pub y: i16,
    /// Width in tiles
    pub width: u16,
    /// Height in tiles
    pub height: u16,
}

impl Object {
    /// A 1x1 object at the given tile position.
    pub fn new(tileset: u8, kind: u8, x: i16, y: i16) -> Self {
        Self {
            tileset,
            kind,
            x,
            y,
            width: 1,
            height: 1,
        }
    }
}

/// Integer rectangle with inclusive containment, matching the editor's
/// zone hit-testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: i32,
    /// Height
    pub height: i32,
}

impl Rect {
    /// Rectangle from its top-left corner and size.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Points on the edges count as inside.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    /// Whether the interiors overlap; touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Euclidean distance from a point to the rectangle; 0 when inside.
    pub fn distance_to(&self, px: i32, py: i32) -> f64 {
        let dx = if px < self.x {
            self.x - px
        } else if px > self.right() {
            px - self.right()
        } else {
            0
        };
        let dy = if py < self.y {
            self.y - py
        } else if py > self.bottom() {
            py - self.bottom()
        } else {
            0
        };
        ((dx as f64).powi(2) + (dy as f64).powi(2)).sqrt()
    }
}
