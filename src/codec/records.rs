//! Fixed-size big-endian records and the helpers that turn blocks into
//! record lists and back.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::warn;
use std::io::{self, Cursor, Read, Write};

use crate::codec::blocks::BlockKind;
use crate::config::LengthPolicy;
use crate::error::CourseError;
use crate::model::*;

/// Sprite block terminator.
pub const SPRITE_TERMINATOR: [u8; 4] = [0xFF; 4];
/// Object layer stream terminator.
pub const LAYER_TERMINATOR: [u8; 2] = [0xFF; 2];

/// A fixed-width record stored back to back inside a block.
pub trait Record: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Read one record; the reader is positioned at its first byte.
    fn read_from<R: Read>(r: &mut R) -> io::Result<Self>;

    /// Write exactly [`Self::SIZE`] bytes.
    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()>;
}

fn skip<R: Read>(r: &mut R, n: usize) -> io::Result<()> {
    let mut pad = [0u8; 16];
    r.read_exact(&mut pad[..n])
}

fn pad<W: Write>(w: &mut W, n: usize) -> io::Result<()> {
    w.write_all(&[0u8; 16][..n])
}

/// Read as many whole records as `data` holds.
///
/// `terminator` is stripped from the end first when present. Returns the
/// records and the number of trailing bytes that did not form a record.
pub fn read_records<T: Record>(data: &[u8], terminator: &[u8]) -> io::Result<(Vec<T>, usize)> {
    let mut body = data;
    if !terminator.is_empty() && body.len() % T::SIZE == terminator.len() && body.ends_with(terminator) {
        body = &body[..body.len() - terminator.len()];
    }

    let count = body.len() / T::SIZE;
    let mut cur = Cursor::new(body);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(T::read_from(&mut cur)?);
    }
    Ok((out, body.len() % T::SIZE))
}

/// Decode every record of a block, applying `policy` to a trailing
/// partial record.
pub fn decode_records<T: Record>(
    block: BlockKind,
    data: &[u8],
    terminator: &[u8],
    policy: LengthPolicy,
) -> Result<Vec<T>, CourseError> {
    let (records, rem) =
        read_records(data, terminator).map_err(|e| CourseError::malformed(block, e.to_string()))?;
    if rem != 0 {
        match policy {
            LengthPolicy::Strict => {
                return Err(CourseError::malformed(
                    block,
                    format!("length {} is not a multiple of {}", data.len(), T::SIZE),
                ));
            }
            LengthPolicy::Lenient => {
                warn!("{block}: dropping {rem} trailing bytes of a partial record");
            }
        }
    }
    Ok(records)
}

/// Encode records back to back and append `terminator`.
pub fn encode_records<'a, T, I>(records: I, terminator: &[u8]) -> Vec<u8>
where
    T: Record + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut out = Vec::new();
    for rec in records {
        // writes into a Vec cannot fail
        let _ = rec.write_to(&mut out);
    }
    out.extend_from_slice(terminator);
    out
}

/// Block 1: four 32-byte, null-padded latin-1 names.
pub fn decode_tileset_names(data: &[u8]) -> Result<[String; TILESET_SLOTS], CourseError> {
    if data.len() < 32 * TILESET_SLOTS {
        return Err(CourseError::malformed(
            BlockKind::TilesetNames,
            format!("expected 128 bytes, found {}", data.len()),
        ));
    }
    Ok(std::array::from_fn(|i| {
        data[i * 32..(i + 1) * 32]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect()
    }))
}

/// Four zero-padded 32-byte names. Longer names give
/// [`CourseError::EncodeOverflow`].
pub fn encode_tileset_names(names: &[String; TILESET_SLOTS]) -> Result<Vec<u8>, CourseError> {
    let mut out = vec![0u8; 32 * TILESET_SLOTS];
    for (i, name) in names.iter().enumerate() {
        let bytes = latin1_bytes(name)?;
        if bytes.len() > 32 {
            return Err(CourseError::overflow(format!("tileset name '{name}'")));
        }
        out[i * 32..i * 32 + bytes.len()].copy_from_slice(&bytes);
    }
    Ok(out)
}

/// One byte per character; fails on anything above U+00FF.
pub fn latin1_bytes(s: &str) -> Result<Vec<u8>, CourseError> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| CourseError::NotLatin1(s.to_owned())))
        .collect()
}

/// Inverse of [`latin1_bytes`]; every byte maps to the code point of the
/// same value.
pub fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

impl Record for AreaOptions {
    const SIZE: usize = 20;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let default_events = r.read_u32::<BigEndian>()?;
        skip(r, 4)?;
        let time_limit = r.read_i16::<BigEndian>()?;
        let wrap_flags = r.read_u16::<BigEndian>()?;
        let start_entrance = r.read_u32::<BigEndian>()?;
        let mut unknown = [0u8; 3];
        r.read_exact(&mut unknown)?;
        skip(r, 1)?;
        Ok(Self {
            default_events,
            time_limit,
            wrap_flags,
            start_entrance,
            unknown,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<BigEndian>(self.default_events)?;
        pad(w, 4)?;
        w.write_i16::<BigEndian>(self.time_limit)?;
        w.write_u16::<BigEndian>(self.wrap_flags)?;
        w.write_u32::<BigEndian>(self.start_entrance)?;
        w.write_all(&self.unknown)?;
        pad(w, 1)
    }
}

impl Record for Entrance {
    const SIZE: usize = 24;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let x = r.read_u16::<BigEndian>()?;
        let y = r.read_u16::<BigEndian>()?;
        let camera_x = r.read_i16::<BigEndian>()?;
        let camera_y = r.read_i16::<BigEndian>()?;
        let id = r.read_u8()?;
        let dest_area = r.read_u8()?;
        let dest_entrance = r.read_u8()?;
        let kind = r.read_u8()?;
        skip(r, 1)?;
        let zone = r.read_u8()?;
        let layer = r.read_u8()?;
        let path = r.read_u8()?;
        let settings = r.read_u16::<BigEndian>()?;
        skip(r, 1)?;
        let cp_direction = r.read_u8()?;
        skip(r, 4)?;
        Ok(Self {
            x,
            y,
            camera_x,
            camera_y,
            id,
            dest_area,
            dest_entrance,
            kind,
            zone,
            layer,
            path,
            settings,
            cp_direction,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<BigEndian>(self.x)?;
        w.write_u16::<BigEndian>(self.y)?;
        w.write_i16::<BigEndian>(self.camera_x)?;
        w.write_i16::<BigEndian>(self.camera_y)?;
        w.write_all(&[self.id, self.dest_area, self.dest_entrance, self.kind, 0])?;
        w.write_all(&[self.zone, self.layer, self.path])?;
        w.write_u16::<BigEndian>(self.settings)?;
        w.write_all(&[0, self.cp_direction])?;
        pad(w, 4)
    }
}

impl Record for Sprite {
    const SIZE: usize = 24;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let kind = r.read_u16::<BigEndian>()?;
        let x = r.read_u16::<BigEndian>()?;
        let y = r.read_u16::<BigEndian>()?;
        let mut data = [0u8; 10];
        r.read_exact(&mut data)?;
        let zone_id = r.read_u16::<BigEndian>()?;
        let mut tail = [0u8; 2];
        r.read_exact(&mut tail)?;
        skip(r, 4)?;
        Ok(Self {
            kind,
            x,
            y,
            data,
            zone_id,
            tail,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<BigEndian>(self.kind)?;
        w.write_u16::<BigEndian>(self.x)?;
        w.write_u16::<BigEndian>(self.y)?;
        w.write_all(&self.data)?;
        w.write_u16::<BigEndian>(self.zone_id)?;
        w.write_all(&self.tail)?;
        pad(w, 4)
    }
}

/// Block 9 entry: a sprite kind the game must load for this area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedSprite(pub u16);

impl Record for LoadedSprite {
    const SIZE: usize = 4;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let kind = r.read_u16::<BigEndian>()?;
        skip(r, 2)?;
        Ok(Self(kind))
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<BigEndian>(self.0)?;
        pad(w, 2)
    }
}

/// Block 3 entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundingRecord {
    /// Referenced by [`ZoneRecord::bounding_id`]
    pub id: u16,
    /// Camera limits
    pub bounds: ZoneBounds,
}

impl Record for BoundingRecord {
    const SIZE: usize = 28;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let y_upper = r.read_i32::<BigEndian>()?;
        let y_lower = r.read_i32::<BigEndian>()?;
        let y_upper2 = r.read_i32::<BigEndian>()?;
        let y_lower2 = r.read_i32::<BigEndian>()?;
        let id = r.read_u16::<BigEndian>()?;
        let unknown = r.read_u16::<BigEndian>()?;
        skip(r, 8)?;
        Ok(Self {
            id,
            bounds: ZoneBounds {
                y_upper,
                y_lower,
                y_upper2,
                y_lower2,
                unknown,
            },
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let b = &self.bounds;
        w.write_i32::<BigEndian>(b.y_upper)?;
        w.write_i32::<BigEndian>(b.y_lower)?;
        w.write_i32::<BigEndian>(b.y_upper2)?;
        w.write_i32::<BigEndian>(b.y_lower2)?;
        w.write_u16::<BigEndian>(self.id)?;
        w.write_u16::<BigEndian>(b.unknown)?;
        pad(w, 8)
    }
}

/// Block 5/6 entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundRecord {
    /// Referenced by the zone's background id for this layer
    pub id: u16,
    /// Layer settings
    pub background: Background,
}

impl Record for BackgroundRecord {
    const SIZE: usize = 28;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let id = r.read_u16::<BigEndian>()?;
        let x_scroll = r.read_u8()?;
        let y_scroll = r.read_u8()?;
        let y_pos = r.read_i16::<BigEndian>()?;
        let x_pos = r.read_i16::<BigEndian>()?;
        let bg1 = r.read_u16::<BigEndian>()?;
        let bg2 = r.read_u16::<BigEndian>()?;
        let bg3 = r.read_u16::<BigEndian>()?;
        skip(r, 3)?;
        let zoom = r.read_u8()?;
        skip(r, 10)?;
        Ok(Self {
            id,
            background: Background {
                x_scroll,
                y_scroll,
                y_pos,
                x_pos,
                bg1,
                bg2,
                bg3,
                zoom,
            },
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let b = &self.background;
        w.write_u16::<BigEndian>(self.id)?;
        w.write_all(&[b.x_scroll, b.y_scroll])?;
        w.write_i16::<BigEndian>(b.y_pos)?;
        w.write_i16::<BigEndian>(b.x_pos)?;
        w.write_u16::<BigEndian>(b.bg1)?;
        w.write_u16::<BigEndian>(b.bg2)?;
        w.write_u16::<BigEndian>(b.bg3)?;
        pad(w, 3)?;
        w.write_u8(b.zoom)?;
        pad(w, 10)
    }
}

/// Block 10 entry as stored: the zone with references to its bounding and
/// background records.
///
/// Fields other than the three record ids mirror [`Zone`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZoneRecord {
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
    /// Zone id
    pub id: u8,
    /// Id of the [`BoundingRecord`]
    pub bounding_id: u8,
    /// Camera mode
    pub camera_mode: u8,
    /// Camera zoom
    pub camera_zoom: u8,
    /// Visibility flags
    pub visibility: u8,
    /// Id of the background A [`BackgroundRecord`]
    pub background_a_id: u8,
    /// Id of the background B [`BackgroundRecord`]
    pub background_b_id: u8,
    /// Camera tracking mode
    pub camera_track: u8,
    /// Music track
    pub music: u8,
    /// Sound effect modifier
    pub sound: u8,
}

impl Record for ZoneRecord {
    const SIZE: usize = 28;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let x = r.read_u16::<BigEndian>()?;
        let y = r.read_u16::<BigEndian>()?;
        let width = r.read_u16::<BigEndian>()?;
        let height = r.read_u16::<BigEndian>()?;
        let theme = r.read_u16::<BigEndian>()?;
        let lighting = r.read_u16::<BigEndian>()?;
        let id = r.read_u8()?;
        let bounding_id = r.read_u8()?;
        let camera_mode = r.read_u8()?;
        let camera_zoom = r.read_u8()?;
        skip(r, 1)?;
        let visibility = r.read_u8()?;
        let background_a_id = r.read_u8()?;
        let background_b_id = r.read_u8()?;
        let camera_track = r.read_u8()?;
        skip(r, 1)?;
        let music = r.read_u8()?;
        let sound = r.read_u8()?;
        skip(r, 4)?;
        Ok(Self {
            x,
            y,
            width,
            height,
            theme,
            lighting,
            id,
            bounding_id,
            camera_mode,
            camera_zoom,
            visibility,
            background_a_id,
            background_b_id,
            camera_track,
            music,
            sound,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for v in [self.x, self.y, self.width, self.height, self.theme, self.lighting] {
            w.write_u16::<BigEndian>(v)?;
        }
        w.write_all(&[
            self.id,
            self.bounding_id,
            self.camera_mode,
            self.camera_zoom,
            0,
            self.visibility,
            self.background_a_id,
            self.background_b_id,
            self.camera_track,
            0,
            self.music,
            self.sound,
        ])?;
        pad(w, 4)
    }
}

impl Record for Location {
    const SIZE: usize = 12;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let x = r.read_u16::<BigEndian>()?;
        let y = r.read_u16::<BigEndian>()?;
        let width = r.read_u16::<BigEndian>()?;
        let height = r.read_u16::<BigEndian>()?;
        let id = r.read_u8()?;
        skip(r, 3)?;
        Ok(Self {
            x,
            y,
            width,
            height,
            id,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<BigEndian>(self.x)?;
        w.write_u16::<BigEndian>(self.y)?;
        w.write_u16::<BigEndian>(self.width)?;
        w.write_u16::<BigEndian>(self.height)?;
        w.write_u8(self.id)?;
        pad(w, 3)
    }
}

/// Path or progress-path header (blocks 13 and 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathHeader {
    /// Path id
    pub id: u8,
    /// Index of the first node in the node block
    pub start: u16,
    /// Number of nodes
    pub count: u16,
    /// [`PathHeader::LOOPS`] or 0
    pub flags: u16,
}

impl PathHeader {
    /// Flag value marking a looping path.
    pub const LOOPS: u16 = 2;
}

impl Record for PathHeader {
    const SIZE: usize = 12;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let id = r.read_u8()?;
        skip(r, 1)?;
        let start = r.read_u16::<BigEndian>()?;
        let count = r.read_u16::<BigEndian>()?;
        let flags = r.read_u16::<BigEndian>()?;
        skip(r, 4)?;
        Ok(Self {
            id,
            start,
            count,
            flags,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&[self.id, 0])?;
        w.write_u16::<BigEndian>(self.start)?;
        w.write_u16::<BigEndian>(self.count)?;
        w.write_u16::<BigEndian>(self.flags)?;
        pad(w, 4)
    }
}

impl Record for PathNode {
    const SIZE: usize = 20;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let x = r.read_u16::<BigEndian>()?;
        let y = r.read_u16::<BigEndian>()?;
        let speed = r.read_f32::<BigEndian>()?;
        let accel = r.read_f32::<BigEndian>()?;
        let delay = r.read_i16::<BigEndian>()?;
        skip(r, 6)?;
        Ok(Self {
            x,
            y,
            speed,
            accel,
            delay,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<BigEndian>(self.x)?;
        w.write_u16::<BigEndian>(self.y)?;
        w.write_f32::<BigEndian>(self.speed)?;
        w.write_f32::<BigEndian>(self.accel)?;
        w.write_i16::<BigEndian>(self.delay)?;
        pad(w, 6)
    }
}

impl Record for ProgressNode {
    const SIZE: usize = 20;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let x = r.read_i16::<BigEndian>()?;
        let y = r.read_i16::<BigEndian>()?;
        skip(r, 16)?;
        Ok(Self { x, y })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_i16::<BigEndian>(self.x)?;
        w.write_i16::<BigEndian>(self.y)?;
        pad(w, 16)
    }
}

impl Record for Object {
    const SIZE: usize = 16;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let packed = r.read_u16::<BigEndian>()?;
        let x = r.read_i16::<BigEndian>()?;
        let y = r.read_i16::<BigEndian>()?;
        let width = r.read_u16::<BigEndian>()?;
        let height = r.read_u16::<BigEndian>()?;
        skip(r, 6)?;
        Ok(Self {
            tileset: ((packed >> 12) & 3) as u8,
            kind: (packed & 0xFF) as u8,
            x,
            y,
            width,
            height,
        })
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<BigEndian>(((self.tileset as u16) << 12) | self.kind as u16)?;
        w.write_i16::<BigEndian>(self.x)?;
        w.write_i16::<BigEndian>(self.y)?;
        w.write_u16::<BigEndian>(self.width)?;
        w.write_u16::<BigEndian>(self.height)?;
        pad(w, 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_encoded_length() {
        fn check<T: Record + Default>() {
            let bytes = encode_records([&T::default()], &[]);
            assert_eq!(bytes.len(), T::SIZE);
        }
        check::<Entrance>();
        check::<Sprite>();
        check::<Location>();
        check::<PathNode>();
        check::<ProgressNode>();
        check::<ZoneRecord>();
        check::<AreaOptions>();
    }

    #[test]
    fn three_entrances_decode_from_72_bytes() {
        let entrances: Vec<Entrance> = (0..3)
            .map(|i| Entrance {
                id: i,
                x: 16 * i as u16,
                settings: 0x80,
                ..Entrance::default()
            })
            .collect();
        let bytes = encode_records(&entrances, &[]);
        assert_eq!(bytes.len(), 72);

        let decoded: Vec<Entrance> =
            decode_records(BlockKind::Entrances, &bytes, &[], LengthPolicy::Strict).expect("decode");
        assert_eq!(decoded, entrances);
    }

    #[test]
    fn entrance_fields_land_at_fixed_offsets() {
        let e = Entrance {
            x: 0x0102,
            y: 0x0304,
            id: 7,
            dest_area: 2,
            dest_entrance: 9,
            kind: 20,
            zone: 1,
            layer: 2,
            path: 3,
            settings: 0xABCD,
            cp_direction: 5,
            ..Entrance::default()
        };
        let b = encode_records([&e], &[]);
        assert_eq!(&b[0..4], &[1, 2, 3, 4]);
        assert_eq!(&b[8..12], &[7, 2, 9, 20]);
        assert_eq!(&b[13..16], &[1, 2, 3]);
        assert_eq!(&b[16..18], &[0xAB, 0xCD]);
        assert_eq!(b[19], 5);
    }

    #[test]
    fn sprite_terminator_is_stripped() {
        let sprites = vec![Sprite {
            kind: 0x1F,
            x: 32,
            y: 48,
            data: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
            zone_id: 0,
            tail: [0xAA, 0xBB],
        }];
        let bytes = encode_records(&sprites, &SPRITE_TERMINATOR);
        assert_eq!(bytes.len(), 28);
        assert_eq!(&bytes[24..], &[0xFF; 4]);

        let decoded: Vec<Sprite> =
            decode_records(BlockKind::Sprites, &bytes, &SPRITE_TERMINATOR, LengthPolicy::Strict)
                .expect("decode");
        assert_eq!(decoded, sprites);
    }

    #[test]
    fn strict_mode_rejects_partial_records() {
        let bytes = vec![0u8; 12 * 2 + 5];
        let err = decode_records::<Location>(BlockKind::Locations, &bytes, &[], LengthPolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, CourseError::MalformedBlock { block: BlockKind::Locations, .. }));

        let lenient =
            decode_records::<Location>(BlockKind::Locations, &bytes, &[], LengthPolicy::Lenient)
                .expect("lenient");
        assert_eq!(lenient.len(), 2);
    }

    #[test]
    fn object_packs_tileset_into_high_nybble() {
        let obj = Object {
            tileset: 2,
            kind: 0x45,
            x: -3,
            y: 10,
            width: 4,
            height: 1,
        };
        let bytes = encode_records([&obj], &LAYER_TERMINATOR);
        assert_eq!(&bytes[0..2], &[0x20, 0x45]);
        assert_eq!(&bytes[2..4], &[0xFF, 0xFD]);
        assert_eq!(&bytes[16..], &[0xFF, 0xFF]);
    }

    #[test]
    fn tileset_names_are_null_padded() {
        let names = [
            "Pa0_jyotyu".to_owned(),
            String::new(),
            "Pa2_sora".to_owned(),
            String::new(),
        ];
        let bytes = encode_tileset_names(&names).expect("encode");
        assert_eq!(bytes.len(), 128);
        assert_eq!(bytes[10], 0);
        assert_eq!(decode_tileset_names(&bytes).expect("decode"), names);
    }

    #[test]
    fn overlong_tileset_name_is_an_encode_error() {
        let mut names: [String; 4] = Default::default();
        names[0] = "x".repeat(33);
        assert!(matches!(
            encode_tileset_names(&names),
            Err(CourseError::EncodeOverflow { .. })
        ));
    }
}
