//! Text form of copied objects and sprites:
//! `ReggieClip|0:ts:kind:layer:x:y:w:h|1:kind:x:y:d0:..:d9|%`.

use log::debug;
use std::fmt;

use crate::area::Area;
use crate::model::{Object, Sprite, LAYER_COUNT};

const MAGIC: &str = "ReggieClip";
const SUFFIX: &str = "|%";

/// Objects (by layer) and sprites on the clipboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clip {
    /// Objects per layer
    pub layers: [Vec<Object>; LAYER_COUNT],
    /// Sprites in pixel coordinates
    pub sprites: Vec<Sprite>,
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MAGIC)?;
        for (layer, objs) in self.layers.iter().enumerate() {
            for o in objs {
                write!(
                    f,
                    "|0:{}:{}:{}:{}:{}:{}:{}",
                    o.tileset, o.kind, layer, o.x, o.y, o.width, o.height
                )?;
            }
        }
        for s in &self.sprites {
            write!(f, "|1:{}:{}:{}", s.kind, s.x, s.y)?;
            for b in s.data {
                write!(f, ":{b}")?;
            }
        }
        f.write_str(SUFFIX)
    }
}

impl Clip {
    /// Whether nothing was copied.
    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty() && self.layers.iter().all(Vec::is_empty)
    }

    /// Parse clipboard text. `None` when the framing is wrong; items that
    /// fail their range checks are skipped.
    pub fn parse(text: &str) -> Option<Self> {
        let body = text.strip_prefix(MAGIC)?.strip_suffix(SUFFIX)?;
        if !body.is_empty() && !body.starts_with('|') {
            return None;
        }
        let mut clip = Clip::default();
        for item in body.split('|').skip(1) {
            let fields: Vec<&str> = item.split(':').collect();
            let parsed = match fields.first() {
                Some(&"0") => parse_object(&fields[1..]).map(|(layer, o)| clip.layers[layer].push(o)),
                Some(&"1") => parse_sprite(&fields[1..]).map(|s| clip.sprites.push(s)),
                _ => None,
            };
            if parsed.is_none() {
                debug!("skipping clipboard item '{item}'");
            }
        }
        Some(clip)
    }

    /// Append the contents to `area`, shifted by `(dx, dy)` tiles. Objects
    /// land on top of their layers.
    pub fn paste_into(&self, area: &mut Area, dx: i16, dy: i16) {
        for (layer, objs) in self.layers.iter().enumerate() {
            for o in objs {
                let mut o = o.clone();
                o.x = o.x.saturating_add(dx);
                o.y = o.y.saturating_add(dy);
                area.layers[layer].push(o);
            }
        }
        for s in &self.sprites {
            let mut s = s.clone();
            s.x = s.x.saturating_add_signed(dx.saturating_mul(16));
            s.y = s.y.saturating_add_signed(dy.saturating_mul(16));
            area.sprites.push(s);
        }
    }
}

fn num<T: std::str::FromStr + PartialOrd>(s: &str, lo: T, hi: T) -> Option<T> {
    let v: T = s.parse().ok()?;
    (v >= lo && v <= hi).then_some(v)
}

fn parse_object(f: &[&str]) -> Option<(usize, Object)> {
    let [ts, kind, layer, x, y, w, h] = f else {
        return None;
    };
    let obj = Object {
        tileset: num(ts, 0, 3)?,
        kind: num(kind, 0, 255)?,
        x: num(x, 0, 1023)?,
        y: num(y, 0, 511)?,
        width: num(w, 1, 1023)?,
        height: num(h, 1, 511)?,
    };
    Some((num(layer, 0, LAYER_COUNT - 1)?, obj))
}

fn parse_sprite(f: &[&str]) -> Option<Sprite> {
    if f.len() != 13 {
        return None;
    }
    let mut data = [0u8; 10];
    for (d, s) in data.iter_mut().zip(&f[3..]) {
        *d = s.parse().ok()?;
    }
    Some(Sprite {
        kind: f[0].parse().ok()?,
        x: f[1].parse().ok()?,
        y: f[2].parse().ok()?,
        data,
        ..Sprite::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_layout() {
        let mut clip = Clip::default();
        clip.layers[1].push(Object {
            tileset: 1,
            kind: 4,
            x: 10,
            y: 20,
            width: 3,
            height: 2,
        });
        clip.sprites.push(Sprite {
            kind: 47,
            x: 160,
            y: 320,
            data: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
            ..Sprite::default()
        });
        let text = clip.to_string();
        assert_eq!(
            text,
            "ReggieClip|0:1:4:1:10:20:3:2|1:47:160:320:0:1:2:3:4:5:6:7:8:9|%"
        );
        assert_eq!(Clip::parse(&text), Some(clip));
    }

    #[test]
    fn invalid_items_are_skipped() {
        let text = "ReggieClip|0:4:1:0:0:0:1:1|0:0:1:0:5:5:1:1|0:0:1:3:0:0:1:1|1:2:x:0|%";
        let clip = Clip::parse(text).expect("framed");
        assert_eq!(clip.layers[0].len(), 1);
        assert_eq!(clip.layers[0][0].x, 5);
        assert!(clip.sprites.is_empty());
    }

    #[test]
    fn bad_framing_is_rejected() {
        assert!(Clip::parse("0:0:1:0:5:5:1:1|%").is_none());
        assert!(Clip::parse("ReggieClip|0:0:1:0:5:5:1:1").is_none());
        assert!(Clip::parse("ReggieClipX|%").is_none());
        assert_eq!(Clip::parse("ReggieClip|%"), Some(Clip::default()));
    }

    #[test]
    fn paste_offsets_objects_and_sprites() {
        let clip = Clip::parse("ReggieClip|0:0:1:2:5:5:1:1|1:3:16:16:0:0:0:0:0:0:0:0:0:0|%")
            .expect("framed");
        let mut area = Area::new(1);
        clip.paste_into(&mut area, 2, -1);
        assert_eq!((area.layers[2][0].x, area.layers[2][0].y), (7, 4));
        assert_eq!((area.sprites[0].x, area.sprites[0].y), (48, 0));
    }
}
