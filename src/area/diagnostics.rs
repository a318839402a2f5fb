//! Consistency checks the game relies on, with automatic fixes.

use log::info;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::{lowest_free, Area};
use crate::model::Zone;

/// Smallest coordinate a zone edge may sit at.
pub const ZONE_MIN: i32 = 16;
/// Largest x a zone's right edge may reach.
pub const ZONE_MAX_X: i32 = 16384 - 16;
/// Largest y a zone's bottom edge may reach.
pub const ZONE_MAX_Y: i32 = 8192 - 16;

/// A problem found by [`check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// Entrance at `index` reuses an id already taken by an earlier one.
    DuplicateEntranceId {
        /// Position in the entrance list
        index: usize,
        /// The id found there
        id: u8,
    },
    /// Location at `index` reuses an id or has the reserved id 0.
    BadLocationId {
        /// Position in the location list
        index: usize,
        /// The id found there
        id: u8,
    },
    /// Zone `second` overlaps the earlier zone `first` (indices).
    ZoneOverlap {
        /// Earlier zone index
        first: usize,
        /// Later zone index
        second: usize,
    },
    /// Zone at `index` reaches outside the playable area.
    ZoneOutOfBounds {
        /// Zone index
        index: usize,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::DuplicateEntranceId { index, id } => {
                write!(f, "entrance #{index} has duplicate id {id}")
            }
            Issue::BadLocationId { index, id } => write!(f, "location #{index} has invalid id {id}"),
            Issue::ZoneOverlap { first, second } => {
                write!(f, "zone #{second} overlaps zone #{first}")
            }
            Issue::ZoneOutOfBounds { index } => write!(f, "zone #{index} is out of bounds"),
        }
    }
}

/// Every problem in `area`, in a stable order.
pub fn check(area: &Area) -> Vec<Issue> {
    let mut issues = Vec::new();

    let mut seen = BTreeSet::new();
    for (index, e) in area.entrances.iter().enumerate() {
        if !seen.insert(e.id) {
            issues.push(Issue::DuplicateEntranceId { index, id: e.id });
        }
    }

    let mut seen = BTreeSet::new();
    for (index, l) in area.locations.iter().enumerate() {
        if l.id == 0 || !seen.insert(l.id) {
            issues.push(Issue::BadLocationId { index, id: l.id });
        }
    }

    for (second, z) in area.zones.iter().enumerate() {
        for (first, other) in area.zones[..second].iter().enumerate() {
            if other.rect().intersects(&z.rect()) {
                issues.push(Issue::ZoneOverlap { first, second });
            }
        }
    }

    for (index, z) in area.zones.iter().enumerate() {
        if out_of_bounds(z) {
            issues.push(Issue::ZoneOutOfBounds { index });
        }
    }

    issues
}

/// Fix everything [`check`] reports that can be fixed and return what was
/// fixed.
pub fn fix_all(area: &mut Area) -> Vec<Issue> {
    let mut fixed = Vec::new();
    fixed.extend(fix_duplicate_entrance_ids(area));
    fixed.extend(fix_location_ids(area));
    fixed.extend(fix_zone_overlaps(area));
    fixed.extend(fix_zone_bounds(area));
    for issue in &fixed {
        info!("fixed: {issue}");
    }
    fixed
}

/// Give each duplicate entrance the lowest unused id. The first entrance
/// with a given id keeps it.
pub fn fix_duplicate_entrance_ids(area: &mut Area) -> Vec<Issue> {
    let mut fixed = Vec::new();
    let mut seen = BTreeSet::new();
    for index in 0..area.entrances.len() {
        let id = area.entrances[index].id;
        if seen.insert(id) {
            continue;
        }
        let Some(new) = lowest_free(area.entrances.iter().map(|e| e.id), 0) else {
            break;
        };
        area.entrances[index].id = new;
        seen.insert(new);
        fixed.push(Issue::DuplicateEntranceId { index, id });
    }
    fixed
}

/// Give each duplicate or zero-id location the lowest unused id in
/// `1..=255`.
pub fn fix_location_ids(area: &mut Area) -> Vec<Issue> {
    let mut fixed = Vec::new();
    let mut seen = BTreeSet::new();
    for index in 0..area.locations.len() {
        let id = area.locations[index].id;
        if id != 0 && seen.insert(id) {
            continue;
        }
        let Some(new) = lowest_free(area.locations.iter().map(|l| l.id), 1) else {
            break;
        };
        area.locations[index].id = new;
        seen.insert(new);
        fixed.push(Issue::BadLocationId { index, id });
    }
    fixed
}

/// Shrink the later of two overlapping zones along the axis where they
/// overlap least. Pairs that would leave the zone empty are left alone.
pub fn fix_zone_overlaps(area: &mut Area) -> Vec<Issue> {
    let mut fixed = Vec::new();
    for second in 0..area.zones.len() {
        for first in 0..second {
            let a = area.zones[first].rect();
            let b = area.zones[second].rect();
            if !a.intersects(&b) {
                continue;
            }
            let ox = a.right().min(b.right()) - a.x.max(b.x);
            let oy = a.bottom().min(b.bottom()) - a.y.max(b.y);

            let z = &mut area.zones[second];
            let shrunk = if ox <= oy {
                shrink(&mut z.x, &mut z.width, a.x, ox)
            } else {
                shrink(&mut z.y, &mut z.height, a.y, oy)
            };
            if shrunk {
                fixed.push(Issue::ZoneOverlap { first, second });
            }
        }
    }
    fixed
}

/// Cut `overlap` off the side of a zone facing the other zone, whose
/// start is `other_start`.
fn shrink(start: &mut u16, size: &mut u16, other_start: i32, overlap: i32) -> bool {
    let Ok(overlap) = u16::try_from(overlap) else {
        return false;
    };
    if overlap >= *size {
        return false;
    }
    if i32::from(*start) >= other_start {
        *start += overlap;
    }
    *size -= overlap;
    true
}

fn out_of_bounds(z: &Zone) -> bool {
    let r = z.rect();
    r.x < ZONE_MIN || r.y < ZONE_MIN || r.right() > ZONE_MAX_X || r.bottom() > ZONE_MAX_Y
}

/// Move and clip zones into the playable area.
pub fn fix_zone_bounds(area: &mut Area) -> Vec<Issue> {
    let mut fixed = Vec::new();
    for (index, z) in area.zones.iter_mut().enumerate() {
        if !out_of_bounds(z) {
            continue;
        }
        let (x, w) = clamp_span(z.x, z.width, ZONE_MAX_X);
        let (y, h) = clamp_span(z.y, z.height, ZONE_MAX_Y);
        z.x = x;
        z.width = w;
        z.y = y;
        z.height = h;
        fixed.push(Issue::ZoneOutOfBounds { index });
    }
    fixed
}

fn clamp_span(start: u16, size: u16, max: i32) -> (u16, u16) {
    let start = i32::from(start).clamp(ZONE_MIN, max);
    let end = (start + i32::from(size)).min(max);
    // both values lie in ZONE_MIN..=max, which fits u16
    (start as u16, (end - start) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entrance, Location};

    fn zone(x: u16, y: u16, w: u16, h: u16) -> Zone {
        Zone {
            x,
            y,
            width: w,
            height: h,
            ..Zone::default()
        }
    }

    #[test]
    fn duplicate_entrance_ids_get_lowest_free_id() {
        let mut area = Area::new(1);
        for id in [0, 1, 1, 3] {
            area.entrances.push(Entrance {
                id,
                ..Entrance::default()
            });
        }
        assert_eq!(check(&area), vec![Issue::DuplicateEntranceId { index: 2, id: 1 }]);

        let fixed = fix_all(&mut area);
        assert_eq!(fixed.len(), 1);
        let ids: Vec<u8> = area.entrances.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert!(check(&area).is_empty());
    }

    #[test]
    fn location_ids_start_at_one() {
        let mut area = Area::new(1);
        for id in [0, 1, 1] {
            area.locations.push(Location {
                id,
                ..Location::default()
            });
        }
        assert_eq!(check(&area).len(), 2);
        fix_location_ids(&mut area);
        let ids: Vec<u8> = area.locations.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn touching_zones_do_not_overlap() {
        let mut area = Area::new(1);
        area.zones = vec![zone(16, 16, 100, 100), zone(116, 16, 100, 100)];
        assert!(check(&area).is_empty());
    }

    #[test]
    fn overlap_is_removed_along_the_smaller_axis() {
        let mut area = Area::new(1);
        area.zones = vec![zone(16, 16, 100, 100), zone(96, 32, 100, 100)];
        assert_eq!(check(&area), vec![Issue::ZoneOverlap { first: 0, second: 1 }]);

        fix_zone_overlaps(&mut area);
        assert_eq!((area.zones[1].x, area.zones[1].width), (116, 80));
        assert_eq!(area.zones[1].y, 32);
        assert!(check(&area).is_empty());
    }

    #[test]
    fn out_of_bounds_zone_is_clamped() {
        let mut area = Area::new(1);
        area.zones = vec![zone(0, 8100, 200, 200)];
        assert_eq!(check(&area), vec![Issue::ZoneOutOfBounds { index: 0 }]);
        fix_zone_bounds(&mut area);
        let z = &area.zones[0];
        assert_eq!((z.x, z.width), (16, 200));
        assert_eq!((z.y, z.height), (8100, 76));
        assert!(check(&area).is_empty());
    }
}
