//! Zone hit-testing.

use crate::model::Zone;

/// Index of the zone a point belongs to.
///
/// The first zone containing the point wins (edges are inside). If no zone
/// contains it, the zone whose edge is closest wins, ties going to the
/// earlier zone. `None` only when `zones` is empty.
pub fn zone_index_at(zones: &[Zone], x: i32, y: i32) -> Option<usize> {
    if let Some(i) = zones.iter().position(|z| z.rect().contains(x, y)) {
        return Some(i);
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, z) in zones.iter().enumerate() {
        let d = z.rect().distance_to(x, y);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// Id of the zone a point belongs to; see [`zone_index_at`].
pub fn map_position_to_zone_id(zones: &[Zone], x: i32, y: i32) -> Option<u8> {
    zone_index_at(zones, x, y).map(|i| zones[i].id)
}
