//! Expands an object definition to an arbitrary size.
//!
//! Standard objects split their rows (and each row its tiles) into a
//! leading part, one repeating run and a trailing part. Sloped objects
//! stamp one or two rectangular sections diagonally across the grid.

use serde::Serialize;

use super::objects::{ObjectDef, Opcode};

/// `height` rows of `width` cells; `None` means no tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileGrid {
    width: usize,
    height: usize,
    cells: Vec<Option<u16>>,
}

impl TileGrid {
    /// A grid with every cell empty.
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![None; width * height],
        }
    }

    /// Width in tiles.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in tiles.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell at `(x, y)`; out-of-range reads are empty.
    pub fn get(&self, x: usize, y: usize) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells[y * self.width + x]
    }

    /// Rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Option<u16>]> {
        // chunks_exact panics on 0
        self.cells.chunks_exact(self.width.max(1)).take(self.height)
    }

    /// Whether no cell holds a tile.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    fn row_mut(&mut self, y: usize) -> &mut [Option<u16>] {
        &mut self.cells[y * self.width..(y + 1) * self.width]
    }

    /// Copy `block` with its top-left corner at `(x0, y0)`. Cells outside
    /// the grid and empty cells of `block` are skipped.
    fn stamp(&mut self, x0: i64, y0: i64, block: &Section) {
        for (dy, row) in block.rows.iter().enumerate() {
            let y = y0 + dy as i64;
            if y < 0 || y >= self.height as i64 {
                continue;
            }
            for (dx, cell) in row.iter().enumerate() {
                let x = x0 + dx as i64;
                if x < 0 || x >= self.width as i64 {
                    continue;
                }
                if let Some(tile) = cell {
                    self.cells[y as usize * self.width + x as usize] = Some(*tile);
                }
            }
        }
    }
}

/// Render `def` at `width` by `height` tiles.
///
/// A missing or empty definition gives a blank grid. `fullslope` makes
/// sloped objects draw as many steps as fit along the longer axis instead
/// of the shorter one.
pub fn render_object(def: Option<&ObjectDef>, width: usize, height: usize, fullslope: bool) -> TileGrid {
    let mut grid = TileGrid::empty(width, height);
    let Some(def) = def else {
        return grid;
    };
    if def.rows.is_empty() || width == 0 || height == 0 {
        return grid;
    }

    if def.is_diagonal() {
        render_diagonal(&mut grid, def, fullslope);
    } else {
        render_standard(&mut grid, def);
    }
    grid
}

/// Tiles of one row with the markers dropped.
struct Row {
    control: u8,
    tiles: Vec<(u8, u16, u8)>,
}

fn tiles_of(row: &[Opcode]) -> Vec<(u8, u16, u8)> {
    row.iter()
        .filter_map(|op| match *op {
            Opcode::Tile { control, tile, extra } => Some((control, tile, extra)),
            Opcode::Marker(_) => None,
        })
        .collect()
}

/// Leading, repeating and trailing parts of a sequence.
struct Split<T> {
    before: Vec<T>,
    repeat: Vec<T>,
    after: Vec<T>,
}

impl<T> Split<T> {
    /// Only the first contiguous run of repeating items counts as the
    /// repeat; everything after it is trailing.
    fn new(items: impl IntoIterator<Item = T>, mut repeats: impl FnMut(&T) -> bool) -> Self {
        let mut split = Split {
            before: Vec::new(),
            repeat: Vec::new(),
            after: Vec::new(),
        };
        for item in items {
            let r = repeats(&item);
            if !split.after.is_empty() || (!split.repeat.is_empty() && !r) {
                split.after.push(item);
            } else if r {
                split.repeat.push(item);
            } else {
                split.before.push(item);
            }
        }
        split
    }

    /// Item for position `i` of `len`.
    fn pick(&self, i: usize, len: usize) -> &T {
        if self.repeat.is_empty() {
            return &self.before[i % self.before.len()];
        }
        if i < self.before.len() {
            &self.before[i]
        } else if i + self.after.len() >= len {
            &self.after[i + self.after.len() - len]
        } else {
            &self.repeat[(i - self.before.len()) % self.repeat.len()]
        }
    }
}

fn render_standard(grid: &mut TileGrid, def: &ObjectDef) {
    let rows = def.rows.iter().filter_map(|r| {
        let tiles = tiles_of(r);
        let control = tiles.first()?.0;
        Some(Row { control, tiles })
    });
    let split = Split::new(rows, |row| row.control & 0x6 != 0);
    if split.before.is_empty() && split.repeat.is_empty() {
        return;
    }

    let width = grid.width;
    for y in 0..grid.height {
        let row = split.pick(y, grid.height);
        render_row(grid.row_mut(y), row, width);
    }
}

fn render_row(dest: &mut [Option<u16>], row: &Row, width: usize) {
    let first = row.control;
    let split = Split::new(row.tiles.iter().copied(), |&(control, _, extra)| {
        (extra & 1 != 0 && control & 1 != 0)
            || (first & 4 != 0 && control & 4 == 0)
            || control & 1 != 0
    });
    for (x, cell) in dest.iter_mut().enumerate().take(width) {
        *cell = Some(split.pick(x, width).1);
    }
}

/// A rectangular slope section; short rows are padded with `None`.
struct Section {
    rows: Vec<Vec<Option<u16>>>,
}

impl Section {
    fn new(rows: &[&Vec<Opcode>]) -> Self {
        let tiles: Vec<Vec<u16>> = rows
            .iter()
            .map(|r| tiles_of(r).into_iter().map(|t| t.1).collect())
            .collect();
        let width = tiles.iter().map(Vec::len).max().unwrap_or(0);
        let rows = tiles
            .into_iter()
            .map(|r| {
                let mut padded: Vec<Option<u16>> = r.into_iter().map(Some).collect();
                padded.resize(width, None);
                padded
            })
            .collect();
        Self { rows }
    }

    fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    fn height(&self) -> usize {
        self.rows.len()
    }
}

/// A new section starts at every row led by a marker. Only the first two
/// are used.
fn slope_sections(def: &ObjectDef) -> (Section, Option<Section>) {
    let mut groups: Vec<Vec<&Vec<Opcode>>> = Vec::new();
    for row in &def.rows {
        let starts = row.first().is_some_and(Opcode::is_marker);
        match groups.last_mut() {
            Some(group) if !starts => group.push(row),
            _ => groups.push(vec![row]),
        }
    }
    let mut sections = groups.iter().map(|g| Section::new(g));
    let main = sections.next().unwrap_or(Section { rows: Vec::new() });
    (main, sections.next())
}

fn render_diagonal(grid: &mut TileGrid, def: &ObjectDef, fullslope: bool) {
    let (main, sub) = slope_sections(def);
    let (mw, mh) = (main.width(), main.height());
    if mw == 0 || mh == 0 {
        return;
    }

    let control = def.rows[0][0].control();
    let go_left = control & 1 != 0;
    let go_down = control & 2 != 0;

    let (width, height) = (grid.width, grid.height);
    let steps = if fullslope {
        (height / mh).max(width / mw)
    } else {
        (height / mh).min(width / mw)
    };

    let (mw, mh) = (mw as i64, mh as i64);
    let sub_h = sub.as_ref().map_or(0, |s| s.height() as i64);
    let h = height as i64;

    let (mut x, mut y, xi, yi) = match (go_left, go_down) {
        // up and to the right, from the bottom left
        (false, false) => (0, h - mh - sub_h, mw, -mh),
        (true, false) => (0, 0, mw, mh),
        (false, true) => (0, sub_h, mw, mh),
        (true, true) => (0, h - mh, mw, -mh),
    };

    for _ in 0..steps {
        grid.stamp(x, y, &main);
        if let Some(sub) = &sub {
            let xb = if go_left { x + mw - sub.width() as i64 } else { x };
            let yb = if go_down { y - sub.height() as i64 } else { y + mh };
            grid.stamp(xb, yb, sub);
        }
        x += xi;
        y += yi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(control: u8, tile: u16) -> Opcode {
        Opcode::Tile {
            control,
            tile,
            extra: 0,
        }
    }

    fn def(rows: Vec<Vec<Opcode>>) -> ObjectDef {
        ObjectDef {
            rows,
            ..ObjectDef::default()
        }
    }

    fn grid_rows(g: &TileGrid) -> Vec<Vec<Option<u16>>> {
        g.rows().map(<[_]>::to_vec).collect()
    }

    #[test]
    fn single_tile_fills_the_grid() {
        let d = def(vec![vec![tile(0, 5)]]);
        let g = render_object(Some(&d), 3, 2, false);
        assert_eq!(grid_rows(&g), vec![vec![Some(5); 3]; 2]);
    }

    #[test]
    fn single_tile_fills_a_wide_row() {
        let d = def(vec![vec![tile(0, 7)]]);
        let g = render_object(Some(&d), 5, 1, false);
        assert_eq!(grid_rows(&g), vec![vec![Some(7); 5]]);
    }

    #[test]
    fn either_repeat_bit_marks_a_row() {
        let d = def(vec![
            vec![tile(0, 10)],
            vec![tile(4, 20)],
            vec![tile(0, 30)],
        ]);
        let g = render_object(Some(&d), 1, 10, false);
        let col: Vec<_> = (0..10).map(|y| g.get(0, y)).collect();
        let mut expected = vec![Some(10)];
        expected.extend([Some(20); 8]);
        expected.push(Some(30));
        assert_eq!(col, expected);
    }

    #[test]
    fn no_repeat_cycles_rows_and_tiles() {
        let d = def(vec![
            vec![tile(0, 1), tile(0, 2)],
            vec![tile(0, 3), tile(0, 4)],
        ]);
        let g = render_object(Some(&d), 3, 3, false);
        assert_eq!(
            grid_rows(&g),
            vec![
                vec![Some(1), Some(2), Some(1)],
                vec![Some(3), Some(4), Some(3)],
                vec![Some(1), Some(2), Some(1)],
            ]
        );
    }

    #[test]
    fn vertical_repeat_keeps_caps() {
        let d = def(vec![
            vec![tile(0, 10)],
            vec![tile(2, 20)],
            vec![tile(0, 30)],
        ]);
        let g = render_object(Some(&d), 1, 5, false);
        let col: Vec<_> = (0..5).map(|y| g.get(0, y)).collect();
        assert_eq!(col, vec![Some(10), Some(20), Some(20), Some(20), Some(30)]);
    }

    #[test]
    fn horizontal_repeat_keeps_edges() {
        let d = def(vec![vec![tile(0, 1), tile(1, 2), tile(0, 3)]]);
        let g = render_object(Some(&d), 6, 1, false);
        assert_eq!(
            grid_rows(&g)[0],
            vec![Some(1), Some(2), Some(2), Some(2), Some(2), Some(3)]
        );
    }

    #[test]
    fn second_repeat_run_counts_as_trailing() {
        let d = def(vec![
            vec![tile(2, 1)],
            vec![tile(0, 2)],
            vec![tile(2, 3)],
        ]);
        let g = render_object(Some(&d), 1, 4, false);
        let col: Vec<_> = (0..4).map(|y| g.get(0, y)).collect();
        assert_eq!(col, vec![Some(1), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn missing_definition_is_blank() {
        let g = render_object(None, 4, 4, false);
        assert!(g.is_blank());
        assert_eq!((g.width(), g.height()), (4, 4));
    }

    #[test]
    fn slope_up_right_starts_bottom_left() {
        // 1x1 main block, no sub block, going up-right
        let d = def(vec![vec![Opcode::Marker(0x80), tile(0, 7)]]);
        let g = render_object(Some(&d), 3, 3, false);
        assert_eq!(
            grid_rows(&g),
            vec![
                vec![None, None, Some(7)],
                vec![None, Some(7), None],
                vec![Some(7), None, None],
            ]
        );
    }

    #[test]
    fn slope_with_sub_block_going_down() {
        let d = def(vec![
            vec![Opcode::Marker(0x82), tile(0, 1)],
            vec![Opcode::Marker(0x84), tile(0, 9)],
        ]);
        let g = render_object(Some(&d), 2, 3, false);
        // sub block sits above each main stamp
        assert_eq!(
            grid_rows(&g),
            vec![
                vec![Some(9), None],
                vec![Some(1), Some(9)],
                vec![None, Some(1)],
            ]
        );
    }

    #[test]
    fn fullslope_draws_along_the_longer_axis() {
        let d = def(vec![vec![Opcode::Marker(0x81), tile(0, 4)]]);
        let short = render_object(Some(&d), 4, 2, false);
        let full = render_object(Some(&d), 4, 2, true);
        let count = |g: &TileGrid| g.rows().flatten().filter(|c| c.is_some()).count();
        assert_eq!(count(&short), 2);
        // steps past the bottom edge are clipped
        assert_eq!(count(&full), 2);
        assert_eq!(full.get(1, 1), Some(4));
        assert_eq!(short.get(2, 0), None);
    }

    #[test]
    fn zero_sized_grid_is_empty() {
        let d = def(vec![vec![tile(0, 1)]]);
        let g = render_object(Some(&d), 0, 3, false);
        assert_eq!(g.rows().count(), 0);
    }
}
