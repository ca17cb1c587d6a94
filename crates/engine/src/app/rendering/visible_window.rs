use crate::app::{IsoProjection, Vec2, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMargins {
    pub top: u32,
    pub left: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Default for WindowMargins {
    fn default() -> Self {
        Self {
            top: 2,
            left: 2,
            right: 2,
            bottom: 5,
        }
    }
}

/// Diamond of grid cells that may be visible, expressed as a rectangle in
/// diagonal space: `d = row - col` grows to the right on screen and
/// `s = row + col` grows downwards. Enumeration is clamped to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleWindow {
    d_min: i64,
    d_max: i64,
    s_min: i64,
    s_max: i64,
    rows: u32,
    cols: u32,
}

impl VisibleWindow {
    pub fn empty() -> Self {
        Self {
            d_min: 0,
            d_max: -1,
            s_min: 0,
            s_max: -1,
            rows: 0,
            cols: 0,
        }
    }

    pub fn diagonal_bounds(&self) -> (i64, i64) {
        (self.d_min, self.d_max)
    }

    pub fn sum_bounds(&self) -> (i64, i64) {
        (self.s_min, self.s_max)
    }

    pub fn contains(&self, row: i64, col: i64) -> bool {
        if row < 0 || col < 0 || row >= i64::from(self.rows) || col >= i64::from(self.cols) {
            return false;
        }
        let d = row - col;
        let s = row + col;
        (self.d_min..=self.d_max).contains(&d) && (self.s_min..=self.s_max).contains(&s)
    }

    pub fn row_range(&self) -> Option<(u32, u32)> {
        if self.rows == 0 || self.cols == 0 || self.d_min > self.d_max || self.s_min > self.s_max {
            return None;
        }
        let first = (self.s_min + self.d_min).div_euclid(2).max(0);
        let last = (self.s_max + self.d_max)
            .div_euclid(2)
            .min(i64::from(self.rows) - 1);
        if first > last {
            return None;
        }
        Some((first as u32, last as u32))
    }

    pub fn row_span(&self, row: u32) -> Option<(u32, u32)> {
        if row >= self.rows {
            return None;
        }
        let row = i64::from(row);
        let first = (row - self.d_max).max(self.s_min - row).max(0);
        let last = (row - self.d_min)
            .min(self.s_max - row)
            .min(i64::from(self.cols) - 1);
        if first > last {
            return None;
        }
        Some((first as u32, last as u32))
    }

    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let (first, last) = self.row_range().unwrap_or((1, 0));
        (first..=last).flat_map(move |row| {
            self.row_span(row)
                .into_iter()
                .flat_map(move |(lo, hi)| (lo..=hi).map(move |col| (row, col)))
        })
    }

    pub fn cell_count(&self) -> usize {
        let Some((first, last)) = self.row_range() else {
            return 0;
        };
        (first..=last)
            .filter_map(|row| self.row_span(row))
            .map(|(lo, hi)| (hi - lo) as usize + 1)
            .sum()
    }
}

pub fn compute_visible_window(
    projection: &IsoProjection,
    top_left_world: Vec2,
    viewport: Viewport,
    margins: WindowMargins,
    extents: (u32, u32),
) -> VisibleWindow {
    let width = viewport.width as f32;
    let height = viewport.height as f32;
    let diagonal = |offset: Vec2| {
        let grid = projection.world_to_grid(top_left_world + offset);
        let row = i64::from(grid.row);
        let col = i64::from(grid.col);
        (row - col, row + col)
    };
    let (d_tl, s_tl) = diagonal(Vec2 { x: 0.0, y: 0.0 });
    let (d_tr, s_tr) = diagonal(Vec2 { x: width, y: 0.0 });
    let (d_bl, s_bl) = diagonal(Vec2 { x: 0.0, y: height });
    let (d_br, s_br) = diagonal(Vec2 {
        x: width,
        y: height,
    });

    VisibleWindow {
        d_min: d_tl.min(d_bl) - i64::from(margins.left),
        d_max: d_tr.max(d_br) + i64::from(margins.right),
        s_min: s_tl.min(s_tr) - i64::from(margins.top),
        s_max: s_bl.max(s_br) + i64::from(margins.bottom),
        rows: extents.0,
        cols: extents.1,
    }
}
