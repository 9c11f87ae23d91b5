/// Uniform grid index.
///
/// Cheaper to rebuild than the quadtree and a better fit for dense, evenly
/// spread populations. Radius queries visit only the cells overlapped by the
/// query's bounding square.
use super::{is_usable_radius, IndexStats, SpatialEntry, SpatialIndex};
use crate::types::{Bounds, Position};

/// Upper bound on cells per axis; larger extents get coarser cells instead.
const MAX_CELLS_PER_AXIS: usize = 1024;

/// Entries whose position falls inside one grid cell.
#[derive(Debug, Clone)]
pub struct GridCell<E> {
    pub entries: Vec<SpatialEntry<E>>,
}

impl<E> Default for GridCell<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct UniformGrid<E> {
    bounds: Bounds,
    cell_size: f64,
    cols: usize,
    rows: usize,
    cells: Vec<GridCell<E>>,
    len: usize,
    stats: IndexStats,
}

impl<E: Clone> UniformGrid<E> {
    /// Creates an empty grid. Degenerate bounds produce a grid with no cells.
    pub fn new(bounds: Bounds, cell_size: f64) -> Self {
        if bounds.is_degenerate() || !(cell_size > 0.0) {
            return Self {
                bounds,
                cell_size: cell_size.max(0.0),
                cols: 0,
                rows: 0,
                cells: Vec::new(),
                len: 0,
                stats: IndexStats::default(),
            };
        }

        let longest = bounds.width().max(bounds.height());
        let cell_size = cell_size.max(longest / MAX_CELLS_PER_AXIS as f64);
        let cols = ((bounds.width() / cell_size).ceil() as usize).max(1);
        let rows = ((bounds.height() / cell_size).ceil() as usize).max(1);

        let mut cells = Vec::with_capacity(cols * rows);
        cells.resize_with(cols * rows, GridCell::default);

        Self {
            bounds,
            cell_size,
            cols,
            rows,
            cells,
            len: 0,
            stats: IndexStats::default(),
        }
    }

    /// Effective cell edge length after clamping the grid dimensions.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    #[inline]
    fn column_of(&self, x: f64) -> usize {
        let col = ((x - self.bounds.min_x) / self.cell_size).floor();
        (col.max(0.0) as usize).min(self.cols - 1)
    }

    #[inline]
    fn row_of(&self, y: f64) -> usize {
        let row = ((y - self.bounds.min_y) / self.cell_size).floor();
        (row.max(0.0) as usize).min(self.rows - 1)
    }

    fn cell_bounds(&self, col: usize, row: usize) -> Bounds {
        let min_x = self.bounds.min_x + col as f64 * self.cell_size;
        let min_y = self.bounds.min_y + row as f64 * self.cell_size;
        Bounds::new(
            min_x,
            min_y,
            (min_x + self.cell_size).min(self.bounds.max_x),
            (min_y + self.cell_size).min(self.bounds.max_y),
        )
    }

    /// Occupancy of the fullest cell, useful to spot a badly sized grid.
    pub fn max_cell_population(&self) -> usize {
        self.cells
            .iter()
            .map(|cell| cell.entries.len())
            .max()
            .unwrap_or(0)
    }
}

impl<E: Clone> SpatialIndex<E> for UniformGrid<E> {
    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn insert_entry(&mut self, entry: SpatialEntry<E>) -> bool {
        if self.cells.is_empty() || !self.bounds.contains(entry.position) {
            self.stats.rejected_insertions += 1;
            return false;
        }

        let index = self.row_of(entry.position.y) * self.cols + self.column_of(entry.position.x);
        self.cells[index].entries.push(entry);
        self.len += 1;
        self.stats.total_insertions += 1;
        true
    }

    fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.entries.clear();
        }
        self.len = 0;
        self.stats.total_clears += 1;
    }

    fn query_radius(&mut self, center: Position, radius: f64) -> Vec<E> {
        self.stats.total_queries += 1;
        let mut results = Vec::new();

        if self.len == 0 || !is_usable_radius(radius) || !self.bounds.intersects_circle(center, radius) {
            self.stats.last_query_result_count = 0;
            return results;
        }

        let radius_sq = radius * radius;
        let (min_col, max_col) = (self.column_of(center.x - radius), self.column_of(center.x + radius));
        let (min_row, max_row) = (self.row_of(center.y - radius), self.row_of(center.y + radius));

        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let cell = &self.cells[row * self.cols + col];
                if cell.entries.is_empty() || !self.cell_bounds(col, row).intersects_circle(center, radius) {
                    continue;
                }
                results.extend(
                    cell.entries
                        .iter()
                        .filter(|entry| entry.position.distance_squared(center) <= radius_sq)
                        .map(|entry| entry.handle.clone()),
                );
            }
        }

        self.stats.last_query_result_count = results.len();
        results
    }

    fn len(&self) -> usize {
        self.len
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.len,
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions() {
        let grid: UniformGrid<u32> = UniformGrid::new(Bounds::from_size(100.0, 50.0), 10.0);
        assert_eq!(grid.dimensions(), (10, 5));

        let uneven: UniformGrid<u32> = UniformGrid::new(Bounds::from_size(105.0, 10.0), 10.0);
        assert_eq!(uneven.dimensions(), (11, 1));
    }

    #[test]
    fn test_huge_extent_coarsens_cells() {
        let grid: UniformGrid<u32> = UniformGrid::new(Bounds::from_size(1.0e6, 1.0e6), 1.0);
        let (cols, rows) = grid.dimensions();
        assert!(cols <= MAX_CELLS_PER_AXIS);
        assert!(rows <= MAX_CELLS_PER_AXIS);
        assert!(grid.cell_size() >= 1.0e6 / MAX_CELLS_PER_AXIS as f64);
    }

    #[test]
    fn test_max_edge_lands_in_last_cell() {
        let mut grid = UniformGrid::new(Bounds::from_size(100.0, 100.0), 10.0);
        assert!(grid.insert(7u32, Position::new(100.0, 100.0)));
        assert_eq!(grid.query_radius(Position::new(99.0, 99.0), 2.0), vec![7]);
    }

    #[test]
    fn test_query_crossing_cells() {
        let mut grid = UniformGrid::new(Bounds::from_size(100.0, 100.0), 10.0);
        grid.insert(1u32, Position::new(9.0, 9.0));
        grid.insert(2, Position::new(11.0, 11.0));
        grid.insert(3, Position::new(30.0, 30.0));

        let mut found = grid.query_radius(Position::new(10.0, 10.0), 3.0);
        found.sort_unstable();
        assert_eq!(found, vec![1, 2]);
        assert_eq!(grid.max_cell_population(), 1);
    }

    #[test]
    fn test_query_outside_bounds_is_empty() {
        let mut grid = UniformGrid::new(Bounds::from_size(10.0, 10.0), 1.0);
        grid.insert(1u32, Position::new(5.0, 5.0));
        assert!(grid.query_radius(Position::new(500.0, 500.0), 3.0).is_empty());
    }

    #[test]
    fn test_degenerate_grid() {
        let mut grid: UniformGrid<u32> = UniformGrid::new(Bounds::from_size(0.0, 10.0), 1.0);
        assert_eq!(grid.dimensions(), (0, 0));
        assert!(!grid.insert(1, Position::new(0.0, 5.0)));
        assert!(grid.query_radius(Position::new(0.0, 5.0), 10.0).is_empty());
    }
}
