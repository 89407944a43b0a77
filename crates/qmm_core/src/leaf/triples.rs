//! Unsorted, append-only triples scratchpad used only during quadtree construction (C4).

use crate::geometry::Index;

/// Three parallel vectors (rows, cols, values); append-only. Never exposed outside
/// construction (§4.9) — it exists purely so the permutation-vector partitioning in
/// [`crate::subdivide::build_quadtree`] can avoid moving the underlying data.
#[derive(Debug, Clone, Default)]
pub struct TriplesLeaf<T> {
    rows: Vec<Index>,
    cols: Vec<Index>,
    values: Vec<T>,
}

impl<T> TriplesLeaf<T> {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            cols: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            rows: Vec::with_capacity(n),
            cols: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, row: Index, col: Index, value: T) {
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, i: usize) -> Index {
        self.rows[i]
    }

    pub fn col(&self, i: usize) -> Index {
        self.cols[i]
    }

    pub fn value(&self, i: usize) -> &T {
        &self.values[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_index() {
        let mut t = TriplesLeaf::new();
        t.push(1, 2, 9.0);
        t.push(3, 4, 8.0);
        assert_eq!(t.len(), 2);
        assert_eq!(t.row(1), 3);
        assert_eq!(t.col(0), 2);
        assert_eq!(*t.value(1), 8.0);
    }
}
