//! Leaf storage: the immutable DCSC leaf (C3), the append-only triples scratchpad (C4),
//! and the zero-copy window shadow leaf (C5), plus the common column-view types every
//! leaf flavor exposes so the multiply/accumulate code can stay leaf-shape-agnostic.

pub mod dcsc;
pub mod shadow;
pub mod triples;

use crate::width::LeafIndex;

/// One column's worth of data as handed to a consumer: the (local) column index, the row
/// indices in ascending order, and the parallel values. `rows` is boxed because a window
/// shadow must lazily translate base rows by a constant offset rather than exposing a
/// plain slice (§4.2) — a direct DCSC leaf still uses a cheap `Copied` iterator over its
/// own slice underneath.
pub struct ColumnView<'a, T, IT: LeafIndex> {
    pub col: IT,
    pub rows: Box<dyn Iterator<Item = IT> + 'a>,
    pub values: &'a [T],
}

/// The capability every leaf flavor implements: ordered column iteration, point/lower-bound
/// column lookup, full tuple iteration, and O(1) nonzero count (§4.1 contract, generalized
/// to also cover shadows per §4.2).
pub trait LeafView<T, IT: LeafIndex> {
    fn shape(&self) -> crate::geometry::Shape;
    fn nnn(&self) -> usize;

    /// Exact lookup of column `col`. Returns `None` if absent (or, for a shadow, if the
    /// window contains no rows for that column).
    fn get_column(&self, col: IT) -> Option<ColumnView<'_, T, IT>>;

    /// Forward iteration over all non-empty columns in increasing column order.
    fn columns(&self) -> Box<dyn Iterator<Item = ColumnView<'_, T, IT>> + '_>;

    /// Full tuple iteration, column-major: `(row, col, value)`.
    fn tuples(&self) -> Box<dyn Iterator<Item = (IT, IT, T)> + '_>
    where
        T: Copy,
    {
        Box::new(self.columns().flat_map(|c| {
            let col = c.col;
            c.rows.zip(c.values.iter().copied()).map(move |(r, v)| (r, col, v))
        }))
    }
}
