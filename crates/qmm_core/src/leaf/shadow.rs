//! Window shadow leaf (C5): a zero-copy, offset-translating, row-window-filtering view
//! onto a base DCSC leaf. Avoids copying when the multiply recursion subdivides a leaf
//! that sits opposite an inner block (§4.2, §4.8).

use super::dcsc::DcscLeaf;
use super::{ColumnView, LeafView};
use crate::geometry::{Index, Offset, Shape};
use crate::width::LeafIndex;
use std::rc::Rc;

/// A rectangular sub-window `[row_offset, row_offset+nrows) x [col_pos_begin, col_pos_end)`
/// (the column range given as *positions* into the base leaf's column array, per §4.2/§4.8)
/// over a shared base leaf. `BaseIT` is the base leaf's own index width; `IT` is this
/// shadow's (possibly narrower) width, chosen from the sub-shape.
#[derive(Clone)]
pub struct ShadowLeaf<T, BaseIT: LeafIndex, IT: LeafIndex> {
    base: Rc<DcscLeaf<T, BaseIT>>,
    begin_pos: usize,
    end_pos: usize,
    row_offset: Index,
    col_offset: Index,
    shape: Shape,
    _marker: std::marker::PhantomData<IT>,
}

impl<T, BaseIT: LeafIndex, IT: LeafIndex> ShadowLeaf<T, BaseIT, IT> {
    /// Builds a shadow over base column-position range `[begin_pos, end_pos)`, translated
    /// by `(row_offset, col_offset)` (both in the base leaf's own local coordinates), with
    /// the given (already-narrowed) `shape`.
    pub fn new(
        base: Rc<DcscLeaf<T, BaseIT>>,
        begin_pos: usize,
        end_pos: usize,
        row_offset: Index,
        col_offset: Index,
        shape: Shape,
    ) -> Self {
        Self {
            base,
            begin_pos,
            end_pos,
            row_offset,
            col_offset,
            shape,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn base(&self) -> &Rc<DcscLeaf<T, BaseIT>> {
        &self.base
    }

    pub fn begin_pos(&self) -> usize {
        self.begin_pos
    }

    pub fn end_pos(&self) -> usize {
        self.end_pos
    }

    pub fn offset(&self) -> Offset {
        Offset::new(self.row_offset, self.col_offset)
    }

    /// Row-window bounds (as base-leaf row-slice positions) for the column stored at base
    /// position `pos`: the sub-slice of `rows` intersecting `[row_offset, row_offset+nrows)`.
    fn row_window(&self, rows: &[BaseIT]) -> (usize, usize) {
        let lo = self.row_offset;
        let hi = self.row_offset + self.shape.nrows;
        let start = rows.partition_point(|r| r.to_index() < lo);
        let end = rows.partition_point(|r| r.to_index() < hi);
        (start, end)
    }

    fn view_at_pos(&self, pos: usize) -> Option<ColumnView<'_, T, IT>> {
        let base_col = self.base.column_at_pos(pos);
        let (rows, values) = self.base.rows_values_at_pos(pos);
        let (start, end) = self.row_window(rows);
        if start >= end {
            return None;
        }
        let row_offset = self.row_offset;
        let col = IT::from_index(base_col.to_index() - self.col_offset);
        Some(ColumnView {
            col,
            rows: Box::new(rows[start..end].iter().map(move |r| IT::from_index(r.to_index() - row_offset))),
            values: &values[start..end],
        })
    }
}

impl<T, BaseIT: LeafIndex, IT: LeafIndex> LeafView<T, IT> for ShadowLeaf<T, BaseIT, IT> {
    fn shape(&self) -> Shape {
        self.shape
    }

    fn nnn(&self) -> usize {
        (self.begin_pos..self.end_pos)
            .filter_map(|pos| self.view_at_pos(pos))
            .map(|c| c.values.len())
            .sum()
    }

    fn get_column(&self, col: IT) -> Option<ColumnView<'_, T, IT>> {
        let base_col = BaseIT::from_index(col.to_index() + self.col_offset);
        let pos = self.base.get_column_pos(base_col)?;
        if pos < self.begin_pos || pos >= self.end_pos {
            return None;
        }
        self.view_at_pos(pos)
    }

    fn columns(&self) -> Box<dyn Iterator<Item = ColumnView<'_, T, IT>> + '_> {
        Box::new((self.begin_pos..self.end_pos).filter_map(move |pos| self.view_at_pos(pos)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::dcsc::DcscFactory;
    use crate::semiring::PlusTimes;
    use crate::spa::{DenseSpa, SpaLike};

    fn make_base() -> Rc<DcscLeaf<f64, i32>> {
        let mut f: DcscFactory<f64, i32> = DcscFactory::new(Shape::new(8, 8));
        let sr = PlusTimes;
        for col in 0..8i32 {
            let mut spa = DenseSpa::<f64>::new(8);
            spa.scatter_add(&[col as i64], &[(col + 1) as f64], &sr);
            f.add_column_from_spa(col, &mut spa);
        }
        Rc::new(f.finish())
    }

    #[test]
    fn full_window_shadow_is_identity() {
        let base = make_base();
        let shadow: ShadowLeaf<f64, i32, i32> =
            ShadowLeaf::new(base.clone(), 0, base.num_columns(), 0, 0, base.shape());
        let base_tuples: Vec<_> = base.tuples().collect();
        let shadow_tuples: Vec<_> = shadow.tuples().collect();
        assert_eq!(base_tuples, shadow_tuples);
    }

    #[test]
    fn quadrant_window_filters_rows_and_translates() {
        let base = make_base();
        // bottom-right quadrant: rows/cols [4, 8)
        let shadow: ShadowLeaf<f64, i32, i16> =
            ShadowLeaf::new(base.clone(), 4, 8, 4, 4, Shape::new(4, 4));
        let tuples: Vec<_> = shadow.tuples().collect();
        // base has diagonal entries (c, c, c+1) for c in 0..8; within [4,8)x[4,8) that's
        // (4,4,5),(5,5,6),(6,6,7),(7,7,8) translated by -4 on both axes.
        assert_eq!(tuples, vec![(0, 0, 5.0), (1, 1, 6.0), (2, 2, 7.0), (3, 3, 8.0)]);
    }
}
