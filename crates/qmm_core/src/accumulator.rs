//! DCSC accumulator (C9): column-synchronous k-way merge of many partial-product DCSC
//! leaves into one DCSC leaf, summed under a semiring's `add`.

use crate::leaf::dcsc::{DcscFactory, DcscLeaf};
use crate::leaf::LeafView;
use crate::semiring::Semiring;
use crate::spa::{Spa, SpaLike};
use crate::width::LeafIndex;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

/// A cursor over one input leaf's remaining columns, ordered (in the heap) by its current
/// column index, smallest first.
struct Cursor<T, IT: LeafIndex> {
    leaf: Rc<DcscLeaf<T, IT>>,
    pos: usize,
}

impl<T, IT: LeafIndex> PartialEq for Cursor<T, IT> {
    fn eq(&self, other: &Self) -> bool {
        self.current_col() == other.current_col()
    }
}
impl<T, IT: LeafIndex> Eq for Cursor<T, IT> {}
impl<T, IT: LeafIndex> PartialOrd for Cursor<T, IT> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T, IT: LeafIndex> Ord for Cursor<T, IT> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.current_col().cmp(&other.current_col())
    }
}

impl<T, IT: LeafIndex> Cursor<T, IT> {
    fn current_col(&self) -> IT {
        self.leaf.column_at_pos(self.pos)
    }

    fn has_more(&self) -> bool {
        self.pos < self.leaf.num_columns()
    }
}

/// Merges `partials` (all claiming shape `dest_shape` over the same `ret_index_width`)
/// into one DCSC leaf, column by column, via a min-priority-queue k-way merge (§4.5).
///
/// Fast path: a single non-empty input is returned unchanged (clone is cheap — it's a
/// factory rebuild, but semantically a no-op pass-through).
pub fn accumulate<T, IT, S>(
    partials: Vec<Rc<DcscLeaf<T, IT>>>,
    nrows: usize,
    use_dense_spa: bool,
    semiring: &S,
) -> DcscLeaf<T, IT>
where
    T: Copy,
    IT: LeafIndex,
    S: Semiring<T>,
{
    let mut heap: BinaryHeap<Reverse<Cursor<T, IT>>> = BinaryHeap::new();
    for leaf in partials.into_iter().filter(|l| l.num_columns() > 0) {
        heap.push(Reverse(Cursor { leaf, pos: 0 }));
    }

    if heap.len() == 1 {
        let Reverse(cursor) = heap.into_iter().next().unwrap();
        if cursor.pos == 0 {
            return (*cursor.leaf).clone();
        }
    }

    let shape = heap
        .peek()
        .map(|Reverse(c)| c.leaf.shape())
        .unwrap_or_else(|| crate::geometry::Shape::new(nrows as crate::geometry::Index, 0));
    let mut factory: DcscFactory<T, IT> = DcscFactory::new(shape);
    let mut spa: Spa<T> = Spa::new(nrows, use_dense_spa);

    while let Some(Reverse(cursor)) = heap.pop() {
        let col = cursor.current_col();
        let (rows, values) = cursor.leaf.rows_values_at_pos(cursor.pos);
        let row_indices: Vec<crate::geometry::Index> = rows.iter().map(|r| r.to_index()).collect();
        spa.scatter_add(&row_indices, values, semiring);

        let mut advanced = cursor;
        advanced.pos += 1;
        if advanced.has_more() {
            heap.push(Reverse(advanced));
        }

        let next_is_same_col = heap.peek().map(|Reverse(c)| c.current_col() == col).unwrap_or(false);
        if !next_is_same_col {
            if !spa.is_empty() {
                factory.add_column_from_spa(col, &mut spa);
            }
            spa.clear();
        }
    }

    factory.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;
    use crate::leaf::dcsc::DcscFactory;
    use crate::semiring::PlusTimes;
    use crate::spa::DenseSpa;

    fn leaf_from(shape: Shape, cols: &[(i16, &[(i16, f64)])]) -> Rc<DcscLeaf<f64, i16>> {
        let mut f: DcscFactory<f64, i16> = DcscFactory::new(shape);
        let sr = PlusTimes;
        for &(col, entries) in cols {
            let mut spa = DenseSpa::<f64>::new(shape.nrows as usize);
            let rows: Vec<crate::geometry::Index> = entries.iter().map(|&(r, _)| r as crate::geometry::Index).collect();
            let values: Vec<f64> = entries.iter().map(|&(_, v)| v).collect();
            spa.scatter_add(&rows, &values, &sr);
            f.add_column_from_spa(col, &mut spa);
        }
        Rc::new(f.finish())
    }

    #[test]
    fn single_input_fast_path() {
        let shape = Shape::new(4, 4);
        let leaf = leaf_from(shape, &[(0, &[(0, 1.0)]), (2, &[(1, 2.0)])]);
        let sr = PlusTimes;
        let result = accumulate(vec![leaf.clone()], 4, true, &sr);
        assert_eq!(result.nnn(), leaf.nnn());
        assert_eq!(result.num_columns(), leaf.num_columns());
    }

    #[test]
    fn merges_overlapping_columns_by_addition() {
        let shape = Shape::new(4, 4);
        let a = leaf_from(shape, &[(0, &[(0, 1.0), (1, 2.0)]), (3, &[(2, 5.0)])]);
        let b = leaf_from(shape, &[(0, &[(1, 10.0)]), (1, &[(0, 3.0)])]);
        let sr = PlusTimes;
        let result = accumulate(vec![a, b], 4, true, &sr);
        assert_eq!(result.num_columns(), 3);
        let c0 = result.get_column(0).unwrap();
        let col0: Vec<_> = c0.rows.zip(c0.values.iter().copied()).collect();
        assert_eq!(col0, vec![(0i16, 1.0), (1i16, 12.0)]);
        let c1 = result.get_column(1).unwrap();
        let col1: Vec<_> = c1.rows.zip(c1.values.iter().copied()).collect();
        assert_eq!(col1, vec![(0i16, 3.0)]);
    }

    #[test]
    fn empty_input_list_produces_empty_leaf() {
        let sr = PlusTimes;
        let result: DcscLeaf<f64, i16> = accumulate(vec![], 4, true, &sr);
        assert_eq!(result.nnn(), 0);
    }
}
