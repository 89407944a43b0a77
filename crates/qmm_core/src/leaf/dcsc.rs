//! Immutable, column-compressed (DCSC) leaf storage (C3) plus its append-only factory.

use super::{ColumnView, LeafView};
use crate::geometry::{BlockNnz, Shape};
use crate::spa::SpaLike;
use crate::width::LeafIndex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DcscInvariantError {
    #[error("columns not strictly increasing at position {pos}")]
    ColumnsNotStrictlyIncreasing { pos: usize },
    #[error("rows not strictly increasing in column at position {col_pos}")]
    RowsNotStrictlyIncreasing { col_pos: usize },
    #[error("col_ptr length {actual} inconsistent with column count {expected}")]
    BadColPtrLength { expected: usize, actual: usize },
    #[error("col_ptr is not non-decreasing at position {pos}")]
    ColPtrNotMonotonic { pos: usize },
    #[error("row index {row} out of bounds for nrows={nrows}")]
    RowOutOfBounds { row: i64, nrows: i64 },
    #[error("trailing col_ptr sentinel {sentinel} does not equal row_ind.len()={nnn}")]
    BadSentinel { sentinel: usize, nnn: usize },
}

/// An immutable DCSC leaf over value type `T`, indexed locally by `IT`.
///
/// Built exclusively through [`DcscFactory`]; never mutated afterwards (§3 data model).
#[derive(Debug, Clone)]
pub struct DcscLeaf<T, IT: LeafIndex> {
    shape: Shape,
    col_ind: Vec<IT>,
    col_ptr: Vec<BlockNnz>,
    row_ind: Vec<IT>,
    values: Vec<T>,
}

impl<T, IT: LeafIndex> DcscLeaf<T, IT> {
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn nnn(&self) -> usize {
        self.row_ind.len()
    }

    pub fn num_columns(&self) -> usize {
        self.col_ind.len()
    }

    /// Position of the first present column `>= col` (binary search), or `num_columns()`
    /// if none. This is `GetColumnLowerBound`.
    pub fn column_lower_bound_pos(&self, col: IT) -> usize {
        match self.col_ind.binary_search(&col) {
            Ok(p) => p,
            Err(p) => p,
        }
    }

    /// Exact lookup of `col`'s position, if present.
    pub fn get_column_pos(&self, col: IT) -> Option<usize> {
        self.col_ind.binary_search(&col).ok()
    }

    pub fn column_at_pos(&self, pos: usize) -> IT {
        self.col_ind[pos]
    }

    /// `(row_ind, values)` slice pair for the column stored at position `pos`.
    pub fn rows_values_at_pos(&self, pos: usize) -> (&[IT], &[T]) {
        let start = self.col_ptr[pos] as usize;
        let end = self.col_ptr[pos + 1] as usize;
        (&self.row_ind[start..end], &self.values[start..end])
    }

    pub fn check_invariants(&self) -> Result<(), DcscInvariantError> {
        let k = self.col_ind.len();
        if k == 0 {
            return if self.col_ptr.is_empty() && self.row_ind.is_empty() && self.values.is_empty() {
                Ok(())
            } else {
                Err(DcscInvariantError::BadColPtrLength {
                    expected: 0,
                    actual: self.col_ptr.len(),
                })
            };
        }
        if self.col_ptr.len() != k + 1 {
            return Err(DcscInvariantError::BadColPtrLength {
                expected: k + 1,
                actual: self.col_ptr.len(),
            });
        }
        for i in 1..k {
            if self.col_ind[i] <= self.col_ind[i - 1] {
                return Err(DcscInvariantError::ColumnsNotStrictlyIncreasing { pos: i });
            }
        }
        for i in 0..k {
            if self.col_ptr[i] > self.col_ptr[i + 1] {
                return Err(DcscInvariantError::ColPtrNotMonotonic { pos: i });
            }
        }
        let nnn = self.row_ind.len();
        if *self.col_ptr.last().unwrap() as usize != nnn {
            return Err(DcscInvariantError::BadSentinel {
                sentinel: *self.col_ptr.last().unwrap() as usize,
                nnn,
            });
        }
        for pos in 0..k {
            let (rows, _) = self.rows_values_at_pos(pos);
            for w in rows.windows(2) {
                if w[1] <= w[0] {
                    return Err(DcscInvariantError::RowsNotStrictlyIncreasing { col_pos: pos });
                }
            }
            for &r in rows {
                if r.to_index() >= self.shape.nrows || r.to_index() < 0 {
                    return Err(DcscInvariantError::RowOutOfBounds {
                        row: r.to_index(),
                        nrows: self.shape.nrows,
                    });
                }
            }
        }
        Ok(())
    }
}

impl<T, IT: LeafIndex> LeafView<T, IT> for DcscLeaf<T, IT> {
    fn shape(&self) -> Shape {
        self.shape
    }

    fn nnn(&self) -> usize {
        self.nnn()
    }

    fn get_column(&self, col: IT) -> Option<ColumnView<'_, T, IT>> {
        let pos = self.get_column_pos(col)?;
        let (rows, values) = self.rows_values_at_pos(pos);
        Some(ColumnView {
            col,
            rows: Box::new(rows.iter().copied()),
            values,
        })
    }

    fn columns(&self) -> Box<dyn Iterator<Item = ColumnView<'_, T, IT>> + '_> {
        Box::new((0..self.num_columns()).map(move |pos| {
            let col = self.column_at_pos(pos);
            let (rows, values) = self.rows_values_at_pos(pos);
            ColumnView {
                col,
                rows: Box::new(rows.iter().copied()),
                values,
            }
        }))
    }
}

/// Append-only factory for [`DcscLeaf`]. `add_column_from_spa` requires strictly
/// increasing columns; `finish` appends the trailing `col_ptr` sentinel (only if any
/// column was ever added).
pub struct DcscFactory<T, IT: LeafIndex> {
    shape: Shape,
    col_ind: Vec<IT>,
    col_ptr: Vec<BlockNnz>,
    row_ind: Vec<IT>,
    values: Vec<T>,
    last_col: Option<IT>,
}

impl<T, IT: LeafIndex> DcscFactory<T, IT> {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            col_ind: Vec::new(),
            col_ptr: Vec::new(),
            row_ind: Vec::new(),
            values: Vec::new(),
            last_col: None,
        }
    }

    /// Dumps an SpA's accumulated column into the leaf under construction. `col` must be
    /// strictly greater than any previously added column.
    pub fn add_column_from_spa(&mut self, col: IT, spa: &mut impl SpaLike<T>) -> bool {
        if let Some(last) = self.last_col {
            if col <= last {
                return false;
            }
        }
        self.col_ind.push(col);
        self.col_ptr.push(self.row_ind.len() as BlockNnz);
        spa.emplace_back_result(&mut |row, value| {
            self.row_ind.push(IT::from_index(row));
            self.values.push(value);
        });
        self.last_col = Some(col);
        true
    }

    pub fn finish(mut self) -> DcscLeaf<T, IT> {
        if !self.col_ind.is_empty() {
            self.col_ptr.push(self.row_ind.len() as BlockNnz);
        }
        let leaf = DcscLeaf {
            shape: self.shape,
            col_ind: self.col_ind,
            col_ptr: self.col_ptr,
            row_ind: self.row_ind,
            values: self.values,
        };
        debug_assert!(leaf.check_invariants().is_ok(), "finish() produced a leaf violating its own invariants");
        leaf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::PlusTimes;
    use crate::spa::DenseSpa;

    #[test]
    fn factory_rejects_out_of_order_column() {
        let mut f: DcscFactory<f64, i16> = DcscFactory::new(Shape::new(4, 4));
        let mut spa = DenseSpa::<f64>::new(4);
        let sr = PlusTimes;
        spa.scatter_add(&[0], &[1.0], &sr);
        assert!(f.add_column_from_spa(2, &mut spa));
        spa.clear();
        spa.scatter_add(&[1], &[2.0], &sr);
        assert!(!f.add_column_from_spa(1, &mut spa), "out-of-order column must be rejected");
    }

    #[test]
    fn empty_leaf_has_no_sentinel() {
        let f: DcscFactory<f64, i16> = DcscFactory::new(Shape::new(4, 4));
        let leaf = f.finish();
        assert_eq!(leaf.num_columns(), 0);
        assert_eq!(leaf.nnn(), 0);
        assert!(leaf.check_invariants().is_ok());
    }

    #[test]
    fn build_and_lookup() {
        let mut f: DcscFactory<f64, i16> = DcscFactory::new(Shape::new(4, 4));
        let mut spa = DenseSpa::<f64>::new(4);
        let sr = PlusTimes;
        spa.scatter_multiply(&[0, 2], &[10.0, 20.0], 1.0, &sr);
        f.add_column_from_spa(0, &mut spa);
        spa.clear();
        spa.scatter_multiply(&[1], &[5.0], 1.0, &sr);
        f.add_column_from_spa(3, &mut spa);
        let leaf = f.finish();
        assert!(leaf.check_invariants().is_ok());
        assert_eq!(leaf.nnn(), 3);
        let col0 = leaf.get_column(0).unwrap();
        let rows: Vec<i16> = col0.rows.collect();
        assert_eq!(rows, vec![0, 2]);
        assert_eq!(col0.values, &[10.0, 20.0]);
        assert!(leaf.get_column(1).is_none());
        assert_eq!(leaf.column_lower_bound_pos(1), 1);
    }
}
