//! The Sparse Accumulator (SpA, C8): a scratch structure for summing many contributions
//! into one destination column. [`DenseSpa`] is used when the column's row count and
//! byte size both fit under [`crate::config::Config`]'s caps; [`SparseSpa`] otherwise.

use crate::geometry::Index;
use crate::semiring::Semiring;
use std::collections::BTreeMap;

/// Shared SpA interface. Both `v`ariants support a pure-add scatter (used by the DCSC
/// accumulator, §4.5) and a multiply-then-add scatter (used by leaf multiply, §4.6) —
/// modeled as two distinctly named methods since Rust has no parameter-count overloading
/// (DESIGN.md decision 3).
pub trait SpaLike<T: Copy> {
    /// `x[r] <- semiring.add(x[r], v)` for each `(r, v)`; first touch marks `r` active.
    fn scatter_add<S: Semiring<T>>(&mut self, rows: &[Index], values: &[T], semiring: &S);

    /// `x[r] <- semiring.add(x[r], semiring.multiply(v, b_val))` for each `(r, v)`.
    fn scatter_multiply<S: Semiring<T>>(&mut self, rows: &[Index], values: &[T], b_val: T, semiring: &S);

    /// Appends `(r, x[r])` for every active row, in ascending row order, via `sink`.
    fn emplace_back_result(&mut self, sink: &mut dyn FnMut(Index, T));

    fn is_empty(&self) -> bool;

    /// Clears only the touched rows, preserving O(work) reset cost.
    fn clear(&mut self);
}

/// Dense SpA: a full-width accumulator array plus a list of touched rows. Chosen when
/// `nrows <= DenseSpaMaxCount` and `nrows * size_of::<T>() <= DenseSpaMaxBytes`.
pub struct DenseSpa<T> {
    x: Vec<Option<T>>,
    touched: Vec<Index>,
}

impl<T: Copy> DenseSpa<T> {
    pub fn new(nrows: usize) -> Self {
        Self {
            x: vec![None; nrows],
            touched: Vec::new(),
        }
    }

    fn touch(&mut self, r: Index, v: T) {
        let idx = r as usize;
        match self.x[idx] {
            None => {
                self.x[idx] = Some(v);
                self.touched.push(r);
            }
            Some(_) => unreachable!("touch() is only for first-touch; use combine()"),
        }
    }

    fn combine<S: Semiring<T>>(&mut self, r: Index, v: T, semiring: &S) {
        let idx = r as usize;
        match self.x[idx] {
            None => self.touch(r, v),
            Some(cur) => self.x[idx] = Some(semiring.add(cur, v)),
        }
    }
}

impl<T: Copy> SpaLike<T> for DenseSpa<T> {
    fn scatter_add<S: Semiring<T>>(&mut self, rows: &[Index], values: &[T], semiring: &S) {
        for (&r, &v) in rows.iter().zip(values.iter()) {
            self.combine(r, v, semiring);
        }
    }

    fn scatter_multiply<S: Semiring<T>>(&mut self, rows: &[Index], values: &[T], b_val: T, semiring: &S) {
        for (&r, &v) in rows.iter().zip(values.iter()) {
            let contribution = semiring.multiply(v, b_val);
            self.combine(r, contribution, semiring);
        }
    }

    fn emplace_back_result(&mut self, sink: &mut dyn FnMut(Index, T)) {
        self.touched.sort_unstable();
        for &r in &self.touched {
            let v = self.x[r as usize].expect("touched row must be populated");
            sink(r, v);
        }
    }

    fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    fn clear(&mut self) {
        for &r in &self.touched {
            self.x[r as usize] = None;
        }
        self.touched.clear();
    }
}

/// Sparse SpA: an ordered map from row to accumulated value. Used when the dense array
/// would be too large.
#[derive(Default)]
pub struct SparseSpa<T> {
    map: BTreeMap<Index, T>,
}

impl<T: Copy> SparseSpa<T> {
    pub fn new() -> Self {
        Self { map: BTreeMap::new() }
    }
}

impl<T: Copy> SpaLike<T> for SparseSpa<T> {
    fn scatter_add<S: Semiring<T>>(&mut self, rows: &[Index], values: &[T], semiring: &S) {
        for (&r, &v) in rows.iter().zip(values.iter()) {
            self.map
                .entry(r)
                .and_modify(|cur| *cur = semiring.add(*cur, v))
                .or_insert(v);
        }
    }

    fn scatter_multiply<S: Semiring<T>>(&mut self, rows: &[Index], values: &[T], b_val: T, semiring: &S) {
        for (&r, &v) in rows.iter().zip(values.iter()) {
            let contribution = semiring.multiply(v, b_val);
            self.map
                .entry(r)
                .and_modify(|cur| *cur = semiring.add(*cur, contribution))
                .or_insert(contribution);
        }
    }

    fn emplace_back_result(&mut self, sink: &mut dyn FnMut(Index, T)) {
        // BTreeMap iterates in ascending key order already.
        for (&r, &v) in self.map.iter() {
            sink(r, v);
        }
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn clear(&mut self) {
        self.map.clear();
    }
}

/// Either accumulator flavor, selected once via [`crate::config::Config::should_use_dense_spa`]
/// and then used uniformly.
pub enum Spa<T> {
    Dense(DenseSpa<T>),
    Sparse(SparseSpa<T>),
}

impl<T: Copy> Spa<T> {
    pub fn new(nrows: usize, use_dense: bool) -> Self {
        if use_dense {
            Spa::Dense(DenseSpa::new(nrows))
        } else {
            Spa::Sparse(SparseSpa::new())
        }
    }
}

impl<T: Copy> SpaLike<T> for Spa<T> {
    fn scatter_add<S: Semiring<T>>(&mut self, rows: &[Index], values: &[T], semiring: &S) {
        match self {
            Spa::Dense(d) => d.scatter_add(rows, values, semiring),
            Spa::Sparse(s) => s.scatter_add(rows, values, semiring),
        }
    }

    fn scatter_multiply<S: Semiring<T>>(&mut self, rows: &[Index], values: &[T], b_val: T, semiring: &S) {
        match self {
            Spa::Dense(d) => d.scatter_multiply(rows, values, b_val, semiring),
            Spa::Sparse(s) => s.scatter_multiply(rows, values, b_val, semiring),
        }
    }

    fn emplace_back_result(&mut self, sink: &mut dyn FnMut(Index, T)) {
        match self {
            Spa::Dense(d) => d.emplace_back_result(sink),
            Spa::Sparse(s) => s.emplace_back_result(sink),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Spa::Dense(d) => d.is_empty(),
            Spa::Sparse(s) => s.is_empty(),
        }
    }

    fn clear(&mut self) {
        match self {
            Spa::Dense(d) => d.clear(),
            Spa::Sparse(s) => s.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::PlusTimes;

    #[test]
    fn dense_scatter_add_accumulates() {
        let mut spa = DenseSpa::<f64>::new(4);
        let sr = PlusTimes;
        spa.scatter_add(&[0, 1], &[1.0, 2.0], &sr);
        spa.scatter_add(&[0], &[4.0], &sr);
        let mut out_r = Vec::new();
        let mut out_v = Vec::new();
        spa.emplace_back_result(&mut |r, v| {
            out_r.push(r);
            out_v.push(v);
        });
        assert_eq!(out_r, vec![0, 1]);
        assert_eq!(out_v, vec![5.0, 2.0]);
    }

    #[test]
    fn clear_resets_without_realloc() {
        let mut spa = DenseSpa::<f64>::new(4);
        let sr = PlusTimes;
        spa.scatter_add(&[2], &[9.0], &sr);
        assert!(!spa.is_empty());
        spa.clear();
        assert!(spa.is_empty());
        let mut out = Vec::new();
        spa.emplace_back_result(&mut |r, v| out.push((r, v)));
        assert!(out.is_empty());
    }

    #[test]
    fn sparse_scatter_multiply_matches_dense() {
        let sr = PlusTimes;
        let mut dense = DenseSpa::<f64>::new(4);
        let mut sparse = SparseSpa::<f64>::new();
        dense.scatter_multiply(&[1, 3], &[2.0, 3.0], 10.0, &sr);
        sparse.scatter_multiply(&[1, 3], &[2.0, 3.0], 10.0, &sr);
        let mut dense_out = Vec::new();
        let mut sparse_out = Vec::new();
        dense.emplace_back_result(&mut |r, v| dense_out.push((r, v)));
        sparse.emplace_back_result(&mut |r, v| sparse_out.push((r, v)));
        assert_eq!(dense_out, sparse_out);
    }
}
