//! Shadow subdivision (§4.8, C10) and triples-to-quadtree construction (§4.9, C11).

use crate::block::InnerBlock;
use crate::config::Config;
use crate::geometry::{self, Index, Offset, Position, Shape};
use crate::leaf::dcsc::{DcscFactory, DcscLeaf};
use crate::leaf::shadow::ShadowLeaf;
use crate::leaf::triples::TriplesLeaf;
use crate::node::{Leaf, Leaf16, Leaf32, Leaf64, Node};
use crate::semiring::Semiring;
use crate::spa::{Spa, SpaLike};
use crate::tuple_stream::OffsetTupleStream;
use crate::width::{IndexWidth, LeafIndex};
use std::rc::Rc;

// ---------------------------------------------------------------------------------------
// Shadow subdivision (C10)
// ---------------------------------------------------------------------------------------

/// Splits leaf `leaf` (whose own shape is `shape`) against the halved discriminating bit
/// `d_parent >> 1`, producing four (possibly empty) window-shadow children. Never copies
/// any nonzero data — every child shares ownership of the same underlying DCSC base.
pub fn shadow_subdivide<T: Copy>(leaf: &Leaf<T>, shape: Shape, d_parent: Index) -> [Node<T>; 4] {
    let d = d_parent >> 1;
    match leaf {
        Leaf::W16(Leaf16::Dcsc(base)) => {
            let n = base.num_columns();
            subdivide_from_base16(base.clone(), 0, n, Offset::ZERO, shape, d)
        }
        Leaf::W16(Leaf16::Shadow16(s)) => subdivide_shadow16(s, shape, d),
        Leaf::W16(Leaf16::Shadow32(s)) => subdivide_shadow32(s, shape, d),
        Leaf::W16(Leaf16::Shadow64(s)) => subdivide_shadow64(s, shape, d),
        Leaf::W32(Leaf32::Dcsc(base)) => {
            let n = base.num_columns();
            subdivide_from_base32(base.clone(), 0, n, Offset::ZERO, shape, d)
        }
        Leaf::W32(Leaf32::Shadow32(s)) => subdivide_shadow32(s, shape, d),
        Leaf::W32(Leaf32::Shadow64(s)) => subdivide_shadow64(s, shape, d),
        Leaf::W64(Leaf64::Dcsc(base)) => {
            let n = base.num_columns();
            subdivide_from_base64(base.clone(), 0, n, Offset::ZERO, shape, d)
        }
        Leaf::W64(Leaf64::Shadow64(s)) => subdivide_shadow64(s, shape, d),
    }
}

/// Column-position + offset window for each of the four children, given a base leaf's
/// current `[begin_pos, end_pos)` window, its current relative `offset`, its own `shape`,
/// and the new discriminating bit `d`.
struct ChildWindow {
    pos: Position,
    begin_pos: usize,
    end_pos: usize,
    offset: Offset,
    shape: Shape,
}

fn child_windows<T, BaseIT: LeafIndex>(
    base: &DcscLeaf<T, BaseIT>,
    begin_pos: usize,
    end_pos: usize,
    offset: Offset,
    shape: Shape,
    d: Index,
) -> [Option<ChildWindow>; 4] {
    let division_abs = BaseIT::from_index(d + offset.col_offset);
    let pos = base.column_lower_bound_pos(division_abs).clamp(begin_pos, end_pos);
    let (west_begin, west_end) = (begin_pos, pos);
    let (east_begin, east_end) = (pos, end_pos);

    let make = |p: Position| -> Option<ChildWindow> {
        let (cb, ce) = match p {
            Position::Nw | Position::Sw => (west_begin, west_end),
            Position::Ne | Position::Se => (east_begin, east_end),
        };
        if cb >= ce {
            return None;
        }
        let delta = geometry::child_offset(p, d, Offset::ZERO);
        let child_offset = Offset::new(offset.row_offset + delta.row_offset, offset.col_offset + delta.col_offset);
        let child_shape = geometry::child_shape(p, d, shape);
        Some(ChildWindow {
            pos: p,
            begin_pos: cb,
            end_pos: ce,
            offset: child_offset,
            shape: child_shape,
        })
    };

    [make(Position::Nw), make(Position::Ne), make(Position::Sw), make(Position::Se)]
}

macro_rules! gen_subdivide_from_base {
    ($fn_name:ident, $base_it:ty, $wrap:ident) => {
        fn $fn_name<T: Copy>(
            base: Rc<DcscLeaf<T, $base_it>>,
            begin_pos: usize,
            end_pos: usize,
            offset: Offset,
            shape: Shape,
            d: Index,
        ) -> [Node<T>; 4] {
            let windows = child_windows(&base, begin_pos, end_pos, offset, shape, d);
            let mut out = [Node::Empty, Node::Empty, Node::Empty, Node::Empty];
            for (idx, w) in windows.into_iter().enumerate() {
                if let Some(w) = w {
                    out[idx] = $wrap(base.clone(), w);
                }
            }
            out
        }
    };
}

gen_subdivide_from_base!(subdivide_from_base16, i16, wrap_shadow_from16);
gen_subdivide_from_base!(subdivide_from_base32, i32, wrap_shadow_from32);
gen_subdivide_from_base!(subdivide_from_base64, i64, wrap_shadow_from64);

fn wrap_shadow_from16<T: Copy>(base: Rc<DcscLeaf<T, i16>>, w: ChildWindow) -> Node<T> {
    // A leaf already at the narrowest width can only shrink further, never widen.
    let shadow = Rc::new(ShadowLeaf::<T, i16, i16>::new(
        base,
        w.begin_pos,
        w.end_pos,
        w.offset.row_offset,
        w.offset.col_offset,
        w.shape,
    ));
    Node::Leaf(Leaf::W16(Leaf16::Shadow16(shadow)))
}

fn wrap_shadow_from32<T: Copy>(base: Rc<DcscLeaf<T, i32>>, w: ChildWindow) -> Node<T> {
    match IndexWidth::for_shape(w.shape) {
        IndexWidth::W16 => {
            let shadow = Rc::new(ShadowLeaf::<T, i32, i16>::new(
                base,
                w.begin_pos,
                w.end_pos,
                w.offset.row_offset,
                w.offset.col_offset,
                w.shape,
            ));
            Node::Leaf(Leaf::W16(Leaf16::Shadow32(shadow)))
        }
        _ => {
            let shadow = Rc::new(ShadowLeaf::<T, i32, i32>::new(
                base,
                w.begin_pos,
                w.end_pos,
                w.offset.row_offset,
                w.offset.col_offset,
                w.shape,
            ));
            Node::Leaf(Leaf::W32(Leaf32::Shadow32(shadow)))
        }
    }
}

fn wrap_shadow_from64<T: Copy>(base: Rc<DcscLeaf<T, i64>>, w: ChildWindow) -> Node<T> {
    match IndexWidth::for_shape(w.shape) {
        IndexWidth::W16 => {
            let shadow = Rc::new(ShadowLeaf::<T, i64, i16>::new(
                base,
                w.begin_pos,
                w.end_pos,
                w.offset.row_offset,
                w.offset.col_offset,
                w.shape,
            ));
            Node::Leaf(Leaf::W16(Leaf16::Shadow64(shadow)))
        }
        IndexWidth::W32 => {
            let shadow = Rc::new(ShadowLeaf::<T, i64, i32>::new(
                base,
                w.begin_pos,
                w.end_pos,
                w.offset.row_offset,
                w.offset.col_offset,
                w.shape,
            ));
            Node::Leaf(Leaf::W32(Leaf32::Shadow64(shadow)))
        }
        IndexWidth::W64 => {
            let shadow = Rc::new(ShadowLeaf::<T, i64, i64>::new(
                base,
                w.begin_pos,
                w.end_pos,
                w.offset.row_offset,
                w.offset.col_offset,
                w.shape,
            ));
            Node::Leaf(Leaf::W64(Leaf64::Shadow64(shadow)))
        }
    }
}

fn subdivide_shadow16<T: Copy>(s: &Rc<ShadowLeaf<T, i16, i16>>, shape: Shape, d: Index) -> [Node<T>; 4] {
    subdivide_from_base16(s.base().clone(), s.begin_pos(), s.end_pos(), s.offset(), shape, d)
}

fn subdivide_shadow32<T: Copy>(s: &Rc<ShadowLeaf<T, i32, i32>>, shape: Shape, d: Index) -> [Node<T>; 4] {
    subdivide_from_base32(s.base().clone(), s.begin_pos(), s.end_pos(), s.offset(), shape, d)
}

fn subdivide_shadow64<T: Copy>(s: &Rc<ShadowLeaf<T, i64, i64>>, shape: Shape, d: Index) -> [Node<T>; 4] {
    subdivide_from_base64(s.base().clone(), s.begin_pos(), s.end_pos(), s.offset(), shape, d)
}

// ---------------------------------------------------------------------------------------
// Triples -> quadtree construction (C11)
// ---------------------------------------------------------------------------------------

/// Wraps a plain merge closure as a [`Semiring`] whose `multiply` is never called, so that
/// construction can reuse the SpA machinery's duplicate-accumulation for free.
struct CombineSemiring<F>(F);

impl<T: Copy, F: Fn(T, T) -> T> Semiring<T> for CombineSemiring<F> {
    fn zero(&self) -> T {
        unreachable!("construction never reads the semiring's zero")
    }

    fn add(&self, a: T, b: T) -> T {
        (self.0)(a, b)
    }

    fn multiply(&self, _a: T, _b: T) -> T {
        unreachable!("construction never multiplies")
    }
}

/// Builds a balanced quadtree from `triples`, operating on the permutation vector `perm` in
/// place (never moving the underlying triples). Every leaf ends up with at most
/// `config.leaf_split_threshold` nonzeros. `combine` merges duplicate `(row, col)` entries.
///
/// `triples` stores every entry's coordinates in the *enclosing matrix's* absolute space;
/// `offset` is this call's block's own absolute `(row, col)` — threaded down so partition
/// predicates compare against the right absolute division point (`offset.* + d`, mirroring
/// `child_windows`' `d + offset.col_offset` below) and so leaves can rebase back to local
/// indices before storing them.
pub fn build_quadtree<T: Copy>(
    triples: &TriplesLeaf<T>,
    perm: &mut [usize],
    shape: Shape,
    offset: Offset,
    config: &Config,
    combine: &impl Fn(T, T) -> T,
) -> Node<T> {
    if perm.is_empty() {
        return Node::Empty;
    }
    if perm.len() <= config.leaf_split_threshold {
        return build_leaf(triples, perm, shape, offset, config, combine);
    }

    let d = geometry::discriminating_bit(shape);
    let col_div = offset.col_offset + d;
    let row_div = offset.row_offset + d;
    let west_end = partition(perm, |i| triples.col(i) < col_div);
    let (west, east) = perm.split_at_mut(west_end);
    let nw_end = partition(west, |i| triples.row(i) < row_div);
    let (nw, sw) = west.split_at_mut(nw_end);
    let ne_end = partition(east, |i| triples.row(i) < row_div);
    let (ne, se) = east.split_at_mut(ne_end);

    let inner = InnerBlock::new(d).expect("discriminating_bit is always a single power-of-two bit");
    let nw_offset = geometry::child_offset(Position::Nw, d, offset);
    let ne_offset = geometry::child_offset(Position::Ne, d, offset);
    let sw_offset = geometry::child_offset(Position::Sw, d, offset);
    let se_offset = geometry::child_offset(Position::Se, d, offset);
    let node_nw = build_quadtree(triples, nw, geometry::child_shape(Position::Nw, d, shape), nw_offset, config, combine);
    let node_ne = build_quadtree(triples, ne, geometry::child_shape(Position::Ne, d, shape), ne_offset, config, combine);
    let node_sw = build_quadtree(triples, sw, geometry::child_shape(Position::Sw, d, shape), sw_offset, config, combine);
    let node_se = build_quadtree(triples, se, geometry::child_shape(Position::Se, d, shape), se_offset, config, combine);
    inner.set_child(Position::Nw.index(), node_nw);
    inner.set_child(Position::Ne.index(), node_ne);
    inner.set_child(Position::Sw.index(), node_sw);
    inner.set_child(Position::Se.index(), node_se);

    if inner.all_children_empty() {
        Node::Empty
    } else {
        Node::Inner(Rc::new(inner))
    }
}

/// Hoare-style in-place partition: reorders `perm` so that every index satisfying `pred`
/// precedes every index that doesn't; returns the split point. Order within each side is
/// unspecified (construction only needs a later stable sort of the leaf-sized slice).
fn partition(perm: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut i = 0;
    let mut j = perm.len();
    while i < j {
        if pred(perm[i]) {
            i += 1;
        } else {
            j -= 1;
            perm.swap(i, j);
        }
    }
    i
}

fn build_leaf<T: Copy>(
    triples: &TriplesLeaf<T>,
    perm: &mut [usize],
    shape: Shape,
    offset: Offset,
    config: &Config,
    combine: &impl Fn(T, T) -> T,
) -> Node<T> {
    // Sort by *absolute* (col, row) — a stable sort, so that for genuine duplicate
    // `(row, col)` keys the last-pushed triple (the one `TriplesLeaf::push` appended last)
    // also sorts last, matching `Matrix::from_tuples`'s documented "keep the last value
    // seen" duplicate policy once `build_leaf_typed`'s scatter below folds them together.
    perm.sort_by_key(|&i| (triples.col(i), triples.row(i)));
    let width = IndexWidth::for_shape(shape);
    match width {
        IndexWidth::W16 => Node::Leaf(Leaf::W16(Leaf16::Dcsc(Rc::new(build_leaf_typed::<T, i16, _>(
            triples, perm, shape, offset, config, combine,
        ))))),
        IndexWidth::W32 => Node::Leaf(Leaf::W32(Leaf32::Dcsc(Rc::new(build_leaf_typed::<T, i32, _>(
            triples, perm, shape, offset, config, combine,
        ))))),
        IndexWidth::W64 => Node::Leaf(Leaf::W64(Leaf64::Dcsc(Rc::new(build_leaf_typed::<T, i64, _>(
            triples, perm, shape, offset, config, combine,
        ))))),
    }
}

fn build_leaf_typed<T: Copy, IT: LeafIndex, F: Fn(T, T) -> T>(
    triples: &TriplesLeaf<T>,
    perm: &[usize],
    shape: Shape,
    offset: Offset,
    config: &Config,
    combine: &F,
) -> DcscLeaf<T, IT> {
    let mut factory: DcscFactory<T, IT> = DcscFactory::new(shape);
    let use_dense = config.should_use_dense_spa::<T>(shape.nrows);
    let sr = CombineSemiring(combine);

    // Rebase every entry from the enclosing matrix's absolute coordinates down to this
    // leaf's own local `[0, shape.nrows) x [0, shape.ncols)` space before it is ever stored
    // — `perm`'s absolute (col, row) order is preserved under the translation, so the
    // column-grouping loop below can keep grouping on `local[..].1`.
    let local: Vec<(Index, Index, T)> = OffsetTupleStream::new(
        perm.iter().map(|&i| (triples.row(i), triples.col(i), *triples.value(i))),
        -offset.row_offset,
        -offset.col_offset,
    )
    .collect();

    let mut start = 0usize;
    while start < local.len() {
        let col = local[start].1;
        let mut end = start + 1;
        while end < local.len() && local[end].1 == col {
            end += 1;
        }
        let mut spa: Spa<T> = Spa::new(shape.nrows as usize, use_dense);
        for &(row, _, val) in &local[start..end] {
            spa.scatter_add(&[row], &[val], &sr);
        }
        factory.add_column_from_spa(IT::from_index(col), &mut spa);
        start = end;
    }
    let leaf = factory.finish();
    debug_assert!(leaf.check_invariants().is_ok(), "constructed DCSC leaf violates its own invariants");
    leaf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::LeafView;

    fn make_triples() -> TriplesLeaf<f64> {
        let mut t = TriplesLeaf::new();
        t.push(0, 0, 1.0);
        t.push(1, 1, 2.0);
        t.push(2, 2, 3.0);
        t.push(3, 3, 4.0);
        t
    }

    #[test]
    fn small_slice_builds_single_leaf() {
        let t = make_triples();
        let mut perm: Vec<usize> = (0..t.len()).collect();
        let cfg = Config::default();
        let node = build_quadtree(&t, &mut perm, Shape::new(4, 4), Offset::ZERO, &cfg, &|_a, b| b);
        assert!(node.is_leaf());
        assert_eq!(node.nnn(), 4);
    }

    #[test]
    fn empty_slice_builds_empty_node() {
        let t: TriplesLeaf<f64> = TriplesLeaf::new();
        let mut perm: Vec<usize> = vec![];
        let cfg = Config::default();
        let node = build_quadtree(&t, &mut perm, Shape::new(4, 4), Offset::ZERO, &cfg, &|_a, b| b);
        assert!(node.is_empty());
    }

    #[test]
    fn forced_subdivision_builds_inner_tree() {
        let t = make_triples();
        let mut perm: Vec<usize> = (0..t.len()).collect();
        let mut cfg = Config::default();
        cfg.leaf_split_threshold = 1;
        let node = build_quadtree(&t, &mut perm, Shape::new(4, 4), Offset::ZERO, &cfg, &|_a, b| b);
        assert!(node.is_inner());
        assert_eq!(node.nnn(), 4);
    }

    #[test]
    fn shadow_subdivide_diagonal_leaf_into_four_quadrants() {
        use crate::semiring::PlusTimes;

        let mut f: DcscFactory<f64, i32> = DcscFactory::new(Shape::new(8, 8));
        for c in 0..8i32 {
            let mut spa: Spa<f64> = Spa::new(8, true);
            spa.scatter_add(&[c as i64], &[(c + 1) as f64], &PlusTimes);
            f.add_column_from_spa(c, &mut spa);
        }
        let base = Rc::new(f.finish());
        let leaf: Leaf<f64> = Leaf::W32(Leaf32::Dcsc(base));
        let children = shadow_subdivide(&leaf, Shape::new(8, 8), 8);
        // parent disc bit 8 -> new bit 4; NW covers [0,4)x[0,4), SE covers [4,8)x[4,8).
        assert!(children[Position::Nw.index()].is_leaf());
        assert!(children[Position::Se.index()].is_leaf());
        assert_eq!(children[Position::Nw.index()].nnn(), 4);
        assert_eq!(children[Position::Se.index()].nnn(), 4);
        assert!(children[Position::Ne.index()].is_empty());
        assert!(children[Position::Sw.index()].is_empty());
    }
}
