//! The multiply driver (C12, §4.7): recursive pair-set multiplication. This is the hard
//! part — the whole correctness story lives in how recursion, shadow subdivision, leaf
//! index narrowing, and the SpA interact to preserve "each result cell = sum over a fixed
//! set of pairwise products."
//!
//! Recursion is driven through [`DirectExecutor`] (C13, §4.10) rather than plain Rust call
//! recursion: every quadrant job is `enqueue`d at a priority derived from its destination
//! offset, and since the driver's own root call is the only non-reentrant `enqueue`, the
//! whole tree's worth of jobs drains — in priority order, deepest/rightmost first — before
//! `multiply` returns. Each job takes a continuation (`OnDone`) to call once its own work
//! (including any jobs it spawned) is complete; a `JoinState` counts down a block's four
//! children so the "all slots ended up empty" cleanup (§4.7.1) runs exactly once, after the
//! last child finishes, no matter what order the executor happens to drain them in.

use crate::accumulator;
use crate::block::{BlockContainer, InnerBlock, RootContainer};
use crate::config::Config;
use crate::error::MultiplyError;
use crate::executor::{destination_priority, DirectExecutor};
use crate::geometry::{self, Index, Offset, Position, Shape};
use crate::leaf::dcsc::DcscLeaf;
use crate::leaf::LeafView;
use crate::leafmul::multiply_leaves;
use crate::node::{Leaf, Leaf16, Leaf32, Leaf64, Node};
use crate::semiring::Semiring;
use crate::subdivide::shadow_subdivide;
use crate::width::{IndexWidth, LeafIndex};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// One `(a, b)` pair plus enough geometry metadata to keep recursing or to shadow-subdivide
/// either side: each side's own shape and its own current discriminating bit.
#[derive(Clone)]
struct PairEntry<T> {
    a: Node<T>,
    b: Node<T>,
    a_shape: Shape,
    b_shape: Shape,
    a_disc_bit: Index,
    b_disc_bit: Index,
}

#[derive(Default, Clone, Copy)]
struct Status {
    has_empty: bool,
    has_future: bool,
    has_inner: bool,
    has_leaf: bool,
    mismatched_dims: bool,
}

impl Status {
    fn of<T: Clone>(pairs: &[PairEntry<T>]) -> Status {
        let mut s = Status::default();
        for p in pairs {
            if p.a.is_empty() || p.b.is_empty() {
                s.has_empty = true;
            }
            if p.a.is_future() || p.b.is_future() {
                s.has_future = true;
            }
            if p.a.is_inner() || p.b.is_inner() {
                s.has_inner = true;
            }
            if p.a.is_leaf() || p.b.is_leaf() {
                s.has_leaf = true;
            }
            if p.a_shape.ncols != p.b_shape.nrows {
                s.mismatched_dims = true;
            }
        }
        s
    }
}

fn prune_empty<T: Clone>(pairs: Vec<PairEntry<T>>) -> Vec<PairEntry<T>> {
    pairs.into_iter().filter(|p| !p.a.is_empty() && !p.b.is_empty()).collect()
}

/// Shared fatal-error slot (§7): the first fatal error recorded wins; later jobs that
/// notice it set skip their own work rather than overwrite it.
type ErrSlot = Rc<RefCell<Option<MultiplyError>>>;

fn record_error(err: &ErrSlot, e: MultiplyError) {
    let mut slot = err.borrow_mut();
    if slot.is_none() {
        *slot = Some(e);
    }
}

/// The continuation a job calls once it (and everything it spawned) is finished.
type OnDone<'a> = Box<dyn FnOnce(&DirectExecutor<'a>) + 'a>;

/// Tracks a just-created inner block's four in-flight children. When the last one
/// reports in, runs the "all slots empty -> collapse to `Node::Empty`" cleanup (§4.7.1)
/// and then fires the block's own continuation.
struct JoinState<'a, T> {
    remaining: Cell<usize>,
    inner: Rc<InnerBlock<T>>,
    parent_dest: Rc<dyn BlockContainer<T>>,
    parent_position: Position,
    on_done: RefCell<Option<OnDone<'a>>>,
}

impl<'a, T: Clone> JoinState<'a, T> {
    fn child_done(self: &Rc<Self>, exec: &DirectExecutor<'a>) {
        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);
        if remaining != 0 {
            return;
        }
        if self.inner.all_children_empty() {
            self.parent_dest.set_child(self.parent_position, Node::Empty);
        }
        if let Some(done) = self.on_done.borrow_mut().take() {
            done(exec);
        }
    }
}

/// Entry point: `c = a * b` under `semiring`, as a fresh result tree rooted in a
/// [`RootContainer`] of shape `(a_shape.nrows, b_shape.ncols)`. Runs the whole recursive
/// job tree to completion on a fresh [`DirectExecutor`] before returning.
pub fn multiply<T, S>(
    a_root: Node<T>,
    a_shape: Shape,
    b_root: Node<T>,
    b_shape: Shape,
    semiring: &S,
    config: &Config,
) -> Result<(Node<T>, Shape), MultiplyError>
where
    T: Copy,
    S: Semiring<T>,
{
    let dest_shape = Shape::new(a_shape.nrows, b_shape.ncols);
    if a_shape.ncols != b_shape.nrows {
        return Err(MultiplyError::DimensionMismatch {
            a_cols: a_shape.ncols,
            b_rows: b_shape.nrows,
        });
    }
    let a_bc: RootContainer<T> = RootContainer::new(a_shape);
    a_bc.set_root(a_root);
    let b_bc: RootContainer<T> = RootContainer::new(b_shape);
    b_bc.set_root(b_root);
    let dest: Rc<RootContainer<T>> = Rc::new(RootContainer::new(dest_shape));

    let pair = PairEntry {
        a: a_bc.root(),
        b: b_bc.root(),
        a_shape,
        b_shape,
        a_disc_bit: a_bc.discriminating_bit(),
        b_disc_bit: b_bc.discriminating_bit(),
    };

    let exec: DirectExecutor<'_> = DirectExecutor::new();
    let err: ErrSlot = Rc::new(RefCell::new(None));
    let err_for_root = err.clone();
    let dest_dyn: Rc<dyn BlockContainer<T>> = dest.clone();
    let priority = destination_priority(Offset::ZERO.row_offset, Offset::ZERO.col_offset);
    exec.enqueue(priority, move |exec| {
        run(
            vec![pair],
            dest_dyn,
            Position::Nw,
            Offset::ZERO,
            dest_shape,
            semiring,
            config,
            true,
            exec,
            err_for_root,
            Box::new(|_exec| {}),
        );
    });

    if let Some(e) = err.borrow_mut().take() {
        return Err(e);
    }
    Ok((dest.root(), dest_shape))
}

/// `Run(pair_set, dest_bc, dest_position, dest_offset, dest_shape, semiring, prune)` (§4.7),
/// driven as a job on `exec`. Calls `on_done` exactly once, either immediately (pruned,
/// empty, dimension errors, or a pure-leaf write) or once `recurse`'s spawned children have
/// all reported in.
#[allow(clippy::too_many_arguments)]
fn run<'a, T, S>(
    pair_set: Vec<PairEntry<T>>,
    dest: Rc<dyn BlockContainer<T>>,
    dest_position: Position,
    dest_offset: Offset,
    dest_shape: Shape,
    semiring: &'a S,
    config: &'a Config,
    prune: bool,
    exec: &DirectExecutor<'a>,
    err: ErrSlot,
    on_done: OnDone<'a>,
) where
    T: Copy + 'a,
    S: Semiring<T> + 'a,
{
    if err.borrow().is_some() {
        on_done(exec);
        return;
    }

    let pairs = if prune { prune_empty(pair_set) } else { pair_set };
    let status = Status::of(&pairs);

    if pairs.is_empty() {
        dest.set_child(dest_position, Node::Empty);
        on_done(exec);
        return;
    }
    if status.mismatched_dims {
        record_error(
            &err,
            MultiplyError::DimensionMismatch {
                a_cols: pairs[0].a_shape.ncols,
                b_rows: pairs[0].b_shape.nrows,
            },
        );
        on_done(exec);
        return;
    }
    if !dest_shape.is_positive() {
        record_error(&err, MultiplyError::NonPositiveShape { shape: dest_shape });
        on_done(exec);
        return;
    }
    if status.has_future {
        record_error(&err, MultiplyError::FutureNodeEncountered);
        on_done(exec);
        return;
    }
    if status.has_inner {
        recurse(pairs, dest, dest_position, dest_offset, dest_shape, semiring, config, exec, err, on_done);
        return;
    }
    match multiply_leaves_job(&pairs, dest.as_ref(), dest_position, dest_shape, semiring, config) {
        Ok(()) => {}
        Err(e) => record_error(&err, e),
    }
    on_done(exec);
}

/// Either side's four quadrant children (real, for an inner block; synthetic window
/// shadows, for a leaf), each quadrant's shape, and the discriminating bit to carry
/// forward as that child's own `*_disc_bit` at the next recursion level.
///
/// An [`InnerBlock`] stores its *real*, undoubled split bit; a leaf's `disc_bit` argument
/// is always double its own natural split bit (the convention [`RootContainer`] seeds at
/// the tree's root, §4.3). The bit handed back here preserves whichever convention applies
/// so the next level's `shadow_subdivide` call (if the child turns out to be a leaf) sees
/// a correctly doubled bit again.
fn quads<T: Copy>(node: &Node<T>, shape: Shape, disc_bit: Index) -> ([Node<T>; 4], [Shape; 4], Index) {
    match node {
        Node::Inner(inner) => {
            let bit = inner.discriminating_bit();
            let nodes = [
                BlockContainer::child(inner.as_ref(), Position::Nw),
                BlockContainer::child(inner.as_ref(), Position::Ne),
                BlockContainer::child(inner.as_ref(), Position::Sw),
                BlockContainer::child(inner.as_ref(), Position::Se),
            ];
            let shapes = [
                geometry::child_shape(Position::Nw, bit, shape),
                geometry::child_shape(Position::Ne, bit, shape),
                geometry::child_shape(Position::Sw, bit, shape),
                geometry::child_shape(Position::Se, bit, shape),
            ];
            (nodes, shapes, bit)
        }
        Node::Leaf(leaf) => {
            let nodes = shadow_subdivide(leaf, shape, disc_bit);
            let d = disc_bit >> 1;
            let shapes = [
                geometry::child_shape(Position::Nw, d, shape),
                geometry::child_shape(Position::Ne, d, shape),
                geometry::child_shape(Position::Sw, d, shape),
                geometry::child_shape(Position::Se, d, shape),
            ];
            (nodes, shapes, d)
        }
        Node::Empty | Node::Future => {
            let d = disc_bit >> 1;
            let shapes = [
                geometry::child_shape(Position::Nw, d, shape),
                geometry::child_shape(Position::Ne, d, shape),
                geometry::child_shape(Position::Sw, d, shape),
                geometry::child_shape(Position::Se, d, shape),
            ];
            ([Node::Empty, Node::Empty, Node::Empty, Node::Empty], shapes, d)
        }
    }
}

/// NW, NE, SW, SE contributions: `C.NW = A.NW*B.NW + A.NE*B.SW`, etc. (the 2x2 block
/// matrix-multiply identity, §4.7.1).
const CONTRIB: [[(usize, usize); 2]; 4] = [
    [(0, 0), (1, 2)],
    [(0, 1), (1, 3)],
    [(2, 0), (3, 2)],
    [(2, 1), (3, 3)],
];

/// Builds the four child pair-sets (§4.7.1) and either folds them back into one flat
/// pair-set at the same destination (flat-vs-split), or creates a destination inner block
/// and enqueues one job per quadrant, joined by a [`JoinState`].
#[allow(clippy::too_many_arguments)]
fn recurse<'a, T, S>(
    pair_set: Vec<PairEntry<T>>,
    dest: Rc<dyn BlockContainer<T>>,
    dest_position: Position,
    dest_offset: Offset,
    dest_shape: Shape,
    semiring: &'a S,
    config: &'a Config,
    exec: &DirectExecutor<'a>,
    err: ErrSlot,
    on_done: OnDone<'a>,
) where
    T: Copy + 'a,
    S: Semiring<T> + 'a,
{
    let mut children: [Vec<PairEntry<T>>; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
    let mut max_child_bit = 0;

    for pair in &pair_set {
        let (a_quads, a_shapes, new_a_bit) = quads(&pair.a, pair.a_shape, pair.a_disc_bit);
        let (b_quads, b_shapes, new_b_bit) = quads(&pair.b, pair.b_shape, pair.b_disc_bit);
        max_child_bit = max_child_bit.max(new_a_bit).max(new_b_bit);

        for (k, contribs) in CONTRIB.iter().enumerate() {
            for &(ai, bi) in contribs {
                let (a_node, b_node) = (a_quads[ai].clone(), b_quads[bi].clone());
                if a_node.is_empty() || b_node.is_empty() {
                    continue;
                }
                children[k].push(PairEntry {
                    a: a_node,
                    b: b_node,
                    a_shape: a_shapes[ai],
                    b_shape: b_shapes[bi],
                    a_disc_bit: new_a_bit,
                    b_disc_bit: new_b_bit,
                });
            }
        }
    }

    // Flat-vs-split: if the inputs are subdivided past the point the destination tree is,
    // don't create an inner block here — fold all four child pair-sets back into one and
    // keep recursing at the *same* destination slot (§4.7.1). Still one job, just enqueued
    // rather than called, so it takes its turn through the shared priority queue.
    if max_child_bit >= dest.discriminating_bit() {
        let flat: Vec<PairEntry<T>> = children.into_iter().flatten().collect();
        let priority = destination_priority(dest_offset.row_offset, dest_offset.col_offset);
        exec.enqueue(priority, move |exec| {
            run(flat, dest, dest_position, dest_offset, dest_shape, semiring, config, true, exec, err, on_done);
        });
        return;
    }

    let inner = match dest.create_inner(dest_position) {
        Ok(inner) => inner,
        Err(e) => {
            record_error(&err, MultiplyError::InvariantViolation { detail: e.to_string() });
            on_done(exec);
            return;
        }
    };

    let join = Rc::new(JoinState {
        remaining: Cell::new(4usize),
        inner: inner.clone(),
        parent_dest: dest.clone(),
        parent_position: dest_position,
        on_done: RefCell::new(Some(on_done)),
    });

    for (k, pos) in Position::ALL.into_iter().enumerate() {
        let child_offset = geometry::child_offset(pos, dest.discriminating_bit(), dest_offset);
        let child_shape = geometry::child_shape(pos, dest.discriminating_bit(), dest_shape);
        let taken = std::mem::take(&mut children[k]);
        let inner_dyn: Rc<dyn BlockContainer<T>> = inner.clone();
        let join_for_job = join.clone();
        let err_for_job = err.clone();
        let priority = destination_priority(child_offset.row_offset, child_offset.col_offset);
        exec.enqueue(priority, move |exec| {
            let join_for_done = join_for_job.clone();
            run(
                taken,
                inner_dyn,
                pos,
                child_offset,
                child_shape,
                semiring,
                config,
                true,
                exec,
                err_for_job,
                Box::new(move |exec| join_for_done.child_done(exec)),
            );
        });
    }
}

fn leaf16_view<T>(l: &Leaf16<T>) -> &dyn LeafView<T, i16> {
    match l {
        Leaf16::Dcsc(r) => r.as_ref(),
        Leaf16::Shadow16(r) => r.as_ref(),
        Leaf16::Shadow32(r) => r.as_ref(),
        Leaf16::Shadow64(r) => r.as_ref(),
    }
}

fn leaf32_view<T>(l: &Leaf32<T>) -> &dyn LeafView<T, i32> {
    match l {
        Leaf32::Dcsc(r) => r.as_ref(),
        Leaf32::Shadow32(r) => r.as_ref(),
        Leaf32::Shadow64(r) => r.as_ref(),
    }
}

fn leaf64_view<T>(l: &Leaf64<T>) -> &dyn LeafView<T, i64> {
    match l {
        Leaf64::Dcsc(r) => r.as_ref(),
        Leaf64::Shadow64(r) => r.as_ref(),
    }
}

fn multiply_pair<T, RetIT, S>(a: &Leaf<T>, b: &Leaf<T>, dest_shape: Shape, use_dense: bool, semiring: &S) -> DcscLeaf<T, RetIT>
where
    T: Copy,
    RetIT: LeafIndex,
    S: Semiring<T>,
{
    match (a, b) {
        (Leaf::W16(la), Leaf::W16(lb)) => multiply_leaves(leaf16_view(la), leaf16_view(lb), dest_shape, use_dense, semiring),
        (Leaf::W16(la), Leaf::W32(lb)) => multiply_leaves(leaf16_view(la), leaf32_view(lb), dest_shape, use_dense, semiring),
        (Leaf::W16(la), Leaf::W64(lb)) => multiply_leaves(leaf16_view(la), leaf64_view(lb), dest_shape, use_dense, semiring),
        (Leaf::W32(la), Leaf::W16(lb)) => multiply_leaves(leaf32_view(la), leaf16_view(lb), dest_shape, use_dense, semiring),
        (Leaf::W32(la), Leaf::W32(lb)) => multiply_leaves(leaf32_view(la), leaf32_view(lb), dest_shape, use_dense, semiring),
        (Leaf::W32(la), Leaf::W64(lb)) => multiply_leaves(leaf32_view(la), leaf64_view(lb), dest_shape, use_dense, semiring),
        (Leaf::W64(la), Leaf::W16(lb)) => multiply_leaves(leaf64_view(la), leaf16_view(lb), dest_shape, use_dense, semiring),
        (Leaf::W64(la), Leaf::W32(lb)) => multiply_leaves(leaf64_view(la), leaf32_view(lb), dest_shape, use_dense, semiring),
        (Leaf::W64(la), Leaf::W64(lb)) => multiply_leaves(leaf64_view(la), leaf64_view(lb), dest_shape, use_dense, semiring),
    }
}

fn multiply_leaves_job<T, S>(
    pairs: &[PairEntry<T>],
    dest: &dyn BlockContainer<T>,
    dest_position: Position,
    dest_shape: Shape,
    semiring: &S,
    config: &Config,
) -> Result<(), MultiplyError>
where
    T: Copy,
    S: Semiring<T>,
{
    for p in pairs {
        if !p.a.is_leaf() || !p.b.is_leaf() {
            return Err(MultiplyError::InvariantViolation {
                detail: "multiply_leaves_job received a non-leaf pair".into(),
            });
        }
    }

    let use_dense = config.should_use_dense_spa::<T>(dest_shape.nrows as usize);
    let node = match IndexWidth::for_shape(dest_shape) {
        IndexWidth::W16 => build_result_leaf::<T, i16, S>(pairs, dest_shape, use_dense, semiring, Leaf16::Dcsc, Leaf::W16),
        IndexWidth::W32 => build_result_leaf::<T, i32, S>(pairs, dest_shape, use_dense, semiring, Leaf32::Dcsc, Leaf::W32),
        IndexWidth::W64 => build_result_leaf::<T, i64, S>(pairs, dest_shape, use_dense, semiring, Leaf64::Dcsc, Leaf::W64),
    };
    dest.set_child(dest_position, node);
    Ok(())
}

fn build_result_leaf<T, RetIT, S>(
    pairs: &[PairEntry<T>],
    dest_shape: Shape,
    use_dense: bool,
    semiring: &S,
    wrap_category: impl Fn(Rc<DcscLeaf<T, RetIT>>) -> CategoryFor<RetIT, T>,
    wrap_leaf: impl Fn(CategoryFor<RetIT, T>) -> Leaf<T>,
) -> Node<T>
where
    T: Copy,
    RetIT: LeafIndex,
    S: Semiring<T>,
{
    let partials: Vec<Rc<DcscLeaf<T, RetIT>>> = pairs
        .iter()
        .map(|p| Rc::new(multiply_pair::<T, RetIT, S>(p.a.as_leaf().unwrap(), p.b.as_leaf().unwrap(), dest_shape, use_dense, semiring)))
        .collect();
    let result = accumulator::accumulate(partials, dest_shape.nrows as usize, use_dense, semiring);
    if result.nnn() > 0 {
        Node::Leaf(wrap_leaf(wrap_category(Rc::new(result))))
    } else {
        Node::Empty
    }
}

/// Selects which leaf-category enum (`Leaf16`/`Leaf32`/`Leaf64`) a given `RetIT` belongs
/// to, purely so [`build_result_leaf`] can stay generic over the three index widths.
trait CategoryOf<T> {
    type Category;
}
impl<T> CategoryOf<T> for i16 {
    type Category = Leaf16<T>;
}
impl<T> CategoryOf<T> for i32 {
    type Category = Leaf32<T>;
}
impl<T> CategoryOf<T> for i64 {
    type Category = Leaf64<T>;
}
type CategoryFor<IT, T> = <IT as CategoryOf<T>>::Category;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::dcsc::DcscFactory;
    use crate::semiring::PlusTimes;
    use crate::spa::{DenseSpa, SpaLike};

    fn identity_node(n: i64) -> Node<f64> {
        let mut f: DcscFactory<f64, i16> = DcscFactory::new(Shape::new(n, n));
        let sr = PlusTimes;
        for c in 0..n {
            let mut spa = DenseSpa::<f64>::new(n as usize);
            spa.scatter_add(&[c], &[1.0], &sr);
            f.add_column_from_spa(c as i16, &mut spa);
        }
        Node::Leaf(Leaf::W16(Leaf16::Dcsc(Rc::new(f.finish()))))
    }

    fn nnz_count(node: &Node<f64>) -> usize {
        node.nnn()
    }

    #[test]
    fn identity_times_identity_is_identity() {
        let shape = Shape::new(4, 4);
        let a = identity_node(4);
        let b = identity_node(4);
        let cfg = Config::default();
        let sr = PlusTimes;
        let (result, result_shape) = multiply(a, shape, b, shape, &sr, &cfg).unwrap();
        assert_eq!(result_shape, shape);
        assert_eq!(nnz_count(&result), 4);
    }

    #[test]
    fn empty_times_anything_is_empty() {
        let shape = Shape::new(4, 4);
        let cfg = Config::default();
        let sr = PlusTimes;
        let (result, _) = multiply(Node::<f64>::Empty, shape, identity_node(4), shape, &sr, &cfg).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let cfg = Config::default();
        let sr = PlusTimes;
        let err = multiply(identity_node(4), Shape::new(4, 4), identity_node(3), Shape::new(3, 3), &sr, &cfg).unwrap_err();
        assert!(matches!(err, MultiplyError::DimensionMismatch { .. }));
    }

    #[test]
    fn forced_subdivision_still_yields_identity() {
        let shape = Shape::new(4, 4);
        let a = identity_node(4);
        let b = identity_node(4);
        let mut cfg = Config::default();
        cfg.leaf_split_threshold = 1;
        let sr = PlusTimes;
        let (result, _) = multiply(a, shape, b, shape, &sr, &cfg).unwrap();
        assert_eq!(nnz_count(&result), 4);
    }

    #[test]
    fn all_ones_4x4_squared_scales_by_n() {
        let shape = Shape::new(4, 4);
        let mut f: DcscFactory<f64, i16> = DcscFactory::new(shape);
        let sr = PlusTimes;
        for c in 0..4i16 {
            let mut spa = DenseSpa::<f64>::new(4);
            spa.scatter_add(&[0, 1, 2, 3], &[1.0, 1.0, 1.0, 1.0], &sr);
            f.add_column_from_spa(c, &mut spa);
        }
        let a = Node::Leaf(Leaf::W16(Leaf16::Dcsc(Rc::new(f.finish()))));
        let b = a.clone();
        let cfg = Config::default();
        let (result, _) = multiply(a, shape, b, shape, &sr, &cfg).unwrap();
        assert_eq!(nnz_count(&result), 16);
    }
}
