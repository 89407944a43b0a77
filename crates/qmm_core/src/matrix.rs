//! `Matrix<T>` (§6): the public, owned handle around a tree root plus its shape. Everything
//! else in this crate operates on bare `Node<T>`/`Shape` pairs; this is the one type callers
//! are meant to hold onto, the same way a top-level simulation config wraps an internal
//! graph behind one named handle.

use crate::config::Config;
use crate::error::MultiplyError;
use crate::geometry::{Index, Offset, Shape};
use crate::leaf::triples::TriplesLeaf;
use crate::multiply;
use crate::node::Node;
use crate::semiring::Semiring;
use crate::subdivide::build_quadtree;
use crate::tuple_stream::TupleStream;

/// An immutable sparse matrix: a quadtree `root` over `shape`. Constructed via
/// [`Matrix::from_tuples`] or [`Matrix::identity`]; multiplied via [`multiply_matrices`].
pub struct Matrix<T> {
    shape: Shape,
    root: Node<T>,
}

impl<T: Copy> Matrix<T> {
    /// The empty matrix of the given shape.
    pub fn empty(shape: Shape) -> Self {
        Self {
            shape,
            root: Node::Empty,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Total nonzero count, computed by walking every leaf (§6: "O(number-of-leaves)").
    pub fn nnn(&self) -> usize {
        self.root.nnn()
    }

    /// Builds a matrix from an unordered, single-pass `(row, col, value)` stream. Duplicate
    /// `(row, col)` keys are resolved by keeping the last value seen.
    pub fn from_tuples<I>(shape: Shape, nnn_hint: usize, stream: I, config: &Config) -> Self
    where
        I: TupleStream<T>,
    {
        let mut triples: TriplesLeaf<T> = TriplesLeaf::with_capacity(nnn_hint);
        for (row, col, value) in stream {
            triples.push(row, col, value);
        }
        let mut perm: Vec<usize> = (0..triples.len()).collect();
        let root = build_quadtree(&triples, &mut perm, shape, Offset::ZERO, config, &|_prev, next| next);
        Self { shape, root }
    }

    /// The `n x n` identity matrix, using `one` as the diagonal value — callers name the
    /// multiplicative unit explicitly since `T` carries no canonical "1" of its own.
    pub fn identity(n: Index, one: T) -> Self {
        let shape = Shape::new(n, n);
        let config = Config::default();
        let tuples: Vec<(Index, Index, T)> = (0..n).map(|i| (i, i, one)).collect();
        Self::from_tuples(shape, tuples.len(), tuples.into_iter(), &config)
    }

    /// Dumps every stored `(row, col, value)` triple, in the leaf traversal's natural
    /// (column-major per leaf) order — the inverse of [`Matrix::from_tuples`], used for
    /// round-tripping and for `qmm-mtx`'s writer.
    pub fn dump_tuples(&self) -> Vec<(Index, Index, T)> {
        dump_node(&self.root)
    }

    pub(crate) fn into_parts(self) -> (Node<T>, Shape) {
        (self.root, self.shape)
    }

    pub(crate) fn from_parts(root: Node<T>, shape: Shape) -> Self {
        Self { shape, root }
    }
}

fn dump_node<T: Copy>(node: &Node<T>) -> Vec<(Index, Index, T)> {
    let mut out = Vec::new();
    dump_node_into(node, 0, 0, &mut out);
    out
}

fn dump_node_into<T: Copy>(node: &Node<T>, row_offset: Index, col_offset: Index, out: &mut Vec<(Index, Index, T)>) {
    match node {
        Node::Empty | Node::Future => {}
        Node::Inner(inner) => {
            use crate::block::BlockContainer;
            use crate::geometry::Position;
            for pos in Position::ALL {
                let child_offset = inner.as_ref().child_offset(pos, Offset::new(row_offset, col_offset));
                let child = BlockContainer::child(inner.as_ref(), pos);
                dump_node_into(&child, child_offset.row_offset, child_offset.col_offset, out);
            }
        }
        Node::Leaf(leaf) => {
            for (r, c, v) in leaf.tuples() {
                out.push((r + row_offset, c + col_offset, v));
            }
        }
    }
}

/// `c = a * b` under `semiring` (§6 `multiply`): the public, `Matrix`-typed entry point
/// wrapping the node-level driver.
pub fn multiply_matrices<T, S>(a: &Matrix<T>, b: &Matrix<T>, semiring: &S, config: &Config) -> Result<Matrix<T>, MultiplyError>
where
    T: Copy,
    S: Semiring<T>,
{
    let (root, shape) = multiply::multiply(a.root.clone(), a.shape, b.root.clone(), b.shape, semiring, config)?;
    Ok(Matrix::from_parts(root, shape))
}
