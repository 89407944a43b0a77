//! The tagged-union tree node (C6): empty / future / inner / leaf-at-a-given-index-width.
//!
//! Node dispatch is exhaustive `match`, not trait objects — there are exactly four node
//! shapes and the recursion needs to pattern-match on combinations of them directly (see
//! `crate::multiply`), so a `dyn` leaf trait would just be matched right back apart again.

use crate::block::InnerBlock;
use crate::geometry::Shape;
use crate::leaf::dcsc::DcscLeaf;
use crate::leaf::shadow::ShadowLeaf;
use crate::leaf::{ColumnView, LeafView};
use std::rc::Rc;

/// A leaf whose own index width is `i16`: either native DCSC storage at that width, or a
/// shadow window narrowed down to `i16` over a base leaf of width 16, 32, or 64 (§3: "each
/// category is itself a union of `{DCSC, ShadowDCSC<16>, ShadowDCSC<32>, ShadowDCSC<64>}`").
pub enum Leaf16<T> {
    Dcsc(Rc<DcscLeaf<T, i16>>),
    Shadow16(Rc<ShadowLeaf<T, i16, i16>>),
    Shadow32(Rc<ShadowLeaf<T, i32, i16>>),
    Shadow64(Rc<ShadowLeaf<T, i64, i16>>),
}

pub enum Leaf32<T> {
    Dcsc(Rc<DcscLeaf<T, i32>>),
    Shadow32(Rc<ShadowLeaf<T, i32, i32>>),
    Shadow64(Rc<ShadowLeaf<T, i64, i32>>),
}

pub enum Leaf64<T> {
    Dcsc(Rc<DcscLeaf<T, i64>>),
    Shadow64(Rc<ShadowLeaf<T, i64, i64>>),
}

macro_rules! impl_leaf_category {
    ($name:ident, $it:ty, [$($variant:ident),+]) => {
        impl<T> $name<T> {
            pub fn shape(&self) -> Shape {
                match self {
                    $(Self::$variant(l) => l.shape(),)+
                }
            }

            pub fn nnn(&self) -> usize {
                match self {
                    $(Self::$variant(l) => l.nnn(),)+
                }
            }

            pub fn get_column(&self, col: $it) -> Option<ColumnView<'_, T, $it>> {
                match self {
                    $(Self::$variant(l) => l.get_column(col),)+
                }
            }

            pub fn columns(&self) -> Box<dyn Iterator<Item = ColumnView<'_, T, $it>> + '_> {
                match self {
                    $(Self::$variant(l) => l.columns(),)+
                }
            }

            pub fn tuples(&self) -> Box<dyn Iterator<Item = ($it, $it, T)> + '_>
            where
                T: Copy,
            {
                match self {
                    $(Self::$variant(l) => l.tuples(),)+
                }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                match self {
                    $(Self::$variant(l) => Self::$variant(l.clone()),)+
                }
            }
        }
    };
}

impl_leaf_category!(Leaf16, i16, [Dcsc, Shadow16, Shadow32, Shadow64]);
impl_leaf_category!(Leaf32, i32, [Dcsc, Shadow32, Shadow64]);
impl_leaf_category!(Leaf64, i64, [Dcsc, Shadow64]);

/// Any stored leaf, regardless of its own index width.
#[derive(Clone)]
pub enum Leaf<T> {
    W16(Leaf16<T>),
    W32(Leaf32<T>),
    W64(Leaf64<T>),
}

impl<T> Leaf<T> {
    pub fn shape(&self) -> Shape {
        match self {
            Leaf::W16(l) => l.shape(),
            Leaf::W32(l) => l.shape(),
            Leaf::W64(l) => l.shape(),
        }
    }

    pub fn nnn(&self) -> usize {
        match self {
            Leaf::W16(l) => l.nnn(),
            Leaf::W32(l) => l.nnn(),
            Leaf::W64(l) => l.nnn(),
        }
    }

    /// Full `(row, col, value)` tuple iteration, widened uniformly to [`crate::geometry::Index`]
    /// regardless of the leaf's own storage width.
    pub fn tuples(&self) -> Box<dyn Iterator<Item = (crate::geometry::Index, crate::geometry::Index, T)> + '_>
    where
        T: Copy,
    {
        use crate::width::LeafIndex;
        match self {
            Leaf::W16(l) => Box::new(l.tuples().map(|(r, c, v)| (r.to_index(), c.to_index(), v))),
            Leaf::W32(l) => Box::new(l.tuples().map(|(r, c, v)| (r.to_index(), c.to_index(), v))),
            Leaf::W64(l) => Box::new(l.tuples().map(|(r, c, v)| (r.to_index(), c.to_index(), v))),
        }
    }
}

/// A tree node: `Empty`, `Future` (an unsupported pending placeholder), an owning `Inner`
/// block, or a `Leaf` at whatever width it was built/narrowed to.
pub enum Node<T> {
    Empty,
    Future,
    Inner(Rc<InnerBlock<T>>),
    Leaf(Leaf<T>),
}

impl<T: Clone> Clone for Node<T> {
    fn clone(&self) -> Self {
        match self {
            Node::Empty => Node::Empty,
            Node::Future => Node::Future,
            Node::Inner(b) => Node::Inner(b.clone()),
            Node::Leaf(l) => Node::Leaf(l.clone()),
        }
    }
}

impl<T: Clone> Node<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    pub fn is_future(&self) -> bool {
        matches!(self, Node::Future)
    }

    pub fn is_inner(&self) -> bool {
        matches!(self, Node::Inner(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn as_inner(&self) -> Option<&Rc<InnerBlock<T>>> {
        match self {
            Node::Inner(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf<T>> {
        match self {
            Node::Leaf(l) => Some(l),
            _ => None,
        }
    }

    pub fn nnn(&self) -> usize {
        match self {
            Node::Empty | Node::Future => 0,
            Node::Inner(b) => (0..4).map(|i| b.child(i).nnn()).sum(),
            Node::Leaf(l) => l.nnn(),
        }
    }
}
