//! Inner block / block container (C7): the 2x2 child array plus discriminating-bit
//! geometry, and the root container that makes the tree's root behave as a synthetic NW
//! quadrant of a virtual parent.

use crate::geometry::{self, Offset, Position, Shape};
use crate::node::Node;
use std::cell::RefCell;
use std::rc::Rc;

/// A 2x2 split: owns four children, indexed by [`Position`], plus the single-bit
/// `discriminating_bit` both axes are split against.
///
/// Children live behind `RefCell` because a freshly created inner block is installed and
/// returned to its caller (`CreateInner`) *before* its four slots are filled in during the
/// same synchronous recursive pass (§3 "Lifecycle").
pub struct InnerBlock<T> {
    discriminating_bit: geometry::Index,
    children: [RefCell<Node<T>>; 4],
}

impl<T> InnerBlock<T> {
    pub fn new(discriminating_bit: geometry::Index) -> Result<Self, BlockError> {
        if !geometry::is_single_bit(discriminating_bit) {
            return Err(BlockError::BadDiscriminatingBit { bit: discriminating_bit });
        }
        Ok(Self {
            discriminating_bit,
            children: [
                RefCell::new(Node::Empty),
                RefCell::new(Node::Empty),
                RefCell::new(Node::Empty),
                RefCell::new(Node::Empty),
            ],
        })
    }

    pub fn discriminating_bit(&self) -> geometry::Index {
        self.discriminating_bit
    }

    pub fn child(&self, idx: usize) -> Node<T>
    where
        T: Clone,
    {
        self.children[idx].borrow().clone()
    }

    pub fn set_child(&self, idx: usize, node: Node<T>) {
        *self.children[idx].borrow_mut() = node;
    }

    /// All four slots ended up empty after a recursive fill — used by the multiply
    /// driver's cleanup step to collapse a just-created inner block back to `Empty`.
    pub fn all_children_empty(&self) -> bool {
        (0..4).all(|i| self.children[i].borrow().is_empty())
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("discriminating bit {bit} is not a single power-of-two bit")]
    BadDiscriminatingBit { bit: geometry::Index },
}

/// Shared geometry/child-access surface for anything that can host four quadrant
/// children: a plain [`InnerBlock`], or the synthetic [`RootContainer`].
pub trait BlockContainer<T> {
    fn discriminating_bit(&self) -> geometry::Index;

    fn child_offset(&self, pos: Position, my_offset: Offset) -> Offset {
        geometry::child_offset(pos, self.discriminating_bit(), my_offset)
    }

    fn child_shape(&self, pos: Position, my_shape: Shape) -> Shape {
        geometry::child_shape(pos, self.discriminating_bit(), my_shape)
    }

    fn child(&self, pos: Position) -> Node<T>
    where
        T: Clone;

    fn set_child(&self, pos: Position, node: Node<T>);

    /// Installs (or replaces) a freshly allocated inner child at `pos`, with the halved
    /// discriminating bit, and returns it.
    fn create_inner(&self, pos: Position) -> Result<Rc<InnerBlock<T>>, BlockError>
    where
        T: Clone,
    {
        let child_bit = self.discriminating_bit() >> 1;
        let inner = Rc::new(InnerBlock::new(child_bit)?);
        self.set_child(pos, Node::Inner(inner.clone()));
        Ok(inner)
    }
}

impl<T> BlockContainer<T> for InnerBlock<T> {
    fn discriminating_bit(&self) -> geometry::Index {
        self.discriminating_bit
    }

    fn child(&self, pos: Position) -> Node<T>
    where
        T: Clone,
    {
        InnerBlock::child(self, pos.index())
    }

    fn set_child(&self, pos: Position, node: Node<T>) {
        InnerBlock::set_child(self, pos.index(), node)
    }
}

/// The matrix root: owns a single child and reports a discriminating bit one step above
/// what `shape` alone would suggest, so the root behaves as a synthetic NW quadrant of a
/// virtual parent (§4.3). All four `Position`s collapse onto the same one child.
pub struct RootContainer<T> {
    shape: Shape,
    discriminating_bit: geometry::Index,
    root: RefCell<Node<T>>,
}

impl<T> RootContainer<T> {
    pub fn new(shape: Shape) -> Self {
        let natural_bit = geometry::discriminating_bit(shape);
        Self {
            shape,
            discriminating_bit: natural_bit << 1,
            root: RefCell::new(Node::Empty),
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn root(&self) -> Node<T>
    where
        T: Clone,
    {
        self.root.borrow().clone()
    }

    pub fn set_root(&self, node: Node<T>) {
        *self.root.borrow_mut() = node;
    }
}

impl<T> BlockContainer<T> for RootContainer<T> {
    fn discriminating_bit(&self) -> geometry::Index {
        self.discriminating_bit
    }

    fn child(&self, _pos: Position) -> Node<T>
    where
        T: Clone,
    {
        self.root()
    }

    fn set_child(&self, _pos: Position, node: Node<T>) {
        self.set_root(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_bit() {
        let err = InnerBlock::<f64>::new(3).unwrap_err();
        assert_eq!(err, BlockError::BadDiscriminatingBit { bit: 3 });
    }

    #[test]
    fn create_inner_halves_bit_and_installs_child() {
        let block: InnerBlock<f64> = InnerBlock::new(8).unwrap();
        let inner = block.create_inner(Position::Ne).unwrap();
        assert_eq!(inner.discriminating_bit(), 4);
        assert!(matches!(
            BlockContainer::child(&block, Position::Ne),
            Node::Inner(_)
        ));
        assert!(matches!(
            BlockContainer::child(&block, Position::Nw),
            Node::Empty
        ));
    }

    #[test]
    fn all_children_empty_after_fresh_construction() {
        let block: InnerBlock<f64> = InnerBlock::new(8).unwrap();
        assert!(block.all_children_empty());
    }

    #[test]
    fn root_container_collapses_positions_to_one_child() {
        let root: RootContainer<f64> = RootContainer::new(Shape::new(10, 10));
        assert!(root.discriminating_bit() > geometry::discriminating_bit(Shape::new(10, 10)));
        root.set_child(Position::Se, Node::Future);
        assert!(BlockContainer::child(&root, Position::Nw).is_future());
    }
}
