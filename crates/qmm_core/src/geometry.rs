//! Dimension and position arithmetic: [`Index`], [`Shape`], [`Offset`], and the
//! discriminating-bit helpers the whole quadtree geometry is built from.

/// Absolute row/column coordinate, or a discriminating bit. Signed so that
/// differences and sentinel values (`-1`) stay representable.
pub type Index = i64;

/// Count of nonzeros stored in a single leaf.
pub type BlockNnz = i32;

/// Dimensions of a block: `{nrows, ncols}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub nrows: Index,
    pub ncols: Index,
}

impl Shape {
    pub fn new(nrows: Index, ncols: Index) -> Self {
        Self { nrows, ncols }
    }

    pub fn is_positive(&self) -> bool {
        self.nrows > 0 && self.ncols > 0
    }

    pub fn max_dim(&self) -> Index {
        self.nrows.max(self.ncols)
    }
}

/// Absolute position of a block's `(0, 0)` within the enclosing matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offset {
    pub row_offset: Index,
    pub col_offset: Index,
}

impl Offset {
    pub const ZERO: Offset = Offset {
        row_offset: 0,
        col_offset: 0,
    };

    pub fn new(row_offset: Index, col_offset: Index) -> Self {
        Self {
            row_offset,
            col_offset,
        }
    }
}

/// One of the four quadrants of a 2x2 block split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Nw = 0,
    Ne = 1,
    Sw = 2,
    Se = 3,
}

impl Position {
    pub const ALL: [Position; 4] = [Position::Nw, Position::Ne, Position::Sw, Position::Se];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Smallest power-of-two `d` such that `d >= max(shape.nrows, shape.ncols) / 2`-ish: the
/// discriminating bit for a block of this shape, i.e. `2^ceil(log2(max_dim)) / 2`, clamped
/// to at least `1`. This is the bit that both axes are split against.
pub fn discriminating_bit(shape: Shape) -> Index {
    let max_dim = shape.max_dim().max(1);
    if max_dim <= 1 {
        return 1;
    }
    // smallest power of two >= max_dim
    let mut p: Index = 1;
    while p < max_dim {
        p <<= 1;
    }
    // d is half of that power of two, i.e. the bit that splits [0, p) into two halves
    (p >> 1).max(1)
}

/// Offsets of the child at `pos`, given the parent's own offset and discriminating bit.
/// Uses the OR formulation exclusively (see DESIGN.md open question 1): ORing `d` into an
/// offset whose bits below `d` are already zero is equivalent to adding `d`, and is the
/// formulation consistent with the recursive geometry.
pub fn child_offset(pos: Position, disc_bit: Index, parent_offset: Offset) -> Offset {
    match pos {
        Position::Nw => parent_offset,
        Position::Ne => Offset::new(parent_offset.row_offset, parent_offset.col_offset | disc_bit),
        Position::Sw => Offset::new(parent_offset.row_offset | disc_bit, parent_offset.col_offset),
        Position::Se => Offset::new(
            parent_offset.row_offset | disc_bit,
            parent_offset.col_offset | disc_bit,
        ),
    }
}

/// Shape of the child at `pos`, given the parent's shape and discriminating bit.
pub fn child_shape(pos: Position, disc_bit: Index, parent_shape: Shape) -> Shape {
    let nw_rows = disc_bit.min(parent_shape.nrows);
    let nw_cols = disc_bit.min(parent_shape.ncols);
    match pos {
        Position::Nw => Shape::new(nw_rows, nw_cols),
        Position::Ne => Shape::new(nw_rows, parent_shape.ncols - nw_cols),
        Position::Sw => Shape::new(parent_shape.nrows - nw_rows, nw_cols),
        Position::Se => Shape::new(parent_shape.nrows - nw_rows, parent_shape.ncols - nw_cols),
    }
}

/// `true` iff `d` has exactly one bit set (and is positive).
pub fn is_single_bit(d: Index) -> bool {
    d > 0 && (d & (d - 1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminating_bit_power_of_two() {
        for max_dim in 1..2000 {
            let d = discriminating_bit(Shape::new(max_dim, 1));
            assert!(is_single_bit(d), "d={d} for max_dim={max_dim}");
        }
    }

    #[test]
    fn child_shapes_partition_parent() {
        let shape = Shape::new(10, 7);
        let d = discriminating_bit(shape);
        let nw = child_shape(Position::Nw, d, shape);
        let ne = child_shape(Position::Ne, d, shape);
        let sw = child_shape(Position::Sw, d, shape);
        let se = child_shape(Position::Se, d, shape);
        assert_eq!(nw.nrows + sw.nrows, shape.nrows);
        assert_eq!(ne.nrows + se.nrows, shape.nrows);
        assert_eq!(nw.ncols + ne.ncols, shape.ncols);
        assert_eq!(sw.ncols + se.ncols, shape.ncols);
    }

    #[test]
    fn child_offsets_use_or() {
        let parent = Offset::new(8, 16);
        let d = 4;
        assert_eq!(child_offset(Position::Nw, d, parent), parent);
        assert_eq!(child_offset(Position::Ne, d, parent).col_offset, 16 | 4);
        assert_eq!(child_offset(Position::Sw, d, parent).row_offset, 8 | 4);
        let se = child_offset(Position::Se, d, parent);
        assert_eq!(se.row_offset, 8 | 4);
        assert_eq!(se.col_offset, 16 | 4);
    }
}
