//! Pretty-printing utilities: a coarse ASCII density "spy plot" and a structural tree-dump
//! for debugging, in the same plain-formatted-text style as the rest of this crate's
//! demo/diagnostic printing — no rendering dependency.

use crate::block::BlockContainer;
use crate::geometry::{Index, Position, Shape};
use crate::node::Node;

/// Upper bound on the spy plot's grid in either dimension (§6: "bucketed into at most
/// 64x64 cells").
pub const MAX_SPY_CELLS: usize = 64;

const RAMP: [char; 5] = ['.', ':', '+', '*', '#'];

/// Renders a density plot over `shape`, bucketing `tuples` into at most [`MAX_SPY_CELLS`]
/// rows and columns and shading each cell by how many nonzeros land in it relative to the
/// densest cell.
pub fn spy_plot<T>(shape: Shape, tuples: impl Iterator<Item = (Index, Index, T)>) -> String {
    let rows = shape.nrows.max(1) as usize;
    let cols = shape.ncols.max(1) as usize;
    let cell_rows = rows.min(MAX_SPY_CELLS);
    let cell_cols = cols.min(MAX_SPY_CELLS);

    let mut counts = vec![0u32; cell_rows * cell_cols];
    for (r, c, _) in tuples {
        let cr = (r.max(0) as usize * cell_rows / rows).min(cell_rows - 1);
        let cc = (c.max(0) as usize * cell_cols / cols).min(cell_cols - 1);
        counts[cr * cell_cols + cc] += 1;
    }

    let max_count = counts.iter().copied().max().unwrap_or(0);
    let mut out = String::with_capacity((cell_cols + 1) * cell_rows);
    for cr in 0..cell_rows {
        for &c in &counts[cr * cell_cols..(cr + 1) * cell_cols] {
            let level = if c == 0 || max_count == 0 {
                0
            } else {
                1 + ((c as u64 * (RAMP.len() as u64 - 2)) / max_count as u64) as usize
            };
            out.push(RAMP[level]);
        }
        out.push('\n');
    }
    out
}

/// Renders the quadtree's structure: one line per node, indented by depth, naming the
/// node kind, its shape, and (for leaves) its nonzero count.
pub fn dump_tree<T: Copy>(node: &Node<T>, shape: Shape) -> String {
    let mut out = String::new();
    dump_node(node, shape, 0, &mut out);
    out
}

fn dump_node<T: Copy>(node: &Node<T>, shape: Shape, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Empty => out.push_str(&format!("{indent}Empty {}x{}\n", shape.nrows, shape.ncols)),
        Node::Future => out.push_str(&format!("{indent}Future {}x{}\n", shape.nrows, shape.ncols)),
        Node::Leaf(leaf) => out.push_str(&format!(
            "{indent}Leaf {}x{} nnn={}\n",
            shape.nrows,
            shape.ncols,
            leaf.nnn()
        )),
        Node::Inner(inner) => {
            out.push_str(&format!(
                "{indent}Inner {}x{} bit={}\n",
                shape.nrows,
                shape.ncols,
                inner.discriminating_bit()
            ));
            for pos in Position::ALL {
                let child = BlockContainer::child(inner.as_ref(), pos);
                let child_shape = inner.as_ref().child_shape(pos, shape);
                dump_node(&child, child_shape, depth + 1, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spy_plot_of_empty_matrix_is_all_dots() {
        let plot = spy_plot::<f64>(Shape::new(4, 4), std::iter::empty());
        assert!(plot.chars().all(|c| c == '.' || c == '\n'));
    }

    #[test]
    fn spy_plot_marks_the_only_nonzero_cell() {
        let plot = spy_plot(Shape::new(2, 2), std::iter::once((0i64, 0i64, 1.0)));
        let lines: Vec<&str> = plot.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_ne!(lines[0].chars().next().unwrap(), '.');
    }

    #[test]
    fn dump_tree_of_empty_node_is_one_line() {
        let n: Node<f64> = Node::Empty;
        let dump = dump_tree(&n, Shape::new(4, 4));
        assert_eq!(dump.lines().count(), 1);
        assert!(dump.contains("Empty"));
    }
}
