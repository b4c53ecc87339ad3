//! Assigns positions and sizes to imported nodes.
//!
//! Children are placed relative to their parent, in rows of at most
//! [LayoutOptions::max_columns]. A parent can only be sized once all of its
//! children are, so nodes are processed in post-order.
use std::collections::HashMap;

use crate::graph::{Node, Position, Size};

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutOptions {
    pub max_columns: usize,
    /// Gap left of every child, between rows, and after the last row and
    /// column.
    pub padding: f64,
    /// Gap above the first row, leaves room for the group's header.
    pub first_row_padding: f64,
    /// Size of nodes without children.
    pub default_size: Size,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            max_columns: 2,
            padding: 30.0,
            first_row_padding: 55.0,
            default_size: Size {
                width: 150.0,
                height: 54.0,
            },
        }
    }
}

/// Lays out all nodes in place. Nodes whose parent isn't part of `nodes` are
/// treated as top-level and placed at the origin.
pub fn layout(nodes: &mut [Node], options: &LayoutOptions) {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut top_level = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        match node.parent_id.as_deref().and_then(|p| index.get(p)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => top_level.push(i),
        }
    }

    let mut positions = vec![Position::default(); nodes.len()];
    let mut sizes = vec![options.default_size; nodes.len()];

    for i in post_order(&top_level, &children) {
        if children[i].is_empty() {
            continue;
        }
        sizes[i] = place_children(&children[i], &mut positions, &sizes, options);
    }

    for (i, node) in nodes.iter_mut().enumerate() {
        node.position = positions[i];
        node.size = sizes[i];
    }
}

fn post_order(top_level: &[usize], children: &[Vec<usize>]) -> Vec<usize> {
    let mut order = Vec::with_capacity(children.len());
    let mut stack: Vec<(usize, bool)> = top_level.iter().rev().map(|&i| (i, false)).collect();

    while let Some((i, expanded)) = stack.pop() {
        if expanded {
            order.push(i);
        } else {
            stack.push((i, true));
            stack.extend(children[i].iter().rev().map(|&c| (c, false)));
        }
    }
    order
}

/// Positions the (already sized) children of one group and returns the
/// resulting group size.
fn place_children(
    group: &[usize],
    positions: &mut [Position],
    sizes: &[Size],
    options: &LayoutOptions,
) -> Size {
    let mut current_y = 0.0;

    for (row_index, row) in group.chunks(options.max_columns.max(1)).enumerate() {
        let row_height = row.iter().map(|&c| sizes[c].height).fold(0.0, f64::max);
        let y_padding = if row_index == 0 {
            options.first_row_padding
        } else {
            options.padding
        };

        let mut current_x = 0.0;
        for &c in row {
            positions[c] = Position {
                x: current_x + options.padding,
                y: current_y + y_padding,
            };
            current_x = positions[c].x + sizes[c].width;
        }
        current_y += y_padding + row_height;
    }

    let (width, height) = group.iter().fold((0.0, 0.0), |(w, h): (f64, f64), &c| {
        (
            w.max(positions[c].x + sizes[c].width),
            h.max(positions[c].y + sizes[c].height),
        )
    });

    Size {
        width: width + options.padding,
        height: height + options.padding,
    }
}
