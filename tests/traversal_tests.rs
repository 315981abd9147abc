//! Property tests for tree traversal, id indexing and variable scope.


use std::collections::HashSet;
use std::sync::Arc;

use bopline_bop::analysis::{
    get_evaluation_order, get_index, get_parent, get_shared_vars, get_spanned_variables,
};
use bopline_bop::traverse::{post_order, pre_order};
use bopline_bop::{BOp, BOpRef, PipelineOpBuilder};
use bopline_core::var::Var;
use proptest::prelude::*;
use test_data_gen::id;

#[derive(Debug, Clone)]
enum Shape {
    Leaf,
    Node(Vec<Shape>),
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    Just(Shape::Leaf).prop_recursive(5, 48, 3, |inner| {
        prop::collection::vec(inner, 1..=3).prop_map(Shape::Node)
    })
}

/// Build `shape` with ids assigned in pre-order starting at `*next`.
fn build(shape: &Shape, next: &mut u32) -> BOpRef {
    let my_id = *next;
    *next += 1;
    let mut builder = PipelineOpBuilder::new("Op", id(my_id));
    if let Shape::Node(children) = shape {
        for child in children {
            builder = builder.arg(build(child, next));
        }
    }
    builder.build()
}

fn node_count(shape: &Shape) -> usize {
    match shape {
        Shape::Leaf => 1,
        Shape::Node(children) => 1 + children.iter().map(node_count).sum::<usize>(),
    }
}

fn spine_len(shape: &Shape) -> usize {
    match shape {
        Shape::Node(children) => 1 + children.first().map_or(0, spine_len),
        Shape::Leaf => 1,
    }
}

fn var_pool() -> Vec<Var> {
    (0..6).map(|i| Var::named(&format!("tt_v{i}"))).collect()
}

fn op_over(vars: &[usize], bop_id: u32) -> BOpRef {
    let pool = var_pool();
    vars.iter()
        .filter_map(|&i| pool.get(i).copied())
        .fold(PipelineOpBuilder::new("Op", id(bop_id)), |b, v| b.arg(BOp::var(v)))
        .build()
}

proptest! {
    /// Pre- and post-order visit the same nodes, root first and last
    /// respectively.
    #[test]
    fn pre_and_post_order_agree(shape in shape_strategy()) {
        let root = build(&shape, &mut 1);
        let pre: Vec<_> = pre_order(&root).map(|n| n.id().unwrap()).collect();
        let mut post: Vec<_> = post_order(&root).map(|n| n.id().unwrap()).collect();

        prop_assert_eq!(pre.len(), node_count(&shape));
        prop_assert_eq!(pre.first().copied(), Some(id(1)));
        prop_assert_eq!(post.last().copied(), Some(id(1)));
        post.sort();
        let mut sorted_pre = pre.clone();
        sorted_pre.sort();
        prop_assert_eq!(sorted_pre, post);
    }

    /// Ids assigned in pre-order come back from the index in the same order.
    #[test]
    fn index_lists_ids_in_pre_order(shape in shape_strategy()) {
        let root = build(&shape, &mut 1);
        let index = get_index(&root).unwrap();
        let n = node_count(&shape);
        prop_assert_eq!(index.len(), n);
        let expected: Vec<_> = (1..=n as u32).map(id).collect();
        prop_assert_eq!(index.ids(), expected.as_slice());
        for (bop_id, op) in index.iter() {
            prop_assert_eq!(op.id().unwrap(), bop_id);
        }
    }

    /// Every non-root node's parent holds it as a direct argument.
    #[test]
    fn parent_holds_child(shape in shape_strategy()) {
        let root = build(&shape, &mut 1);
        for node in pre_order(&root).skip(1) {
            let parent = get_parent(&root, node).unwrap();
            prop_assert!(parent.args().iter().any(|a| Arc::ptr_eq(a, node)));
        }
        prop_assert!(get_parent(&root, &root).is_none());
    }

    /// The evaluation order walks the left spine bottom-up and ends at the root.
    #[test]
    fn evaluation_order_is_left_spine(shape in shape_strategy()) {
        let root = build(&shape, &mut 1);
        let order = get_evaluation_order(&root).unwrap();
        prop_assert_eq!(order.len(), spine_len(&shape));
        prop_assert_eq!(order.last().copied(), Some(id(1)));
        // the left spine gets consecutive pre-order ids
        let mut expected: Vec<_> = (1..=order.len() as u32).map(id).collect();
        expected.reverse();
        prop_assert_eq!(order, expected);
    }

    /// Shared variables are exactly the intersection of both scopes, in the
    /// second operator's first-seen order.
    #[test]
    fn shared_vars_is_intersection(
        p_vars in prop::collection::vec(0usize..6, 0..8),
        c_vars in prop::collection::vec(0usize..6, 0..8),
    ) {
        let p = op_over(&p_vars, 1);
        let c = op_over(&c_vars, 2);
        let shared = get_shared_vars(&p, &c);

        let pool = var_pool();
        let p_set: HashSet<usize> = p_vars.iter().copied().collect();
        let mut seen = HashSet::new();
        let expected: Vec<Var> = c_vars
            .iter()
            .copied()
            .filter(|i| p_set.contains(i) && seen.insert(*i))
            .map(|i| pool[i])
            .collect();
        prop_assert_eq!(&shared, &expected);
        prop_assert_eq!(get_spanned_variables(&p).count(), p_set.len());

        let unique: HashSet<Var> = shared.iter().copied().collect();
        prop_assert_eq!(unique.len(), shared.len());
    }
}
