//! Lazy, iterative traversals over operator trees.
//!
//! Every iterator keeps an explicit frame stack instead of recursing, so deep
//! left spines cannot overflow the thread stack. Each iterator exposes the
//! chain of ancestors of the node it returned last, outermost first.

use crate::node::BOpRef;

#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    node: &'a BOpRef,
    next: usize,
}

/// Node first, then each child subtree in argument order.
#[derive(Debug, Clone)]
pub struct PreOrder<'a> {
    root: Option<&'a BOpRef>,
    frames: Vec<Frame<'a>>,
    // the last returned node owns the top frame
    last_pushed: bool,
}

pub fn pre_order(root: &BOpRef) -> PreOrder<'_> {
    PreOrder {
        root: Some(root),
        frames: Vec::new(),
        last_pushed: false,
    }
}

impl<'a> PreOrder<'a> {
    pub fn ancestors(&self) -> impl Iterator<Item = &'a BOpRef> + '_ {
        let n = self.frames.len() - usize::from(self.last_pushed);
        self.frames[..n].iter().map(|f| f.node)
    }

    pub fn parent(&self) -> Option<&'a BOpRef> {
        self.ancestors().last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - usize::from(self.last_pushed)
    }

    fn enter(&mut self, node: &'a BOpRef) -> &'a BOpRef {
        self.last_pushed = node.arity() > 0;
        if self.last_pushed {
            self.frames.push(Frame { node, next: 0 });
        }
        node
    }
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a BOpRef;

    fn next(&mut self) -> Option<&'a BOpRef> {
        if let Some(root) = self.root.take() {
            return Some(self.enter(root));
        }
        loop {
            let frame = self.frames.last_mut()?;
            let node = frame.node;
            if let Some(child) = node.args().get(frame.next) {
                frame.next += 1;
                return Some(self.enter(child));
            }
            self.frames.pop();
        }
    }
}

/// Each child subtree in argument order, then the node; the root comes last.
#[derive(Debug, Clone)]
pub struct PostOrder<'a> {
    frames: Vec<Frame<'a>>,
}

pub fn post_order(root: &BOpRef) -> PostOrder<'_> {
    PostOrder {
        frames: vec![Frame { node: root, next: 0 }],
    }
}

impl<'a> PostOrder<'a> {
    pub fn ancestors(&self) -> impl Iterator<Item = &'a BOpRef> + '_ {
        self.frames.iter().map(|f| f.node)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl<'a> Iterator for PostOrder<'a> {
    type Item = &'a BOpRef;

    fn next(&mut self) -> Option<&'a BOpRef> {
        loop {
            let frame = self.frames.last_mut()?;
            let node = frame.node;
            match node.args().get(frame.next) {
                Some(child) => {
                    frame.next += 1;
                    if child.arity() == 0 {
                        return Some(child);
                    }
                    self.frames.push(Frame {
                        node: child,
                        next: 0,
                    });
                }
                None => {
                    self.frames.pop();
                    return Some(node);
                }
            }
        }
    }
}

/// Operator subtrees held in `op`'s annotations.
pub fn annotation_ops(op: &BOpRef) -> impl Iterator<Item = &BOpRef> {
    op.annotations().ops()
}

/// Pre-order in which every node is immediately followed by the
/// pre-order-with-annotations of each of its operator-valued annotations.
#[derive(Debug, Clone)]
pub struct PreOrderWithAnnotations<'a> {
    stack: Vec<PreOrder<'a>>,
}

pub fn pre_order_with_annotations(root: &BOpRef) -> PreOrderWithAnnotations<'_> {
    PreOrderWithAnnotations {
        stack: vec![pre_order(root)],
    }
}

impl<'a> Iterator for PreOrderWithAnnotations<'a> {
    type Item = &'a BOpRef;

    fn next(&mut self) -> Option<&'a BOpRef> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(node) => {
                    let anns: Vec<&'a BOpRef> = annotation_ops(node).collect();
                    self.stack.extend(anns.into_iter().rev().map(pre_order));
                    return Some(node);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::names;
    use crate::constraint::Constraint;
    use crate::pipeline::PipelineOpBuilder;
    use crate::node::BOp;
    use bopline_core::id::BopId;
    use bopline_core::var::Var;

    fn names_of<'a>(it: impl Iterator<Item = &'a BOpRef>) -> Vec<String> {
        it.map(|n| n.label()).collect()
    }

    // C(B(A, ?t), D)
    fn tree() -> BOpRef {
        let a = PipelineOpBuilder::without_id("A").build();
        let b = PipelineOpBuilder::without_id("B")
            .arg(a)
            .arg(BOp::var(Var::named("trav_t")))
            .build();
        let d = PipelineOpBuilder::without_id("D").build();
        PipelineOpBuilder::without_id("C").arg(b).arg(d).build()
    }

    #[test]
    fn test_pre_order() {
        assert_eq!(names_of(pre_order(&tree())), vec!["C", "B", "A", "?trav_t", "D"]);
    }

    #[test]
    fn test_post_order() {
        assert_eq!(names_of(post_order(&tree())), vec!["A", "?trav_t", "B", "D", "C"]);
    }

    #[test]
    fn test_pre_order_ancestors() {
        let root = tree();
        let mut it = pre_order(&root);
        let mut seen = Vec::new();
        while let Some(node) = it.next() {
            let path: Vec<String> = it.ancestors().map(|n| n.label()).collect();
            seen.push((node.label(), path.join("/")));
        }
        assert_eq!(
            seen,
            vec![
                ("C".to_string(), "".to_string()),
                ("B".to_string(), "C".to_string()),
                ("A".to_string(), "C/B".to_string()),
                ("?trav_t".to_string(), "C/B".to_string()),
                ("D".to_string(), "C".to_string()),
            ]
        );
    }

    #[test]
    fn test_post_order_ancestors() {
        let root = tree();
        let mut it = post_order(&root);
        let mut depths = Vec::new();
        while let Some(node) = it.next() {
            depths.push((node.label(), it.depth()));
        }
        assert_eq!(
            depths,
            vec![
                ("A".to_string(), 2),
                ("?trav_t".to_string(), 2),
                ("B".to_string(), 1),
                ("D".to_string(), 1),
                ("C".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_annotations_expand_in_place() {
        let y = Var::named("trav_y");
        let guard = Constraint::bound(y);
        let inner = PipelineOpBuilder::new("Inner", BopId::new(2))
            .annotate(names::CONSTRAINTS, vec![guard.bop().clone()])
            .build();
        let sibling = PipelineOpBuilder::without_id("Sibling").build();
        let root = PipelineOpBuilder::new("Root", BopId::new(1))
            .arg(inner)
            .arg(sibling)
            .build();

        let order: Vec<String> = pre_order_with_annotations(&root).map(|n| n.name().to_string()).collect();
        assert_eq!(order, vec!["Root", "Inner", "BOUND", "Var", "Sibling"]);
        // plain pre-order never sees annotation subtrees
        assert_eq!(pre_order(&root).count(), 3);
    }

    #[test]
    fn test_annotations_precede_children() {
        let y = Var::named("trav_ay");
        let child = PipelineOpBuilder::without_id("Child")
            .arg(BOp::var(Var::named("trav_ax")))
            .build();
        let root = PipelineOpBuilder::new("Root", BopId::new(1))
            .arg(child)
            .annotate(names::CONSTRAINTS, vec![Constraint::bound(y).bop().clone()])
            .build();

        let order: Vec<String> = pre_order_with_annotations(&root)
            .map(|n| match n.as_var() {
                Some(v) => v.to_string(),
                None => n.name().to_string(),
            })
            .collect();
        assert_eq!(order, vec!["Root", "BOUND", "?trav_ay", "Child", "?trav_ax"]);
    }
}
