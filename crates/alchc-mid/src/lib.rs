//! alchc-mid - Midend Optimizer
//!
//! Shape-preserving simplification between the parser and the backend:
//! constant folding of arithmetic whose operands are both constants, and
//! identity elimination for neutral operands (0 for `+`/`-`, 1 for
//! `*`/`/`, 0 exponents). Everything else - control flow, calls,
//! comparisons, unary forms with an absent child - passes through
//! untouched, so the tree contract the parser established still holds on
//! the way out.

use alchc_ast::{Node, NodeValue, Tree};
use alchc_util::OpCode;

/// Simplify the tree in place. `tree.size` is kept consistent.
pub fn optimize(tree: &mut Tree) {
    if let Some(root) = tree.root.take() {
        tree.root = Some(simplify(root));
    }
    tree.recount();
}

/// Opcodes the folder may rewrite; everything else is untouchable.
fn is_foldable(op: OpCode) -> bool {
    matches!(
        op,
        OpCode::Plus | OpCode::Minus | OpCode::Mul | OpCode::Div | OpCode::Pow
    )
}

fn simplify(mut node: Box<Node>) -> Box<Node> {
    node.left = node.left.take().map(simplify);
    node.right = node.right.take().map(simplify);

    let op = match node.value {
        NodeValue::Function(op) if is_foldable(op) => op,
        _ => return node,
    };

    // Only the full binary form folds; unary minus keeps its shape.
    if node.left.is_none() || node.right.is_none() {
        return node;
    }

    let lval = node.left.as_deref().map(|n| n.value);
    let rval = node.right.as_deref().map(|n| n.value);

    if let (Some(NodeValue::Constant(a)), Some(NodeValue::Constant(b))) = (lval, rval) {
        let folded = match op {
            OpCode::Plus => Some(a + b),
            OpCode::Minus => Some(a - b),
            OpCode::Mul => Some(a * b),
            OpCode::Div => (b != 0.0).then(|| a / b),
            OpCode::Pow => Some(a.powf(b)),
            _ => None,
        };
        if let Some(value) = folded {
            return Node::constant(value);
        }
    }

    let left_is = |x: f64| matches!(lval, Some(NodeValue::Constant(v)) if v == x);
    let right_is = |x: f64| matches!(rval, Some(NodeValue::Constant(v)) if v == x);

    match op {
        OpCode::Plus => {
            if left_is(0.0) {
                if let Some(right) = node.right.take() {
                    return right;
                }
            }
            if right_is(0.0) {
                if let Some(left) = node.left.take() {
                    return left;
                }
            }
        }
        OpCode::Minus => {
            if right_is(0.0) {
                if let Some(left) = node.left.take() {
                    return left;
                }
            }
        }
        OpCode::Mul => {
            if left_is(1.0) {
                if let Some(right) = node.right.take() {
                    return right;
                }
            }
            if right_is(1.0) {
                if let Some(left) = node.left.take() {
                    return left;
                }
            }
        }
        OpCode::Div => {
            if right_is(1.0) {
                if let Some(left) = node.left.take() {
                    return left;
                }
            }
        }
        OpCode::Pow => {
            if right_is(0.0) {
                return Node::constant(1.0);
            }
        }
        _ => {}
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchc_ast::count_nodes;
    use alchc_util::OpCode;

    fn tree_of(root: Box<Node>) -> Tree {
        let mut tree = Tree::new();
        tree.set_root(Some(root));
        tree
    }

    fn bin(op: OpCode, a: Box<Node>, b: Box<Node>) -> Box<Node> {
        Node::func(op, Some(a), Some(b))
    }

    #[test]
    fn folds_constant_addition() {
        let mut tree = tree_of(bin(OpCode::Plus, Node::constant(1.0), Node::constant(2.0)));
        optimize(&mut tree);
        assert_eq!(
            tree.root.as_deref().unwrap().value,
            NodeValue::Constant(3.0)
        );
        assert_eq!(tree.size, 1);
    }

    #[test]
    fn folds_nested_constants() {
        // (1 + 2) * 3 -> 9
        let inner = bin(OpCode::Plus, Node::constant(1.0), Node::constant(2.0));
        let mut tree = tree_of(bin(OpCode::Mul, inner, Node::constant(3.0)));
        optimize(&mut tree);
        assert_eq!(
            tree.root.as_deref().unwrap().value,
            NodeValue::Constant(9.0)
        );
    }

    #[test]
    fn folds_pow() {
        let mut tree = tree_of(bin(OpCode::Pow, Node::constant(2.0), Node::constant(10.0)));
        optimize(&mut tree);
        assert_eq!(
            tree.root.as_deref().unwrap().value,
            NodeValue::Constant(1024.0)
        );
    }

    #[test]
    fn division_by_zero_is_left_alone() {
        let mut tree = tree_of(bin(OpCode::Div, Node::constant(1.0), Node::constant(0.0)));
        optimize(&mut tree);
        let root = tree.root.as_deref().unwrap();
        assert!(root.is_op(OpCode::Div));
        assert_eq!(tree.size, 3);
    }

    #[test]
    fn eliminates_additive_identity() {
        let mut tree = Tree::new();
        let x = tree.pool.get_or_add("x");
        tree.set_root(Some(bin(OpCode::Plus, Node::ident(x), Node::constant(0.0))));
        optimize(&mut tree);
        assert_eq!(tree.root.as_deref().unwrap().value, NodeValue::Ident(x));
        assert_eq!(tree.size, 1);
    }

    #[test]
    fn eliminates_multiplicative_identity_both_sides() {
        let mut tree = Tree::new();
        let x = tree.pool.get_or_add("x");
        tree.set_root(Some(bin(
            OpCode::Mul,
            Node::constant(1.0),
            bin(OpCode::Mul, Node::ident(x), Node::constant(1.0)),
        )));
        optimize(&mut tree);
        assert_eq!(tree.root.as_deref().unwrap().value, NodeValue::Ident(x));
    }

    #[test]
    fn subtracting_zero_folds_but_zero_minus_does_not() {
        let mut tree = Tree::new();
        let x = tree.pool.get_or_add("x");
        tree.set_root(Some(bin(OpCode::Minus, Node::ident(x), Node::constant(0.0))));
        optimize(&mut tree);
        assert_eq!(tree.root.as_deref().unwrap().value, NodeValue::Ident(x));

        // 0 - x is negation, not an identity.
        let mut tree = Tree::new();
        let x = tree.pool.get_or_add("x");
        tree.set_root(Some(bin(OpCode::Minus, Node::constant(0.0), Node::ident(x))));
        optimize(&mut tree);
        assert!(tree.root.as_deref().unwrap().is_op(OpCode::Minus));
    }

    #[test]
    fn zero_exponent_becomes_one() {
        let mut tree = Tree::new();
        let x = tree.pool.get_or_add("x");
        tree.set_root(Some(bin(OpCode::Pow, Node::ident(x), Node::constant(0.0))));
        optimize(&mut tree);
        assert_eq!(
            tree.root.as_deref().unwrap().value,
            NodeValue::Constant(1.0)
        );
    }

    #[test]
    fn unary_minus_keeps_its_shape() {
        let mut tree = tree_of(Node::func(
            OpCode::Minus,
            None,
            Some(Node::constant(5.0)),
        ));
        optimize(&mut tree);
        let root = tree.root.as_deref().unwrap();
        assert!(root.is_op(OpCode::Minus));
        assert!(root.left.is_none());
    }

    #[test]
    fn control_opcode_with_stray_operand_is_preserved() {
        // A Break with an operand must come out exactly as it went in.
        let mut tree = Tree::new();
        let x = tree.pool.get_or_add("x");
        tree.set_root(Some(Node::func(OpCode::Break, None, Some(Node::ident(x)))));
        optimize(&mut tree);

        let root = tree.root.as_deref().unwrap();
        assert!(root.is_op(OpCode::Break));
        assert_eq!(root.right.as_deref().unwrap().value, NodeValue::Ident(x));
    }

    #[test]
    fn folds_inside_statements_without_touching_structure() {
        // VIS_START(None, ASSIGN(x, 2 * 3 + 0))
        let mut tree = Tree::new();
        let x = tree.pool.get_or_add("x");
        let rhs = bin(
            OpCode::Plus,
            bin(OpCode::Mul, Node::constant(2.0), Node::constant(3.0)),
            Node::constant(0.0),
        );
        let assign = bin(OpCode::Assign, Node::ident(x), rhs);
        tree.set_root(Some(Node::func(OpCode::VisStart, None, Some(assign))));
        optimize(&mut tree);

        let root = tree.root.as_deref().unwrap();
        assert!(root.is_op(OpCode::VisStart));
        let assign = root.right.as_deref().unwrap();
        assert!(assign.is_op(OpCode::Assign));
        assert_eq!(
            assign.right.as_deref().unwrap().value,
            NodeValue::Constant(6.0)
        );
        assert_eq!(count_nodes(tree.root.as_deref()), tree.size);
    }

    #[test]
    fn optimize_is_idempotent() {
        let inner = bin(OpCode::Plus, Node::constant(1.0), Node::constant(2.0));
        let mut tree = tree_of(bin(OpCode::Mul, inner, Node::constant(3.0)));
        optimize(&mut tree);
        let first = tree.to_text();
        optimize(&mut tree);
        assert_eq!(tree.to_text(), first);
    }
}
