//! A syntax-tree view of a generated loop nest.
//!
//! The state generator works on a lightweight tree of loop nodes with
//! constant bounds, built from the raw loop-nest AST. Each node records
//! the computations executed directly inside it and whether it has been
//! unrolled (a write-once flag).

use crate::codegen::build::AstNode;
use crate::ir::expr::{BinOp, Expr};
use serde::{Deserialize, Serialize};

/// One loop of the syntax-tree view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopNode {
    /// Iterator name.
    pub name: String,
    /// Nesting depth; 0 for a root loop.
    pub depth: usize,
    /// Constant lower bound.
    pub low_bound: i64,
    /// Constant inclusive upper bound.
    pub up_bound: i64,
    /// Whether the loop has been unrolled. Write-once: the flag is set
    /// by an unrolling candidate and never cleared.
    pub unrolled: bool,
    /// Computations executed directly inside this loop.
    pub computations: Vec<String>,
    /// Nested loops.
    pub children: Vec<LoopNode>,
}

impl LoopNode {
    /// Trip count of the loop.
    pub fn extent(&self) -> i64 {
        self.up_bound - self.low_bound + 1
    }

    /// Depth one past the innermost loop of the perfect-nest chain
    /// rooted here: the chain follows single-child loops carrying no
    /// direct computations.
    pub fn loop_levels_chain_depth(&self) -> usize {
        let mut depth = self.depth + 1;
        let mut node = self;
        while node.children.len() == 1 && node.computations.is_empty() {
            node = &node.children[0];
            depth += 1;
        }
        depth
    }

    /// First computation in emission order under this loop.
    pub fn leftmost_computation(&self) -> Option<&str> {
        if let Some(c) = self.computations.first() {
            return Some(c);
        }
        self.children.iter().find_map(|c| c.leftmost_computation())
    }

    /// Last computation in emission order under this loop.
    pub fn rightmost_computation(&self) -> Option<&str> {
        if let Some(c) = self
            .children
            .iter()
            .rev()
            .find_map(|c| c.rightmost_computation())
        {
            return Some(c);
        }
        self.computations.last().map(|s| s.as_str())
    }

    /// Collect every computation under this loop.
    pub fn all_computations(&self, out: &mut Vec<String>) {
        out.extend(self.computations.iter().cloned());
        for c in &self.children {
            c.all_computations(out);
        }
    }
}

/// The kind of a candidate optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationKind {
    /// Fuse two sibling loops with identical headers.
    Fusion,
    /// Tile a perfect-nest chain.
    Tiling,
    /// Swap a loop with a descendant in its chain.
    Interchange,
    /// Unroll a loop.
    Unrolling,
}

/// One candidate transformation recorded against a cloned tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationInfo {
    /// What the candidate does.
    pub kind: OptimizationKind,
    /// Path of the affected node from the roots (child indices).
    pub node: Vec<usize>,
    /// The loop levels involved.
    pub levels: Vec<usize>,
    /// The factors involved (tile sizes, unroll factor).
    pub factors: Vec<i64>,
    /// The computations affected.
    pub computations: Vec<String>,
}

/// A syntax-tree view of a loop nest plus the candidate optimizations
/// recorded against it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    /// Top-level loops.
    pub roots: Vec<LoopNode>,
    /// Candidate optimizations, one per generated state.
    pub optimizations: Vec<OptimizationInfo>,
}

impl SyntaxTree {
    /// Build the syntax-tree view from a raw loop-nest AST.
    ///
    /// Returns `None` when a loop bound is not constant; the state
    /// generator only handles nests with known extents.
    pub fn from_ast(ast: &AstNode) -> Option<SyntaxTree> {
        let mut roots = Vec::new();
        let mut orphans = Vec::new();
        collect(ast, 0, &mut roots, &mut orphans)?;
        Some(SyntaxTree {
            roots,
            optimizations: Vec::new(),
        })
    }

    /// Resolve a node path produced by the generator.
    pub fn node_at(&self, path: &[usize]) -> Option<&LoopNode> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.roots.get(first)?;
        for &idx in rest {
            node = node.children.get(idx)?;
        }
        Some(node)
    }

    pub(crate) fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut LoopNode> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.roots.get_mut(first)?;
        for &idx in rest {
            node = node.children.get_mut(idx)?;
        }
        Some(node)
    }
}

/// Gather the loops of `node` into `loops` and the computations placed
/// directly at this nesting level into `direct`.
fn collect(
    node: &AstNode,
    depth: usize,
    loops: &mut Vec<LoopNode>,
    direct: &mut Vec<String>,
) -> Option<()> {
    match node {
        AstNode::For {
            iterator,
            init,
            cond,
            body,
            ..
        } => {
            let low = init.eval_constant()?;
            let up = match cond {
                Expr::Binary {
                    op: BinOp::Le,
                    right,
                    ..
                } => right.eval_constant()?,
                _ => return None,
            };
            let mut children = Vec::new();
            let mut computations = Vec::new();
            collect(body, depth + 1, &mut children, &mut computations)?;
            loops.push(LoopNode {
                name: iterator.clone(),
                depth,
                low_bound: low,
                up_bound: up,
                unrolled: false,
                computations,
                children,
            });
            Some(())
        }
        AstNode::If {
            then_body,
            else_body,
            ..
        } => {
            collect(then_body, depth, loops, direct)?;
            if let Some(e) = else_body {
                collect(e, depth, loops, direct)?;
            }
            Some(())
        }
        AstNode::Block(children) => {
            for c in children {
                collect(c, depth, loops, direct)?;
            }
            Some(())
        }
        AstNode::UserStmt { name, .. } => {
            direct.push(name.clone());
            Some(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> AstNode {
        AstNode::UserStmt {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    fn for_node(iter: &str, low: i64, up: i64, body: AstNode) -> AstNode {
        AstNode::For {
            iterator: iter.to_string(),
            init: Expr::int(low),
            cond: Expr::var(iter).le(Expr::int(up)),
            inc: 1,
            body: Box::new(body),
        }
    }

    #[test]
    fn test_from_ast_chain() {
        let ast = for_node("i", 0, 63, for_node("j", 0, 31, leaf("S")));
        let tree = SyntaxTree::from_ast(&ast).unwrap();
        assert_eq!(tree.roots.len(), 1);
        let root = &tree.roots[0];
        assert_eq!(root.extent(), 64);
        assert_eq!(root.loop_levels_chain_depth(), 2);
        assert_eq!(root.children[0].computations, vec!["S".to_string()]);
        assert_eq!(root.leftmost_computation(), Some("S"));
        assert_eq!(root.rightmost_computation(), Some("S"));
    }

    #[test]
    fn test_from_ast_rejects_symbolic_bounds() {
        let ast = AstNode::For {
            iterator: "i".to_string(),
            init: Expr::int(0),
            cond: Expr::var("i").le(Expr::var("N").sub(Expr::int(1))),
            inc: 1,
            body: Box::new(leaf("S")),
        };
        assert!(SyntaxTree::from_ast(&ast).is_none());
    }

    #[test]
    fn test_node_at() {
        let ast = for_node("i", 0, 7, for_node("j", 0, 7, leaf("S")));
        let tree = SyntaxTree::from_ast(&ast).unwrap();
        assert_eq!(tree.node_at(&[0]).unwrap().name, "i");
        assert_eq!(tree.node_at(&[0, 0]).unwrap().name, "j");
        assert!(tree.node_at(&[1]).is_none());
    }
}
