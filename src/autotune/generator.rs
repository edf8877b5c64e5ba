//! Exhaustive enumeration of candidate transformations.
//!
//! For each optimization kind the generator walks the syntax-tree view
//! and emits one cloned tree per applicable candidate, each carrying a
//! single [`OptimizationInfo`] record describing the transformation.

use crate::autotune::tree::{LoopNode, OptimizationInfo, OptimizationKind, SyntaxTree};

/// Factor lists steering candidate enumeration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Candidate tile sizes.
    pub tiling_factors: Vec<i64>,
    /// Candidate unroll factors.
    pub unrolling_factors: Vec<i64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tiling_factors: vec![32, 64, 128],
            unrolling_factors: vec![4, 8, 16],
        }
    }
}

/// Enumerates all candidates of one optimization kind over a tree.
#[derive(Debug, Default)]
pub struct ExhaustiveGenerator {
    /// Enumeration configuration.
    pub config: GeneratorConfig,
}

impl ExhaustiveGenerator {
    /// Create a generator with the given configuration.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Whether an iterator of `extent` can be split by `factor`.
    fn can_split(extent: i64, factor: i64) -> bool {
        factor > 0 && extent > factor && extent % factor == 0
    }

    /// Enumerate the candidate states of one optimization kind.
    pub fn generate_states(&self, tree: &SyntaxTree, optim: OptimizationKind) -> Vec<SyntaxTree> {
        let mut states = Vec::new();
        match optim {
            OptimizationKind::Fusion => {
                self.generate_fusions(tree, &tree.roots, &[], &mut states);
            }
            OptimizationKind::Tiling => {
                for (i, root) in tree.roots.iter().enumerate() {
                    self.generate_tilings(tree, root, &[i], &mut states);
                }
            }
            OptimizationKind::Interchange => {
                for (i, root) in tree.roots.iter().enumerate() {
                    self.generate_interchanges(tree, root, &[i], &mut states);
                }
            }
            OptimizationKind::Unrolling => {
                for (i, root) in tree.roots.iter().enumerate() {
                    self.generate_unrollings(tree, root, &[i], &mut states);
                }
            }
        }
        states
    }

    fn candidate(
        tree: &SyntaxTree,
        kind: OptimizationKind,
        node: &[usize],
        levels: Vec<usize>,
        factors: Vec<i64>,
        computations: Vec<String>,
    ) -> SyntaxTree {
        let mut state = tree.clone();
        state.optimizations.push(OptimizationInfo {
            kind,
            node: node.to_vec(),
            levels,
            factors,
            computations,
        });
        state
    }

    /// Candidates fusing sibling loops with identical iterator name and
    /// bounds, skipping unrolled loops.
    fn generate_fusions(
        &self,
        tree: &SyntaxTree,
        level: &[LoopNode],
        prefix: &[usize],
        states: &mut Vec<SyntaxTree>,
    ) {
        for i in 0..level.len() {
            if level[i].unrolled {
                continue;
            }
            for j in (i + 1)..level.len() {
                if level[j].unrolled {
                    continue;
                }
                if level[i].name == level[j].name
                    && level[i].low_bound == level[j].low_bound
                    && level[i].up_bound == level[j].up_bound
                {
                    let mut path = prefix.to_vec();
                    path.push(i);
                    let mut comps = Vec::new();
                    if let Some(c) = level[i].rightmost_computation() {
                        comps.push(c.to_string());
                    }
                    if let Some(c) = level[j].leftmost_computation() {
                        comps.push(c.to_string());
                    }
                    states.push(Self::candidate(
                        tree,
                        OptimizationKind::Fusion,
                        &path,
                        vec![i, j],
                        vec![level[i].depth as i64],
                        comps,
                    ));
                }
            }
        }
        for (i, node) in level.iter().enumerate() {
            let mut path = prefix.to_vec();
            path.push(i);
            self.generate_fusions(tree, &node.children, &path, states);
        }
    }

    /// 2D and 3D tiling candidates over perfect-nest chains, for every
    /// pair (or triple) of factors evenly dividing the extents.
    fn generate_tilings(
        &self,
        tree: &SyntaxTree,
        node: &LoopNode,
        path: &[usize],
        states: &mut Vec<SyntaxTree>,
    ) {
        let branch_depth = node.loop_levels_chain_depth();
        if node.depth + 1 < branch_depth {
            for &f1 in &self.config.tiling_factors {
                if !Self::can_split(node.extent(), f1) {
                    continue;
                }
                let node2 = &node.children[0];
                for &f2 in &self.config.tiling_factors {
                    if !Self::can_split(node2.extent(), f2) {
                        continue;
                    }
                    let mut comps = Vec::new();
                    node.all_computations(&mut comps);
                    states.push(Self::candidate(
                        tree,
                        OptimizationKind::Tiling,
                        path,
                        vec![node.depth, node.depth + 1],
                        vec![f1, f2],
                        comps.clone(),
                    ));

                    if node.depth + 2 < branch_depth {
                        let node3 = &node2.children[0];
                        for &f3 in &self.config.tiling_factors {
                            if !Self::can_split(node3.extent(), f3) {
                                continue;
                            }
                            states.push(Self::candidate(
                                tree,
                                OptimizationKind::Tiling,
                                path,
                                vec![node.depth, node.depth + 1, node.depth + 2],
                                vec![f1, f2, f3],
                                comps.clone(),
                            ));
                        }
                    }
                }
            }
        }
        for (i, child) in node.children.iter().enumerate() {
            let mut child_path = path.to_vec();
            child_path.push(i);
            self.generate_tilings(tree, child, &child_path, states);
        }
    }

    /// Candidates swapping a loop with each descendant of its
    /// perfect-nest chain.
    fn generate_interchanges(
        &self,
        tree: &SyntaxTree,
        node: &LoopNode,
        path: &[usize],
        states: &mut Vec<SyntaxTree>,
    ) {
        if !node.unrolled {
            let branch_depth = node.loop_levels_chain_depth();
            for i in (node.depth + 1)..branch_depth {
                let mut comps = Vec::new();
                node.all_computations(&mut comps);
                states.push(Self::candidate(
                    tree,
                    OptimizationKind::Interchange,
                    path,
                    vec![node.depth, i],
                    Vec::new(),
                    comps,
                ));
            }
        }
        for (i, child) in node.children.iter().enumerate() {
            let mut child_path = path.to_vec();
            child_path.push(i);
            self.generate_interchanges(tree, child, &child_path, states);
        }
    }

    /// Unrolling candidates for loops whose extent equals a factor or
    /// divides evenly by one. The candidate's node is marked unrolled.
    fn generate_unrollings(
        &self,
        tree: &SyntaxTree,
        node: &LoopNode,
        path: &[usize],
        states: &mut Vec<SyntaxTree>,
    ) {
        if !node.unrolled {
            for &factor in &self.config.unrolling_factors {
                if node.extent() != factor && !Self::can_split(node.extent(), factor) {
                    continue;
                }
                let mut comps = Vec::new();
                node.all_computations(&mut comps);
                let mut state = Self::candidate(
                    tree,
                    OptimizationKind::Unrolling,
                    path,
                    vec![node.depth],
                    vec![factor],
                    comps,
                );
                if let Some(n) = state.node_at_mut(path) {
                    n.unrolled = true;
                }
                states.push(state);
            }
        }
        for (i, child) in node.children.iter().enumerate() {
            let mut child_path = path.to_vec();
            child_path.push(i);
            self.generate_unrollings(tree, child, &child_path, states);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loop_node(name: &str, depth: usize, up: i64, children: Vec<LoopNode>, comps: Vec<&str>) -> LoopNode {
        LoopNode {
            name: name.to_string(),
            depth,
            low_bound: 0,
            up_bound: up,
            unrolled: false,
            computations: comps.into_iter().map(String::from).collect(),
            children,
        }
    }

    fn two_level_tree() -> SyntaxTree {
        // for i in 0..128 { for j in 0..64 { S } }
        SyntaxTree {
            roots: vec![loop_node(
                "i",
                0,
                127,
                vec![loop_node("j", 1, 63, vec![], vec!["S"])],
                vec![],
            )],
            optimizations: Vec::new(),
        }
    }

    #[test]
    fn test_tiling_candidates() {
        let gen = ExhaustiveGenerator::default();
        let states = gen.generate_states(&two_level_tree(), OptimizationKind::Tiling);
        // i (extent 128) splits by 32 and 64; j (extent 64) splits by 32.
        assert_eq!(states.len(), 2);
        for s in &states {
            let info = &s.optimizations[0];
            assert_eq!(info.kind, OptimizationKind::Tiling);
            assert_eq!(info.levels, vec![0, 1]);
            assert_eq!(info.factors[1], 32);
            assert_eq!(info.computations, vec!["S".to_string()]);
        }
    }

    #[test]
    fn test_interchange_candidates() {
        let gen = ExhaustiveGenerator::default();
        let states = gen.generate_states(&two_level_tree(), OptimizationKind::Interchange);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].optimizations[0].levels, vec![0, 1]);
    }

    #[test]
    fn test_unrolling_marks_node() {
        let gen = ExhaustiveGenerator::default();
        let states = gen.generate_states(&two_level_tree(), OptimizationKind::Unrolling);
        // i: 128 divisible by 4, 8, 16; j: 64 divisible by 4, 8, 16.
        assert_eq!(states.len(), 6);
        for s in &states {
            let info = &s.optimizations[0];
            assert!(s.node_at(&info.node).unwrap().unrolled);
        }
    }

    #[test]
    fn test_fusion_candidates() {
        let a = loop_node("i", 0, 63, vec![], vec!["A"]);
        let b = loop_node("i", 0, 63, vec![], vec!["B"]);
        let tree = SyntaxTree {
            roots: vec![a, b],
            optimizations: Vec::new(),
        };
        let gen = ExhaustiveGenerator::default();
        let states = gen.generate_states(&tree, OptimizationKind::Fusion);
        assert_eq!(states.len(), 1);
        let info = &states[0].optimizations[0];
        assert_eq!(info.levels, vec![0, 1]);
        assert_eq!(
            info.computations,
            vec!["A".to_string(), "B".to_string()]
        );
    }

    #[test]
    fn test_unrolled_loops_not_fused() {
        let mut a = loop_node("i", 0, 63, vec![], vec!["A"]);
        a.unrolled = true;
        let b = loop_node("i", 0, 63, vec![], vec!["B"]);
        let tree = SyntaxTree {
            roots: vec![a, b],
            optimizations: Vec::new(),
        };
        let gen = ExhaustiveGenerator::default();
        let states = gen.generate_states(&tree, OptimizationKind::Fusion);
        assert!(states.is_empty());
    }
}
