//! Graph analysis for auto-arrange: edge cleanup, cycle breaking, ranks.

use std::collections::{HashMap, HashSet};

use super::types::{ArrangeEdge, ArrangeNode, RankAnalysis};

/// Map edges onto node indices, dropping self-loops, duplicates of the same
/// `source -> target` pair and edges with unknown endpoints.
pub fn build_index_edges(nodes: &[ArrangeNode], edges: &[ArrangeEdge]) -> Vec<(usize, usize)> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    let mut result = Vec::new();

    for edge in edges {
        let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        else {
            continue;
        };
        if from == to {
            continue;
        }
        if seen.insert((from, to)) {
            result.push((from, to));
        }
    }

    result
}

/// Reverse DFS back edges so the graph becomes acyclic.
/// Returns the acyclic edge list and how many edges were flipped.
pub fn break_cycles(node_count: usize, edges: &[(usize, usize)]) -> (Vec<(usize, usize)>, usize) {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(from, to) in edges {
        adjacency[from].push(to);
    }

    // 0 = unvisited, 1 = on stack, 2 = done
    let mut state = vec![0u8; node_count];
    let mut back_edges: HashSet<(usize, usize)> = HashSet::new();

    for start in 0..node_count {
        if state[start] != 0 {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        state[start] = 1;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if top.1 < adjacency[node].len() {
                let target = adjacency[node][top.1];
                top.1 += 1;
                match state[target] {
                    0 => {
                        state[target] = 1;
                        stack.push((target, 0));
                    }
                    1 => {
                        back_edges.insert((node, target));
                    }
                    _ => {}
                }
            } else {
                state[node] = 2;
                stack.pop();
            }
        }
    }

    let mut result: Vec<(usize, usize)> = Vec::with_capacity(edges.len());
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for &(from, to) in edges {
        let edge = if back_edges.contains(&(from, to)) {
            (to, from)
        } else {
            (from, to)
        };
        if seen.insert(edge) {
            result.push(edge);
        }
    }

    (result, back_edges.len())
}

/// Longest-path ranking: sources get rank 0, every target sits at least one
/// rank right of each of its sources.
pub fn assign_ranks(node_count: usize, dag: &[(usize, usize)]) -> Vec<usize> {
    let mut indegree = vec![0usize; node_count];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(from, to) in dag {
        indegree[to] += 1;
        successors[from].push(to);
    }

    let mut rank = vec![0usize; node_count];
    let mut queue: Vec<usize> = (0..node_count).filter(|&i| indegree[i] == 0).collect();
    let mut head = 0;

    while head < queue.len() {
        let node = queue[head];
        head += 1;
        for &next in &successors[node] {
            rank[next] = rank[next].max(rank[node] + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push(next);
            }
        }
    }

    rank
}

/// Run all analysis phases.
pub fn analyze(nodes: &[ArrangeNode], edges: &[ArrangeEdge]) -> RankAnalysis {
    let indexed = build_index_edges(nodes, edges);
    let (dag, reversed) = break_cycles(nodes.len(), &indexed);
    let rank = assign_ranks(nodes.len(), &dag);
    RankAnalysis {
        edges: dag,
        rank,
        reversed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> Vec<ArrangeNode> {
        ids.iter().map(|id| ArrangeNode::new(*id, 100.0, 50.0)).collect()
    }

    #[test]
    fn test_dedupe_and_self_loops() {
        let n = nodes(&["a", "b"]);
        let edges = vec![
            ArrangeEdge::new("a", "b"),
            ArrangeEdge::new("a", "b"),
            ArrangeEdge::new("a", "a"),
            ArrangeEdge::new("a", "ghost"),
        ];
        assert_eq!(build_index_edges(&n, &edges), vec![(0, 1)]);
    }

    #[test]
    fn test_chain_ranks() {
        let analysis = analyze(
            &nodes(&["a", "b", "c"]),
            &[ArrangeEdge::new("a", "b"), ArrangeEdge::new("b", "c")],
        );
        assert_eq!(analysis.rank, vec![0, 1, 2]);
        assert_eq!(analysis.reversed, 0);
    }

    #[test]
    fn test_longest_path_wins() {
        // a -> b -> c and a -> c: c must sit right of b
        let analysis = analyze(
            &nodes(&["a", "b", "c"]),
            &[
                ArrangeEdge::new("a", "c"),
                ArrangeEdge::new("a", "b"),
                ArrangeEdge::new("b", "c"),
            ],
        );
        assert_eq!(analysis.rank, vec![0, 1, 2]);
    }

    #[test]
    fn test_cycle_is_broken() {
        let analysis = analyze(
            &nodes(&["a", "b", "c"]),
            &[
                ArrangeEdge::new("a", "b"),
                ArrangeEdge::new("b", "c"),
                ArrangeEdge::new("c", "a"),
            ],
        );
        assert_eq!(analysis.reversed, 1);
        assert_eq!(analysis.rank, vec![0, 1, 2]);
    }
}
