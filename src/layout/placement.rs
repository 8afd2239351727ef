//! In-rank ordering and coordinate assignment.

use super::types::{ArrangeNode, RankPlacement};

/// Group node indices by rank, keeping input order within a rank.
pub fn group_by_rank(rank: &[usize]) -> Vec<Vec<usize>> {
    let rank_count = rank.iter().copied().max().map_or(0, |r| r + 1);
    let mut levels: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
    for (node, &r) in rank.iter().enumerate() {
        levels[r].push(node);
    }
    levels
}

fn positions_in_level(levels: &[Vec<usize>], node_count: usize) -> Vec<f64> {
    let mut pos = vec![0.0; node_count];
    for level in levels {
        for (i, &node) in level.iter().enumerate() {
            pos[node] = i as f64;
        }
    }
    pos
}

/// Reorder each rank by the barycenter of its neighbours, alternating
/// left-to-right and right-to-left sweeps to reduce crossings.
pub fn order_by_barycenter(levels: &mut [Vec<usize>], dag: &[(usize, usize)], sweeps: usize) {
    let node_count = levels.iter().map(Vec::len).sum::<usize>();
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(from, to) in dag {
        if from < node_count && to < node_count {
            predecessors[to].push(from);
            successors[from].push(to);
        }
    }

    for sweep in 0..sweeps {
        let forward = sweep % 2 == 0;
        let order: Vec<usize> = if forward {
            (1..levels.len()).collect()
        } else {
            (0..levels.len().saturating_sub(1)).rev().collect()
        };

        for r in order {
            let pos = positions_in_level(levels, node_count);
            let neighbours = if forward { &predecessors } else { &successors };
            let mut keyed: Vec<(f64, usize, usize)> = levels[r]
                .iter()
                .enumerate()
                .map(|(i, &node)| {
                    let adj = &neighbours[node];
                    let key = if adj.is_empty() {
                        i as f64
                    } else {
                        adj.iter().map(|&n| pos[n]).sum::<f64>() / adj.len() as f64
                    };
                    (key, i, node)
                })
                .collect();
            keyed.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
            levels[r] = keyed.into_iter().map(|(_, _, node)| node).collect();
        }
    }
}

/// Place ranks as columns left to right, stacking each rank's cards
/// vertically and centering shorter ranks against the tallest one.
pub fn place_ranks(
    levels: &[Vec<usize>],
    nodes: &[ArrangeNode],
    node_sep: f64,
    rank_sep: f64,
    margin: f64,
) -> RankPlacement {
    let mut positions = vec![(0.0, 0.0); nodes.len()];

    let stack_height = |level: &Vec<usize>| -> f64 {
        let sum: f64 = level.iter().map(|&n| nodes[n].height).sum();
        sum + node_sep * level.len().saturating_sub(1) as f64
    };
    let tallest = levels.iter().map(stack_height).fold(0.0, f64::max);

    let mut x = margin;
    let mut max_right: f64 = margin;

    for level in levels {
        if level.is_empty() {
            continue;
        }
        let column_width = level.iter().map(|&n| nodes[n].width).fold(0.0, f64::max);
        let mut y = margin + (tallest - stack_height(level)) / 2.0;

        for &n in level {
            positions[n] = (x, y);
            y += nodes[n].height + node_sep;
        }

        max_right = x + column_width;
        x += column_width + rank_sep;
    }

    RankPlacement {
        positions,
        total_width: max_right + margin,
        total_height: tallest + margin * 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_rank() {
        assert_eq!(group_by_rank(&[0, 1, 0, 2]), vec![vec![0, 2], vec![1], vec![3]]);
        assert!(group_by_rank(&[]).is_empty());
    }

    #[test]
    fn test_barycenter_uncrosses() {
        // rank 0: a(0) b(1); rank 1: c(2) d(3) with a->d, b->c
        let mut levels = vec![vec![0, 1], vec![2, 3]];
        order_by_barycenter(&mut levels, &[(0, 3), (1, 2)], 2);
        assert_eq!(levels[1], vec![3, 2]);
    }

    #[test]
    fn test_columns_left_to_right() {
        let nodes = vec![
            ArrangeNode::new("a", 100.0, 40.0),
            ArrangeNode::new("b", 150.0, 40.0),
            ArrangeNode::new("c", 100.0, 40.0),
        ];
        let levels = vec![vec![0], vec![1, 2]];
        let placed = place_ranks(&levels, &nodes, 20.0, 80.0, 40.0);

        assert_eq!(placed.positions[0].0, 40.0);
        assert_eq!(placed.positions[1].0, 40.0 + 100.0 + 80.0);
        assert_eq!(placed.positions[1].0, placed.positions[2].0);
        assert!(placed.positions[2].1 > placed.positions[1].1);
        // single card of rank 0 is centered against the two-card column
        assert_eq!(placed.positions[0].1, 40.0 + 30.0);
    }
}
