//! Auto-arrange engine core implementation.

use thiserror::Error;
use tracing::debug;

use super::analysis::analyze;
use super::placement::{group_by_rank, order_by_barycenter, place_ranks};
use super::types::{ArrangeEdge, ArrangeNode, Arrangement, Placement};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LayoutError {
    #[error("invalid spacing {name}={value}")]
    InvalidSpacing { name: &'static str, value: f64 },
    #[error("card '{id}' has non-finite size")]
    NonFiniteSize { id: String },
    #[error("arrangement produced non-finite position for '{id}'")]
    NonFinitePosition { id: String },
}

/// Layered left-to-right arrangement of table cards.
#[derive(Debug, Clone)]
pub struct ArrangeEngine {
    pub(crate) node_sep: f64,
    pub(crate) rank_sep: f64,
    pub(crate) margin: f64,
    pub(crate) sweeps: usize,
}

impl Default for ArrangeEngine {
    fn default() -> Self {
        Self {
            node_sep: 40.0,
            rank_sep: 120.0,
            margin: 40.0,
            sweeps: 4,
        }
    }
}

impl ArrangeEngine {
    pub fn new(node_sep: f64, rank_sep: f64, margin: f64) -> Self {
        Self {
            node_sep,
            rank_sep,
            margin,
            ..Self::default()
        }
    }

    pub fn with_sweeps(mut self, sweeps: usize) -> Self {
        self.sweeps = sweeps;
        self
    }

    fn check_spacing(&self) -> Result<(), LayoutError> {
        for (name, value) in [
            ("node_sep", self.node_sep),
            ("rank_sep", self.rank_sep),
            ("margin", self.margin),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidSpacing { name, value });
            }
        }
        Ok(())
    }

    /// Compute card positions. Edges point from the source card (rank `r`)
    /// to the target card (rank `> r`).
    pub fn arrange(
        &self,
        nodes: &[ArrangeNode],
        edges: &[ArrangeEdge],
    ) -> Result<Arrangement, LayoutError> {
        self.check_spacing()?;
        let unusable = |v: f64| !v.is_finite() || v < 0.0;
        if let Some(bad) = nodes
            .iter()
            .find(|n| unusable(n.width) || unusable(n.height))
        {
            return Err(LayoutError::NonFiniteSize { id: bad.id.clone() });
        }
        if nodes.is_empty() {
            return Ok(Arrangement::default());
        }

        // Phase 1: graph analysis
        let analysis = analyze(nodes, edges);
        if analysis.reversed > 0 {
            debug!(reversed = analysis.reversed, "broke cycles for arrangement");
        }

        // Phase 2: ordering within ranks
        let mut levels = group_by_rank(&analysis.rank);
        order_by_barycenter(&mut levels, &analysis.edges, self.sweeps);

        // Phase 3: coordinates
        let placed = place_ranks(&levels, nodes, self.node_sep, self.rank_sep, self.margin);

        let mut placements = Vec::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            let (x, y) = placed.positions[i];
            if !x.is_finite() || !y.is_finite() {
                return Err(LayoutError::NonFinitePosition { id: node.id.clone() });
            }
            placements.push(Placement {
                id: node.id.clone(),
                x,
                y,
                rank: analysis.rank[i],
            });
        }

        debug!(
            cards = placements.len(),
            ranks = levels.len(),
            "arrangement computed"
        );

        Ok(Arrangement {
            placements,
            width: placed.total_width,
            height: placed.total_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str) -> ArrangeNode {
        ArrangeNode::new(id, 160.0, 80.0)
    }

    #[test]
    fn test_chain_flows_left_to_right() {
        let arrangement = ArrangeEngine::default()
            .arrange(
                &[card("a"), card("b"), card("c")],
                &[ArrangeEdge::new("a", "b"), ArrangeEdge::new("b", "c")],
            )
            .unwrap();

        let a = arrangement.get("a").unwrap();
        let b = arrangement.get("b").unwrap();
        let c = arrangement.get("c").unwrap();
        assert!(a.x < b.x);
        assert!(b.x < c.x);
    }

    #[test]
    fn test_cycle_still_arranges() {
        let arrangement = ArrangeEngine::default()
            .arrange(
                &[card("a"), card("b")],
                &[ArrangeEdge::new("a", "b"), ArrangeEdge::new("b", "a")],
            )
            .unwrap();
        assert_eq!(arrangement.placements.len(), 2);
        assert_ne!(arrangement.get("a").unwrap().x, arrangement.get("b").unwrap().x);
    }

    #[test]
    fn test_disconnected_cards_stack() {
        let arrangement = ArrangeEngine::default()
            .arrange(&[card("a"), card("b")], &[])
            .unwrap();
        let a = arrangement.get("a").unwrap();
        let b = arrangement.get("b").unwrap();
        assert_eq!(a.x, b.x);
        assert!(b.y >= a.y + 80.0);
    }

    #[test]
    fn test_empty_input() {
        let arrangement = ArrangeEngine::default().arrange(&[], &[]).unwrap();
        assert!(arrangement.placements.is_empty());
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let err = ArrangeEngine::default()
            .arrange(&[ArrangeNode::new("a", f64::NAN, 10.0)], &[])
            .unwrap_err();
        assert_eq!(err, LayoutError::NonFiniteSize { id: "a".into() });

        let err = ArrangeEngine::new(-1.0, 10.0, 10.0)
            .arrange(&[card("a")], &[])
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidSpacing { name: "node_sep", .. }));
    }
}
