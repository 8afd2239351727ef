//! Data structures for auto-arrange.

/// A table card to be arranged, sized by its rendered geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrangeNode {
    pub id: String,
    pub width: f64,
    pub height: f64,
}

impl ArrangeNode {
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            width,
            height,
        }
    }
}

/// Directed dependency between two cards (source rank precedes target rank).
#[derive(Debug, Clone, PartialEq)]
pub struct ArrangeEdge {
    pub from: String,
    pub to: String,
}

impl ArrangeEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Final position of one card.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub rank: usize,
}

/// The complete arrangement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arrangement {
    pub placements: Vec<Placement>,
    pub width: f64,
    pub height: f64,
}

impl Arrangement {
    pub fn get(&self, id: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.id == id)
    }
}

/// Result of graph analysis: node index based DAG and ranks.
pub struct RankAnalysis {
    /// Deduplicated, acyclic edges as (source, target) node indices
    pub edges: Vec<(usize, usize)>,
    /// Node index -> rank (column, left to right)
    pub rank: Vec<usize>,
    /// Number of edges reversed to break cycles
    pub reversed: usize,
}

/// Result of node placement phase.
pub struct RankPlacement {
    /// Node index -> (x, y)
    pub positions: Vec<(f64, f64)>,
    pub total_width: f64,
    pub total_height: f64,
}
