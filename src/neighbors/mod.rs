pub mod compare;
pub mod grid;
pub mod lsh;
pub mod phase;

pub use compare::{compare_strategies, CompareError, StrategyReport};
pub use grid::{GridConfig, GridError, GridSearch};
pub use lsh::{LshConfig, LshError, LshSearch};
pub use phase::{PhaseSpace, PhaseSpaceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborStrategy {
    Exact,
    Grid,
    Lsh,
}

impl Default for NeighborStrategy {
    fn default() -> Self {
        NeighborStrategy::Exact
    }
}

/// Pick a strategy from the problem shape. Small point counts are cheapest
/// exact; low dimensions bucket well on a grid; high dimensions hash better
/// than they grid (adjacent-cell probing grows linearly with dimension, but
/// cell occupancy collapses).
pub fn select_strategy(dim: usize, count: usize) -> NeighborStrategy {
    if count < 200 {
        NeighborStrategy::Exact
    } else if dim <= 6 {
        NeighborStrategy::Grid
    } else {
        NeighborStrategy::Lsh
    }
}
