//! Exploration strategies: how the scheduler chooses among enabled
//! operations and nondeterministic values.

pub mod dfs;
pub mod fair;
pub mod pct;
pub mod probabilistic;
pub mod random;
pub mod replay;
pub mod traits;

pub use dfs::DfsStrategy;
pub use fair::FairStrategy;
pub use pct::PctStrategy;
pub use probabilistic::ProbabilisticStrategy;
pub use random::RandomStrategy;
pub use replay::{Divergence, ReplayStrategy};
pub use traits::SchedulingStrategy;
