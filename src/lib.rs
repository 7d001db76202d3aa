// non-standard crate imports
use thiserror::Error;

// imports of other modules from this crate
mod network;
pub use network::{CostMode, GridKind, Network};

mod dijkstra;
pub use dijkstra::{all_pairs_shortest_paths, shortest_path_tree, ShortestPathTree};

mod paths;
pub use paths::{AssignmentStrategy, Horizon, PathSet};

mod proportions;
pub use proportions::{ProportionMode, Proportions};

mod assignment;
pub use assignment::{convolve_flows, FlowMatrices, PathAssignment};

mod constraints;
pub use constraints::{
    multi_step_constraints, single_step_constraints, LinkTransitSteps, MultiStepConstraints,
    SingleStepConstraints,
};

mod export;
pub use export::{SolverExporter, StepMode};

mod config;
pub use config::ExperimentConfig;


/// Errors raised by network construction and the assignment pipeline.
#[derive(Error, Debug)]
pub enum NetGenError {
    #[error("node {0} was not declared in the list of nodes")]
    UndeclaredNode(usize),
    #[error("node ids must form the dense range 0..{0}")]
    NonDenseNodeIds(usize),
    #[error("invalid grid dimensions {0}x{1}")]
    InvalidGrid(usize, usize),
    #[error("cost mode '{0}' is not recognised")]
    UnknownCostMode(String),
    #[error("assignment strategy '{0}' is not recognised")]
    UnknownStrategy(String),
    #[error("{given} link costs were supplied for {links} links")]
    CostCountMismatch { given: usize, links: usize },
    #[error("link cost at index {0} is not strictly positive")]
    NonPositiveCost(usize),
    #[error("minimum link cost {min_cost} does not fall below the horizon {horizon}")]
    HorizonTooSmall { horizon: usize, min_cost: f64 },
    #[error("link costs were redrawn {0} times without admitting any path")]
    CostRegenerationExhausted(usize),
    #[error("random assignment requires rigid (unit) link costs")]
    NonRigidCosts,
    #[error("no feasible paths exist between any pair of nodes")]
    NoPaths,
    #[error("proportion weights must satisfy min < max with max > 1, got [{min}, {max})")]
    InvalidWeightRange { min: u32, max: u32 },
    #[error("{0} must be computed first")]
    NotReady(&'static str),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
