// this file defines the network aggregate: a directed graph over an
// index-keyed link arena, the link costs, the owned random stream, and every
// matrix derived from them by the assignment pipeline.
use ndarray::prelude::*;
use petgraph::graphmap::DiGraphMap;
use rand::Rng;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;

use super::assignment;
use super::assignment::{FlowMatrices, PathAssignment};
use super::dijkstra;
use super::paths;
use super::paths::{AssignmentStrategy, Horizon, PathSet};
use super::proportions;
use super::proportions::{ProportionMode, Proportions};
use super::NetGenError;


static REAL_COST_SCALE: f64 = 4.0;
static ZERO_COST_TOL: f64 = 1e-8;
static COST_REGEN_LIMIT: usize = 100;

/// Link cost generation modes.
#[derive(Clone, Debug, PartialEq)]
pub enum CostMode {
    /// every link costs exactly 1
    Rigid,
    /// random integer costs in [1, 4]
    MultInt,
    /// random real costs in (0, 4)
    Real,
    /// costs supplied by the caller, one per link
    Explicit(Vec<f64>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridKind {
    Unidirectional,
    Bidirectional,
}

/// A directed network together with the artifacts the assignment pipeline
/// derives from it.  Nodes are dense 0-based integers and every link is
/// addressed by its position in the canonical link list.  All derived
/// matrices are owned here and only written by their producing operation.
#[derive(Clone)]
pub struct Network {
    graph: DiGraphMap<usize, usize>,
    nodes: Vec<usize>,
    links: Vec<(usize, usize)>,
    rng: Isaac64Rng,
    cost_mode: Option<CostMode>,
    costs: Vec<f64>,
    spl: Option<Array2<f64>>,
    path_set: Option<PathSet>,
    assignment: Option<PathAssignment>,
    proportions: Option<Proportions>,
    flows: Option<FlowMatrices>,
}

impl Network {
    /// Builds an h-by-w grid network with row-major integer node labels.
    /// Unidirectional grids carry only rightward and downward links; the
    /// bidirectional kind appends the reverse of every link.
    pub fn grid(kind: GridKind, height: usize, width: usize, seed: Option<u64>)
                -> Result<Network, NetGenError> {
        if height == 0 || width == 0 {
            return Err(NetGenError::InvalidGrid(height, width));
        }
        let nodes: Vec<usize> = (0..height * width).collect();
        let mut links = vec![];
        for row in 0..height {
            for col in 0..width {
                let node = row * width + col;
                if col + 1 < width {
                    links.push((node, node + 1));
                }
                if row + 1 < height {
                    links.push((node, node + width));
                }
            }
        }
        if kind == GridKind::Bidirectional {
            let reversed: Vec<(usize, usize)> = links.iter().map(|&(tail, head)| (head, tail))
                                                            .collect();
            links.extend(reversed);
        }
        return Network::from_parts(nodes, links, seed);
    }

    /// Builds a network from an explicit node list and link list, verifying
    /// that links contain valid nodes only.
    pub fn from_parts(nodes: Vec<usize>, links: Vec<(usize, usize)>, seed: Option<u64>)
                      -> Result<Network, NetGenError> {
        // node ids are used directly as matrix indexes, so they must be 0..n
        let mut seen = vec![false; nodes.len()];
        for &node in &nodes {
            if node >= nodes.len() || seen[node] {
                return Err(NetGenError::NonDenseNodeIds(nodes.len()));
            }
            seen[node] = true;
        }

        let mut graph = DiGraphMap::new();
        for &node in &nodes {
            graph.add_node(node);
        }
        let mut kept_links = vec![];
        for &(tail, head) in &links {
            if tail >= nodes.len() {
                return Err(NetGenError::UndeclaredNode(tail));
            }
            if head >= nodes.len() {
                return Err(NetGenError::UndeclaredNode(head));
            }
            if tail == head {
                // ignore self-connections
                log::debug!("ignoring self-connection at node {}", tail);
                continue;
            }
            if graph.contains_edge(tail, head) {
                log::debug!("ignoring duplicate link ({}, {})", tail, head);
                continue;
            }
            graph.add_edge(tail, head, kept_links.len());
            kept_links.push((tail, head));
        }

        let rng = match seed {
            Some(seed) => Isaac64Rng::seed_from_u64(seed),
            None => Isaac64Rng::from_entropy(),
        };
        Ok(Network {
            graph,
            nodes,
            links: kept_links,
            rng,
            cost_mode: None,
            costs: vec![],
            spl: None,
            path_set: None,
            assignment: None,
            proportions: None,
            flows: None,
        })
    }

    /// Assigns costs to all links, generating them if necessary.
    pub fn assign_link_costs(&mut self, mode: CostMode) -> Result<(), NetGenError> {
        self.costs = self.draw_costs(&mode)?;
        self.cost_mode = Some(mode);
        Ok(())
    }

    fn draw_costs(&mut self, mode: &CostMode) -> Result<Vec<f64>, NetGenError> {
        let n_links = self.links.len();
        let costs = match mode {
            CostMode::Rigid => vec![1.; n_links],
            CostMode::MultInt => {
                (0..n_links).map(|_| self.rng.gen_range(1..5) as f64).collect()
            }
            CostMode::Real => {
                // redraw the whole vector until no cost is within tolerance of zero
                loop {
                    let draw: Vec<f64> = (0..n_links)
                        .map(|_| self.rng.gen::<f64>() * REAL_COST_SCALE)
                        .collect();
                    if draw.iter().all(|&cc| cc > ZERO_COST_TOL) {
                        break draw;
                    }
                }
            }
            CostMode::Explicit(given) => {
                if given.len() != n_links {
                    return Err(NetGenError::CostCountMismatch {
                        given: given.len(),
                        links: n_links,
                    });
                }
                if let Some(l_idx) = given.iter().position(|&cc| cc <= 0.) {
                    return Err(NetGenError::NonPositiveCost(l_idx));
                }
                given.clone()
            }
        };
        Ok(costs)
    }

    /// Finds all feasible paths under the given strategy and horizon.  The
    /// shortest-path-length matrix F is computed first; if the minimum link
    /// cost leaves no room for any path below the horizon, costs are redrawn
    /// (a bounded number of times) before enumeration.
    pub fn find_all_paths(&mut self, horizon: Horizon, strategy: AssignmentStrategy)
                          -> Result<(), NetGenError> {
        let mode = match &self.cost_mode {
            Some(mode) => mode.clone(),
            None => return Err(NetGenError::NotReady("link costs")),
        };
        // drop anything derived from a previous path set
        self.assignment = None;
        self.proportions = None;
        self.flows = None;

        let mut redraws = 0;
        let (spl, trees, tau_max) = loop {
            let (spl, trees) =
                dijkstra::all_pairs_shortest_paths(&self.graph, &self.costs, self.nodes.len());
            let tau_max = match horizon {
                Horizon::Steps(steps) => steps,
                Horizon::LongestShortestPath => max_finite(&spl).ceil() as usize,
            };
            let min_cost = self.costs.iter().cloned().fold(f64::INFINITY, f64::min);
            if min_cost < tau_max as f64 {
                break (spl, trees, tau_max);
            }
            if !matches!(mode, CostMode::MultInt | CostMode::Real) {
                return Err(NetGenError::HorizonTooSmall { horizon: tau_max, min_cost });
            }
            redraws += 1;
            if redraws > COST_REGEN_LIMIT {
                return Err(NetGenError::CostRegenerationExhausted(redraws - 1));
            }
            log::warn!("no paths are possible under the current link costs, redrawing them");
            self.costs = self.draw_costs(&mode)?;
        };

        let path_set =
            paths::build_path_set(&self.graph, &self.costs, &spl, &trees, tau_max, strategy)?;
        self.spl = Some(spl);
        self.path_set = Some(path_set);
        Ok(())
    }

    /// Computes the deterministic per-time-step path assignment matrices and
    /// the link-multiplicity factors for the enumerated path set.
    pub fn compute_path_assignment_matrix(&mut self) -> Result<(), NetGenError> {
        let path_set = self.path_set.as_ref().ok_or(NetGenError::NotReady("paths"))?;
        let spl = self.spl.as_ref().ok_or(NetGenError::NotReady("shortest path lengths"))?;
        let expanded = assignment::expand_paths(&self.links, &self.costs, spl, path_set)?;
        self.assignment = Some(expanded);
        Ok(())
    }

    /// Generates random fixed proportions splitting origin flow over OD pairs
    /// and OD flow over paths.
    pub fn generate_random_proportions(&mut self, mode: &ProportionMode)
                                       -> Result<(), NetGenError> {
        let path_set = self.path_set.as_ref().ok_or(NetGenError::NotReady("paths"))?;
        let props = proportions::generate_proportions(path_set, &mut self.rng, mode)?;
        self.proportions = Some(props);
        Ok(())
    }

    /// Folds the path assignment matrices through the proportion tree into
    /// the per-step and time-collapsed link-by-OD and link-by-origin flows.
    pub fn compute_assignment_matrix(&mut self) -> Result<(), NetGenError> {
        let path_set = self.path_set.as_ref().ok_or(NetGenError::NotReady("paths"))?;
        let expanded = self.assignment.as_ref()
            .ok_or(NetGenError::NotReady("path assignment matrix"))?;
        let props = self.proportions.as_ref().ok_or(NetGenError::NotReady("proportions"))?;
        let flows = assignment::aggregate_flows(path_set, expanded, props);
        self.flows = Some(flows);
        Ok(())
    }

    /// Returns an independent copy of the network with the same topology,
    /// costs and derived matrices.  The copy's random stream is reseeded from
    /// this network's stream, so draws on the copy are reproducible without
    /// replaying the draws this network makes afterwards.
    pub fn duplicate(&mut self) -> Network {
        let mut copy = self.clone();
        copy.rng = Isaac64Rng::seed_from_u64(self.rng.gen());
        return copy;
    }

    pub fn nodes(&self) -> &[usize] {
        return &self.nodes;
    }

    pub fn links(&self) -> &[(usize, usize)] {
        return &self.links;
    }

    pub fn costs(&self) -> &[f64] {
        return &self.costs;
    }

    pub fn graph(&self) -> &DiGraphMap<usize, usize> {
        return &self.graph;
    }

    pub fn spl_matrix(&self) -> Result<&Array2<f64>, NetGenError> {
        return self.spl.as_ref().ok_or(NetGenError::NotReady("shortest path lengths"));
    }

    pub fn path_set(&self) -> Result<&PathSet, NetGenError> {
        return self.path_set.as_ref().ok_or(NetGenError::NotReady("paths"));
    }

    pub fn path_assignment(&self) -> Result<&PathAssignment, NetGenError> {
        return self.assignment.as_ref().ok_or(NetGenError::NotReady("path assignment matrix"));
    }

    pub fn proportions(&self) -> Result<&Proportions, NetGenError> {
        return self.proportions.as_ref().ok_or(NetGenError::NotReady("proportions"));
    }

    pub fn flows(&self) -> Result<&FlowMatrices, NetGenError> {
        return self.flows.as_ref().ok_or(NetGenError::NotReady("assignment matrices"));
    }
}

fn max_finite(spl: &Array2<f64>) -> f64 {
    return spl.iter().cloned().filter(|cc| cc.is_finite()).fold(0., f64::max);
}
