use itertools::iproduct;
use ndarray::prelude::*;
use petgraph::algo::all_simple_paths;
use petgraph::graphmap::DiGraphMap;

use super::dijkstra::ShortestPathTree;
use super::NetGenError;


/// How flow is assumed to route between each origin-destination pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignmentStrategy {
    /// flow may take any loop-free path of at most `tau_max` links
    Random,
    /// flow takes only cost-minimal paths, all ties retained
    ShortestPath,
}

/// Maximum admissible path cost, in the same units as link cost.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Horizon {
    Steps(usize),
    /// derive the horizon from the longest finite shortest-path length
    LongestShortestPath,
}

/// The full path set of a network under one assignment strategy, along with
/// the OD pairs it induces.  Paths are stored both as node sequences and as
/// link-index sequences, canonically sorted on the latter.
#[derive(Clone, Debug)]
pub struct PathSet {
    pub strategy: AssignmentStrategy,
    pub tau_max: usize,
    pub paths: Vec<Vec<usize>>,
    pub path_links: Vec<Vec<usize>>,
    pub od_pairs: Vec<(usize, usize)>,
    pub origins: Vec<usize>,
    pub destinations: Vec<usize>,
}

impl PathSet {
    pub fn n_paths(&self) -> usize {
        return self.paths.len();
    }

    /// Position of `node` in the sorted origin list, if it is an origin.
    pub fn origin_index(&self, node: usize) -> Option<usize> {
        return self.origins.binary_search(&node).ok();
    }

    /// Indexes of the OD pairs departing from `origin`.
    pub fn od_indices_from_origin(&self, origin: usize) -> Vec<usize> {
        return self.od_pairs.iter().enumerate()
            .filter(|(_, od)| od.0 == origin)
            .map(|(od_idx, _)| od_idx)
            .collect();
    }

    /// Indexes of the paths serving the `od_idx`-th OD pair.
    pub fn path_indices_for_od(&self, od_idx: usize) -> Vec<usize> {
        let (origin, dest) = self.od_pairs[od_idx];
        return self.paths.iter().enumerate()
            .filter(|(_, pp)| pp[0] == origin && *pp.last().unwrap() == dest)
            .map(|(p_idx, _)| p_idx)
            .collect();
    }
}

/// Enumerates the admissible paths between every ordered node pair, converts
/// them to link-index sequences, filters them against the maximum admissible
/// cost, and projects out the OD pairs.  The horizon is shrunk to the longest
/// retained path when it was requested larger than that.
pub(crate) fn build_path_set(graph: &DiGraphMap<usize, usize>, costs: &[f64],
                             spl: &Array2<f64>, trees: &[ShortestPathTree], tau_max: usize,
                             strategy: AssignmentStrategy) -> Result<PathSet, NetGenError> {
    let n_nodes = trees.len();
    let mut node_paths: Vec<Vec<usize>> = vec![];
    match strategy {
        AssignmentStrategy::ShortestPath => {
            for tree in trees {
                for dest in 0..n_nodes {
                    if dest == tree.source || !tree.dist[dest].is_finite() {
                        continue;
                    }
                    node_paths.extend(backtrack_shortest_paths(tree, dest));
                }
            }
        }
        AssignmentStrategy::Random => {
            if tau_max > 0 {
                for (origin, dest) in iproduct!(0..n_nodes, 0..n_nodes) {
                    if origin == dest {
                        continue;
                    }
                    // a path of k links has k - 1 intermediate nodes
                    let found = all_simple_paths::<Vec<usize>, _>(
                        graph, origin, dest, 0, Some(tau_max - 1));
                    node_paths.extend(found);
                }
            }
        }
    }

    // store every path as its link-index sequence as well
    let mut pairs: Vec<(Vec<usize>, Vec<usize>)> = node_paths.into_iter().map(|path| {
        let link_seq: Vec<usize> = path.windows(2)
            .map(|ww| *graph.edge_weight(ww[0], ww[1]).unwrap())
            .collect();
        (link_seq, path)
    }).collect();

    // drop any path that exceeds the maximum admissible cost
    let cost_cap = match strategy {
        AssignmentStrategy::ShortestPath => {
            let spl_max = spl.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            spl_max.min(tau_max as f64)
        }
        AssignmentStrategy::Random => tau_max as f64,
    };
    pairs.retain(|(link_seq, _)| path_cost(link_seq, costs) <= cost_cap);
    if pairs.is_empty() {
        return Err(NetGenError::NoPaths);
    }
    pairs.sort();

    // shrink the horizon when no retained path reaches it
    let achieved = match strategy {
        AssignmentStrategy::Random => pairs.iter()
            .map(|(link_seq, _)| path_cost(link_seq, costs))
            .fold(f64::NEG_INFINITY, f64::max),
        AssignmentStrategy::ShortestPath => cost_cap,
    };
    let mut tau_max = tau_max;
    if tau_max as f64 > achieved.ceil() {
        tau_max = achieved.ceil() as usize;
        log::warn!("maximum path length tau_max changed to {}", tau_max);
    }

    let (path_links, paths): (Vec<Vec<usize>>, Vec<Vec<usize>>) = pairs.into_iter().unzip();

    // OD pairs and their projections onto origins and destinations
    let mut od_pairs: Vec<(usize, usize)> = paths.iter()
        .map(|pp| (pp[0], *pp.last().unwrap()))
        .collect();
    od_pairs.sort();
    od_pairs.dedup();
    let mut origins: Vec<usize> = od_pairs.iter().map(|od| od.0).collect();
    origins.sort();
    origins.dedup();
    let mut destinations: Vec<usize> = od_pairs.iter().map(|od| od.1).collect();
    destinations.sort();
    destinations.dedup();

    Ok(PathSet { strategy, tau_max, paths, path_links, od_pairs, origins, destinations })
}

/// Walks the predecessor lists back from `dest`; every branch taken is a
/// distinct cost-minimal path from the tree's source.
fn backtrack_shortest_paths(tree: &ShortestPathTree, dest: usize) -> Vec<Vec<usize>> {
    let mut complete = vec![];
    let mut stack = vec![vec![dest]];
    while let Some(partial) = stack.pop() {
        let last = *partial.last().unwrap();
        if last == tree.source {
            let mut path = partial;
            path.reverse();
            complete.push(path);
            continue;
        }
        for &pred in &tree.preds[last] {
            let mut extended = partial.clone();
            extended.push(pred);
            stack.push(extended);
        }
    }
    return complete;
}

fn path_cost(link_seq: &[usize], costs: &[f64]) -> f64 {
    return link_seq.iter().map(|&ll| costs[ll]).sum();
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{CostMode, GridKind, Network};

    #[test]
    fn test_random_paths_on_uni_grid() {
        // 0 -> 1
        // |    |
        // v    v
        // 2 -> 3
        let mut net = Network::grid(GridKind::Unidirectional, 2, 2, Some(7)).unwrap();
        net.assign_link_costs(CostMode::Rigid).unwrap();
        net.find_all_paths(Horizon::Steps(4), AssignmentStrategy::Random).unwrap();
        let path_set = net.path_set().unwrap();
        assert_eq!(path_set.n_paths(), 6);
        assert_eq!(path_set.od_pairs,
                   vec![(0, 1), (0, 2), (0, 3), (1, 3), (2, 3)]);
        assert_eq!(path_set.origins, vec![0, 1, 2]);
        assert_eq!(path_set.destinations, vec![1, 2, 3]);
        // the longest retained path has two links, so the horizon shrinks
        assert_eq!(path_set.tau_max, 2);
        // link-index sequences come out in canonical order
        for ww in path_set.path_links.windows(2) {
            assert!(ww[0] <= ww[1]);
        }
    }

    #[test]
    fn test_shortest_path_ties_are_kept() {
        let nodes = vec![0, 1, 2, 3];
        let links = vec![(0, 1), (0, 2), (1, 3), (2, 3)];
        let mut net = Network::from_parts(nodes, links, Some(3)).unwrap();
        net.assign_link_costs(CostMode::Explicit(vec![1., 1., 1., 1.])).unwrap();
        net.find_all_paths(Horizon::Steps(4), AssignmentStrategy::ShortestPath).unwrap();
        let path_set = net.path_set().unwrap();
        let od_idx = path_set.od_pairs.iter().position(|&od| od == (0, 3)).unwrap();
        assert_eq!(path_set.path_indices_for_od(od_idx).len(), 2);
    }

    #[test]
    fn test_derived_horizon() {
        let nodes = vec![0, 1, 2];
        let links = vec![(0, 1), (1, 2)];
        let mut net = Network::from_parts(nodes, links, Some(1)).unwrap();
        net.assign_link_costs(CostMode::Explicit(vec![1.5, 1.2])).unwrap();
        net.find_all_paths(Horizon::LongestShortestPath, AssignmentStrategy::ShortestPath)
           .unwrap();
        // the longest shortest path costs 2.7, so tau_max = ceil(2.7)
        assert_eq!(net.path_set().unwrap().tau_max, 3);
    }

    #[test]
    fn test_horizon_below_min_cost_fails_for_fixed_costs() {
        let nodes = vec![0, 1];
        let links = vec![(0, 1)];
        let mut net = Network::from_parts(nodes, links, Some(1)).unwrap();
        net.assign_link_costs(CostMode::Explicit(vec![2.0])).unwrap();
        let res = net.find_all_paths(Horizon::Steps(1), AssignmentStrategy::Random);
        assert!(matches!(res, Err(NetGenError::HorizonTooSmall { .. })));
    }

    #[test]
    fn test_shortest_paths_match_spl_matrix() {
        let mut net = Network::grid(GridKind::Bidirectional, 3, 3, Some(11)).unwrap();
        net.assign_link_costs(CostMode::Real).unwrap();
        net.find_all_paths(Horizon::Steps(4), AssignmentStrategy::ShortestPath).unwrap();
        let spl = net.spl_matrix().unwrap().clone();
        let costs = net.costs().to_vec();
        let path_set = net.path_set().unwrap();
        for (p_idx, path) in path_set.paths.iter().enumerate() {
            let origin = path[0];
            let dest = *path.last().unwrap();
            let cost: f64 = path_set.path_links[p_idx].iter().map(|&ll| costs[ll]).sum();
            assert_eq!(cost, spl[[dest, origin]]);
        }
    }
}
