// time expansion of the path set into per-step link occupancy indicators,
// and aggregation of those indicators through the proportion tree into the
// per-step link-by-OD and link-by-origin flow matrices.
use ndarray::prelude::*;

use super::paths::{AssignmentStrategy, PathSet};
use super::proportions::Proportions;
use super::NetGenError;


/// The deterministic part of the assignment: per-time-step link-by-path
/// occupancy indicators, their time-collapsed sum, the earliest-arrival and
/// latest-departure step matrices, and the link-multiplicity factors.
///
/// `t_minus` and `t_plus` are only meaningful under the shortest-path
/// strategy; under random assignment they stay all-zero, mirroring that no
/// node-level timing is derived there.
#[derive(Clone, Debug)]
pub struct PathAssignment {
    pub delta_ms: Vec<Array2<f64>>,
    pub delta: Array2<f64>,
    pub t_minus: Array2<f64>,
    pub t_plus: Array2<f64>,
    pub lc: Array2<f64>,
}

/// The randomised part of the assignment: per-step and time-collapsed flow
/// fractions over links, by OD pair (`a`) and by origin (`p`).
#[derive(Clone, Debug)]
pub struct FlowMatrices {
    pub a_ms: Vec<Array2<f64>>,
    pub a: Array2<f64>,
    pub p_ms: Vec<Array2<f64>>,
    pub p: Array2<f64>,
}

/// Expands every path into its per-time-step link occupancy.
///
/// Under random assignment a path occupies its k-th link during step k, which
/// is only meaningful when every link takes exactly one step to traverse --
/// hence the rigid-cost precondition.  Under shortest-path assignment
/// occupancy is decided from the node-level time windows instead: a unit of
/// flow leaving origin `o` occupies link (i, j) during step tau whenever
/// tau + 1 lies in [T_plus[i, o], T_minus[j, o]], the contiguous interval
/// between its latest departure from i and its earliest arrival at j.
pub(crate) fn expand_paths(links: &[(usize, usize)], costs: &[f64], spl: &Array2<f64>,
                           path_set: &PathSet) -> Result<PathAssignment, NetGenError> {
    let n_links = links.len();
    let n_paths = path_set.n_paths();
    let n_nodes = spl.nrows();
    let n_origins = path_set.origins.len();
    let tau_max = path_set.tau_max;
    let mut delta_ms: Vec<Array2<f64>> =
        (0..tau_max).map(|_| Array::zeros((n_links, n_paths))).collect();

    let (t_minus, t_plus, lc) = match path_set.strategy {
        AssignmentStrategy::Random => {
            if costs.iter().any(|&cc| cc != 1.) {
                return Err(NetGenError::NonRigidCosts);
            }
            for (p_idx, link_seq) in path_set.path_links.iter().enumerate() {
                for (tau, &l_idx) in link_seq.iter().enumerate() {
                    delta_ms[tau][[l_idx, p_idx]] = 1.;
                }
            }
            (Array::zeros((n_nodes, n_nodes)), Array::zeros((n_nodes, n_nodes)),
             Array::ones((n_links, n_origins)))
        }
        AssignmentStrategy::ShortestPath => {
            let tm = spl.mapv(f64::ceil);
            let tp = spl.mapv(|ff| (ff + 1.).floor());

            // steps a unit of origin flow spends traversing each link
            let mut lc_arr = Array::zeros((n_links, n_origins));
            for (l_idx, &(tail, head)) in links.iter().enumerate() {
                for (o_idx, &origin) in path_set.origins.iter().enumerate() {
                    lc_arr[[l_idx, o_idx]] =
                        if tp[[tail, origin]].is_finite() && tp[[head, origin]].is_finite() {
                            (tm[[head, origin]] - tp[[tail, origin]] + 1.).max(1.)
                        } else {
                            1.
                        };
                }
            }

            for (p_idx, link_seq) in path_set.path_links.iter().enumerate() {
                let origin = links[link_seq[0]].0;
                for &l_idx in link_seq {
                    let (tail, head) = links[l_idx];
                    if !tm[[head, origin]].is_finite() {
                        continue;
                    }
                    for tau in 0..tau_max {
                        let step = (tau + 1) as f64;
                        if step >= tp[[tail, origin]] && step <= tm[[head, origin]] {
                            delta_ms[tau][[l_idx, p_idx]] = 1.;
                        }
                    }
                }
            }
            (tm, tp, lc_arr)
        }
    };

    // the single-step path assignment matrix is the sum over the steps
    let mut delta = Array::zeros((n_links, n_paths));
    for dd in &delta_ms {
        delta += dd;
    }
    Ok(PathAssignment { delta_ms, delta, t_minus, t_plus, lc })
}

/// Weights the per-step occupancy indicators by the proportion tree: each OD
/// column of `a_ms` collects its paths' indicators scaled by the OD-to-path
/// proportion, and each origin column of `p_ms` collects its OD columns
/// scaled by the origin-to-OD proportion.
pub(crate) fn aggregate_flows(path_set: &PathSet, expanded: &PathAssignment,
                              props: &Proportions) -> FlowMatrices {
    let n_links = expanded.delta.nrows();
    let n_ods = path_set.od_pairs.len();
    let n_origins = path_set.origins.len();
    let tau_max = path_set.tau_max;

    let mut a_ms: Vec<Array2<f64>> = (0..tau_max).map(|_| Array::zeros((n_links, n_ods)))
                                                 .collect();
    for od_idx in 0..n_ods {
        for p_idx in path_set.path_indices_for_od(od_idx) {
            let weight = props.od_path[[od_idx, p_idx]];
            for tau in 0..tau_max {
                a_ms[tau].column_mut(od_idx)
                         .scaled_add(weight, &expanded.delta_ms[tau].column(p_idx));
            }
        }
    }

    let mut p_ms: Vec<Array2<f64>> = (0..tau_max).map(|_| Array::zeros((n_links, n_origins)))
                                                 .collect();
    for (o_idx, &origin) in path_set.origins.iter().enumerate() {
        for od_idx in path_set.od_indices_from_origin(origin) {
            let weight = props.o_od[[o_idx, od_idx]];
            for tau in 0..tau_max {
                p_ms[tau].column_mut(o_idx).scaled_add(weight, &a_ms[tau].column(od_idx));
            }
        }
    }

    let mut aa = Array::zeros((n_links, n_ods));
    for mm in &a_ms {
        aa += mm;
    }
    let mut pp = Array::zeros((n_links, n_origins));
    for mm in &p_ms {
        pp += mm;
    }
    return FlowMatrices { a_ms, a: aa, p_ms, p: pp };
}

/// Convolves a multi-step assignment matrix sequence with a time series of
/// flow vectors.  `tau_max - 1` zero vectors are prepended to the series, so
/// the result has one link-flow vector per input sample.  This is the forward
/// model whose inverse the external solver computes.
pub fn convolve_flows(m_ms: &[Array2<f64>], flows: &[Array1<f64>]) -> Vec<Array1<f64>> {
    let n_t = flows.len();
    let tau_max = m_ms.len();
    if n_t == 0 || tau_max == 0 {
        return vec![];
    }
    let n_entities = flows[0].len();
    let n_links = m_ms[0].nrows();
    let mut padded: Vec<Array1<f64>> = (0..tau_max - 1).map(|_| Array::zeros(n_entities))
                                                       .collect();
    padded.extend(flows.iter().cloned());
    return (0..n_t).map(|tt| {
        let mut out = Array::zeros(n_links);
        for (tau, mm) in m_ms.iter().enumerate() {
            out += &mm.dot(&padded[tt + tau_max - 1 - tau]);
        }
        out
    }).collect();
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{CostMode, Network};
    use crate::paths::Horizon;

    fn line_net(costs: CostMode, horizon: Horizon, strategy: AssignmentStrategy) -> Network {
        let mut net = Network::from_parts(vec![0, 1, 2], vec![(0, 1), (1, 2)], Some(9)).unwrap();
        net.assign_link_costs(costs).unwrap();
        net.find_all_paths(horizon, strategy).unwrap();
        net.compute_path_assignment_matrix().unwrap();
        return net;
    }

    #[test]
    fn test_random_expansion_on_line() {
        let net = line_net(CostMode::Rigid, Horizon::Steps(2), AssignmentStrategy::Random);
        let path_set = net.path_set().unwrap();
        // canonical order: [0], [0, 1], [1]
        assert_eq!(path_set.path_links, vec![vec![0], vec![0, 1], vec![1]]);
        let expanded = net.path_assignment().unwrap();
        assert_eq!(expanded.delta_ms.len(), 2);
        assert_eq!(expanded.delta_ms[0],
                   ndarray::arr2(&[[1., 1., 0.], [0., 0., 1.]]));
        assert_eq!(expanded.delta_ms[1],
                   ndarray::arr2(&[[0., 0., 0.], [0., 1., 0.]]));
        assert_eq!(expanded.delta, ndarray::arr2(&[[1., 1., 0.], [0., 1., 1.]]));
        assert!(expanded.lc.iter().all(|&cc| cc == 1.));
    }

    #[test]
    fn test_random_expansion_requires_rigid_costs() {
        let mut net = Network::from_parts(vec![0, 1, 2], vec![(0, 1), (1, 2)], Some(9)).unwrap();
        net.assign_link_costs(CostMode::Explicit(vec![1., 0.5])).unwrap();
        net.find_all_paths(Horizon::Steps(2), AssignmentStrategy::Random).unwrap();
        assert!(matches!(net.compute_path_assignment_matrix(),
                         Err(NetGenError::NonRigidCosts)));
    }

    #[test]
    fn test_shortest_path_windows_on_line() {
        let net = line_net(CostMode::Explicit(vec![1.5, 1.2]), Horizon::LongestShortestPath,
                           AssignmentStrategy::ShortestPath);
        let expanded = net.path_assignment().unwrap();
        // F[1,0] = 1.5, F[2,0] = 2.7, F[2,1] = 1.2
        assert_eq!(expanded.t_minus[[1, 0]], 2.);
        assert_eq!(expanded.t_minus[[2, 0]], 3.);
        assert_eq!(expanded.t_plus[[1, 0]], 2.);
        assert_eq!(expanded.t_plus[[2, 0]], 3.);
        assert_eq!(expanded.t_plus[[0, 1]], f64::INFINITY);

        // origins are [0, 1]; flow from 0 spends two steps on each link
        assert_eq!(expanded.lc[[0, 0]], 2.);
        assert_eq!(expanded.lc[[1, 0]], 2.);
        // link 0 cannot be reached from origin 1
        assert_eq!(expanded.lc[[0, 1]], 1.);
        assert_eq!(expanded.lc[[1, 1]], 2.);

        // the two-link path from 0 occupies link 0 during steps 0-1 and
        // link 1 during steps 1-2
        let path_set = net.path_set().unwrap();
        assert_eq!(path_set.path_links, vec![vec![0], vec![0, 1], vec![1]]);
        assert_eq!(path_set.tau_max, 3);
        assert_eq!(expanded.delta_ms[0][[0, 1]], 1.);
        assert_eq!(expanded.delta_ms[1][[0, 1]], 1.);
        assert_eq!(expanded.delta_ms[2][[0, 1]], 0.);
        assert_eq!(expanded.delta_ms[0][[1, 1]], 0.);
        assert_eq!(expanded.delta_ms[1][[1, 1]], 1.);
        assert_eq!(expanded.delta_ms[2][[1, 1]], 1.);
    }

    #[test]
    fn test_aggregated_flows_leave_origin_once() {
        let mut net = line_net(CostMode::Rigid, Horizon::Steps(2), AssignmentStrategy::Random);
        net.generate_random_proportions(&Default::default()).unwrap();
        net.compute_assignment_matrix().unwrap();
        let flows = net.flows().unwrap();
        // all flow from origin 0 leaves over link 0 at step 0
        assert_eq!(flows.p_ms[0][[0, 0]], 1.);
        assert_eq!(flows.p_ms[0][[1, 0]], 0.);
        // all flow from origin 1 leaves over link 1 at step 0
        assert_eq!(flows.p_ms[0][[1, 1]], 1.);
    }

    #[test]
    fn test_convolution_pads_history() {
        let m_ms = vec![
            ndarray::arr2(&[[1., 0.], [0., 1.]]),
            ndarray::arr2(&[[0., 2.], [0., 0.]]),
        ];
        let flows = vec![ndarray::arr1(&[1., 1.]), ndarray::arr1(&[0., 3.])];
        let out = convolve_flows(&m_ms, &flows);
        assert_eq!(out.len(), 2);
        // sample 0 sees only the current flows through step 0 of the kernel
        assert_eq!(out[0], ndarray::arr1(&[1., 1.]));
        // sample 1 adds the step-1 contribution of the previous flows
        assert_eq!(out[1], ndarray::arr1(&[0. + 2., 3.]));
    }
}
