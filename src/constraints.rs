// derivation of the boolean/integer constraint masks consumed by the
// external solver: observability (c3), speed/reachability support (c4), flow
// conservation (c5) and duplicate counts over multi-step links (c7).
use itertools::iproduct;
use ndarray::prelude::*;
use ndarray::concatenate;

use super::assignment::FlowMatrices;
use super::network::Network;
use super::paths::AssignmentStrategy;
use super::proportions::ProportionMode;
use super::NetGenError;


/// Constraint masks for the time-collapsed model.  All matrices are keyed by
/// link index against origin index or node id.
#[derive(Clone, Debug)]
pub struct SingleStepConstraints {
    /// link departs directly from that origin; outflow over these cells sums to 1
    pub c3: Array2<bool>,
    /// cells structurally permitted to carry flow
    pub c4: Array2<bool>,
    /// link flows into the node
    pub c5_in_edges: Array2<bool>,
    /// link flows out of the node
    pub c5_out_edges: Array2<bool>,
    /// (origin, node) combinations valid for the inflow side of conservation
    pub c5_in_check: Array2<bool>,
    /// (origin, node) combinations valid for the outflow side of conservation
    pub c5_out_check: Array2<bool>,
}

/// Constraint masks for the multi-step model.  The time dimension is
/// concatenated into the entity dimension, so `c3` and `c4` are
/// link-by-(origin x tau_max) and the check masks are
/// (origin x tau_max)-by-node, matching the concatenated `p_ms` layout.
#[derive(Clone, Debug)]
pub struct MultiStepConstraints {
    pub c3: Array2<bool>,
    pub c4: Array2<bool>,
    pub c5_in_edges: Array2<bool>,
    pub c5_out_edges: Array2<bool>,
    pub c5_in_check: Array2<bool>,
    pub c5_out_check: Array2<bool>,
    /// only derivable under shortest-path assignment
    pub c7: Option<LinkTransitSteps>,
}

/// Per (link, origin): the step during which origin flow enters the link and
/// the step during which it reaches the link's end.  Only recorded when the
/// exit step falls strictly after the entry step and within the horizon; the
/// flow value must stay constant over every step in between.
#[derive(Clone, Debug)]
pub struct LinkTransitSteps {
    pub enter_step: Array2<i64>,
    pub exit_step: Array2<i64>,
}

/// Generates the constraint masks for the time-collapsed model of `net`.
pub fn single_step_constraints(net: &mut Network) -> Result<SingleStepConstraints, NetGenError> {
    net.flows()?;
    // c4: an independent second draw with strictly positive proportions marks
    // every cell that can structurally carry flow
    let flows2 = support_draw(net)?;
    let flows = net.flows()?;
    if flows2.p == flows.p {
        log::warn!("support draw produced an identical assignment matrix P");
    }
    let c4 = flows2.p.mapv(|vv| vv > 0.);

    let path_set = net.path_set()?;
    let links = net.links();
    let n_nodes = net.nodes().len();
    let n_links = links.len();
    let n_origins = path_set.origins.len();

    // c3: links leaving each origin directly
    let mut c3 = Array::from_elem((n_links, n_origins), false);
    for (l_idx, &(tail, _)) in links.iter().enumerate() {
        if let Some(o_idx) = path_set.origin_index(tail) {
            c3[[l_idx, o_idx]] = true;
        }
    }

    let (c5_in_edges, c5_out_edges) = edge_incidence(links, n_nodes);
    if n_origins < n_nodes {
        log::warn!("fewer origins than nodes in the network, check this is expected");
    }
    let mut c5_in_check = Array::from_elem((n_origins, n_nodes), false);
    let mut c5_out_check = Array::from_elem((n_origins, n_nodes), false);
    for (o_idx, &origin) in path_set.origins.iter().enumerate() {
        for node in 0..n_nodes {
            if origin != node {
                c5_in_check[[o_idx, node]] = true;
                c5_out_check[[o_idx, node]] = true;
            }
        }
    }

    Ok(SingleStepConstraints { c3, c4, c5_in_edges, c5_out_edges, c5_in_check, c5_out_check })
}

/// Generates the constraint masks for the multi-step model of `net`.
pub fn multi_step_constraints(net: &mut Network) -> Result<MultiStepConstraints, NetGenError> {
    net.flows()?;
    net.path_assignment()?;
    let flows2 = support_draw(net)?;
    let flows = net.flows()?;
    if flows2.p_ms == flows.p_ms {
        log::warn!("support draw produced an identical assignment matrix P_ms");
    }

    let path_set = net.path_set()?;
    let expanded = net.path_assignment()?;
    let links = net.links();
    let n_nodes = net.nodes().len();
    let n_links = links.len();
    let n_origins = path_set.origins.len();
    let tau_max = path_set.tau_max;

    // c3: only the first step needs marking; c4 takes care of later steps
    let mut c3_ms: Vec<Array2<bool>> =
        (0..tau_max).map(|_| Array::from_elem((n_links, n_origins), false)).collect();
    for (l_idx, &(tail, _)) in links.iter().enumerate() {
        if let Some(o_idx) = path_set.origin_index(tail) {
            c3_ms[0][[l_idx, o_idx]] = true;
        }
    }

    let c4_ms: Vec<Array2<bool>> = flows2.p_ms.iter().map(|pp| pp.mapv(|vv| vv > 0.)).collect();

    let (c5_in_edges, c5_out_edges) = edge_incidence(links, n_nodes);
    if n_origins < n_nodes {
        log::warn!("fewer origins than nodes in the network, check this is expected");
    }
    let mut in_check_ms: Vec<Array2<bool>> =
        (0..tau_max).map(|_| Array::from_elem((n_origins, n_nodes), false)).collect();
    let mut out_check_ms: Vec<Array2<bool>> =
        (0..tau_max).map(|_| Array::from_elem((n_origins, n_nodes), false)).collect();

    let mut c7 = None;
    match path_set.strategy {
        AssignmentStrategy::Random => {
            for (o_idx, &origin) in path_set.origins.iter().enumerate() {
                for node in 0..n_nodes {
                    if origin == node {
                        continue;
                    }
                    for tau in 0..tau_max.saturating_sub(1) {
                        in_check_ms[tau][[o_idx, node]] = true;
                    }
                    for tau in 1..tau_max {
                        out_check_ms[tau][[o_idx, node]] = true;
                    }
                }
            }
        }
        AssignmentStrategy::ShortestPath => {
            // conservation only needs checking at the arrival and departure
            // steps the time windows pin down; c4 zeroes out the rest
            for (o_idx, &origin) in path_set.origins.iter().enumerate() {
                for node in 0..n_nodes {
                    if origin == node {
                        continue;
                    }
                    let arr_tau = expanded.t_minus[[node, origin]] - 1.;
                    let dep_tau = expanded.t_plus[[node, origin]] - 1.;
                    if arr_tau >= 0. && dep_tau >= 0.
                        && arr_tau < tau_max as f64 && dep_tau < tau_max as f64
                        && arr_tau <= dep_tau {
                        in_check_ms[arr_tau as usize][[o_idx, node]] = true;
                        out_check_ms[dep_tau as usize][[o_idx, node]] = true;
                    }
                }
            }

            // c7: the step each origin flow enters a link and the step it
            // reaches the link's end
            let mut enter_step = Array2::<i64>::zeros((n_links, n_origins));
            let mut exit_step = Array2::<i64>::zeros((n_links, n_origins));
            for (l_idx, o_idx) in iproduct!(0..n_links, 0..n_origins) {
                let (tail, head) = links[l_idx];
                let origin = path_set.origins[o_idx];
                let enter = expanded.t_plus[[tail, origin]] - 1.;
                let exit = expanded.t_minus[[head, origin]] - 1.;
                if exit < (tau_max - 1) as f64 && exit > enter {
                    enter_step[[l_idx, o_idx]] = enter as i64;
                    exit_step[[l_idx, o_idx]] = exit as i64;
                }
            }
            c7 = Some(LinkTransitSteps { enter_step, exit_step });
        }
    }

    Ok(MultiStepConstraints {
        c3: hstack_steps(&c3_ms),
        c4: hstack_steps(&c4_ms),
        c5_in_edges,
        c5_out_edges,
        c5_in_check: vstack_steps(&in_check_ms),
        c5_out_check: vstack_steps(&out_check_ms),
        c7,
    })
}

/// Recomputes the assignment on an independent copy of the network, with
/// fresh strictly-positive proportions.  Where flow is allowed at all, this
/// draw puts a strictly positive value, so its support is the structural one.
fn support_draw(net: &mut Network) -> Result<FlowMatrices, NetGenError> {
    let mut net2 = net.duplicate();
    net2.generate_random_proportions(&ProportionMode::Matched)?;
    net2.compute_assignment_matrix()?;
    let flows = net2.flows()?;
    return Ok(flows.clone());
}

fn edge_incidence(links: &[(usize, usize)], n_nodes: usize) -> (Array2<bool>, Array2<bool>) {
    let mut in_edges = Array::from_elem((links.len(), n_nodes), false);
    let mut out_edges = Array::from_elem((links.len(), n_nodes), false);
    for (l_idx, &(tail, head)) in links.iter().enumerate() {
        in_edges[[l_idx, head]] = true;
        out_edges[[l_idx, tail]] = true;
    }
    return (in_edges, out_edges);
}

/// Concatenates per-step matrices along the column axis, giving the
/// link-by-(entity x tau_max) layout the solver consumes.
pub(crate) fn hstack_steps<A: Clone>(step_mats: &[Array2<A>]) -> Array2<A> {
    let views: Vec<ArrayView2<A>> = step_mats.iter().map(|mm| mm.view()).collect();
    return concatenate(Axis(1), &views).unwrap();
}

/// Concatenates per-step matrices along the row axis, for the
/// (entity x tau_max)-by-node check masks.
pub(crate) fn vstack_steps<A: Clone>(step_mats: &[Array2<A>]) -> Array2<A> {
    let views: Vec<ArrayView2<A>> = step_mats.iter().map(|mm| mm.view()).collect();
    return concatenate(Axis(0), &views).unwrap();
}
