use ndarray::prelude::*;
use rand::Rng;
use rand_isaac::Isaac64Rng;

use super::paths::PathSet;
use super::NetGenError;


/// How the random split proportions are drawn.
#[derive(Clone, Debug, PartialEq)]
pub enum ProportionMode {
    /// Path weights drawn as 2 + U[0,1) and normalised globally; OD- and
    /// origin-level proportions are the conditional marginals of those path
    /// probabilities.  Every proportion on the support is strictly positive,
    /// and chaining origin -> OD -> path reproduces each path's globally
    /// normalised weight within its origin.
    Matched,
    /// Each proportion row drawn directly as random integer weights in
    /// [min_weight, max_weight), rejecting all-zero rows.  No cross-level
    /// consistency is enforced.
    Independent { min_weight: u32, max_weight: u32 },
}

impl Default for ProportionMode {
    fn default() -> ProportionMode {
        return ProportionMode::Matched;
    }
}

/// Row-stochastic split proportions at the two hierarchy levels: origin flow
/// over the origin's OD pairs, and OD flow over the OD pair's paths.
#[derive(Clone, Debug)]
pub struct Proportions {
    pub o_od: Array2<f64>,
    pub od_path: Array2<f64>,
}

pub(crate) fn generate_proportions(path_set: &PathSet, rng: &mut Isaac64Rng,
                                   mode: &ProportionMode) -> Result<Proportions, NetGenError> {
    let n_paths = path_set.n_paths();
    let n_ods = path_set.od_pairs.len();
    let n_origins = path_set.origins.len();
    let mut o_od = Array::zeros((n_origins, n_ods));
    let mut od_path = Array::zeros((n_ods, n_paths));

    match mode {
        ProportionMode::Matched => {
            let mut path_weights: Vec<f64> = (0..n_paths).map(|_| 2. + rng.gen::<f64>())
                                                         .collect();
            let total: f64 = path_weights.iter().sum();
            for ww in &mut path_weights {
                *ww /= total;
            }
            // distribution of each OD flow over its path flows
            let mut od_probs = vec![0.; n_ods];
            for od_idx in 0..n_ods {
                let p_idxs = path_set.path_indices_for_od(od_idx);
                let od_total: f64 = p_idxs.iter().map(|&p_idx| path_weights[p_idx]).sum();
                od_probs[od_idx] = od_total;
                for &p_idx in &p_idxs {
                    od_path[[od_idx, p_idx]] = path_weights[p_idx] / od_total;
                }
            }
            // distribution of each origin flow over its OD flows
            for (o_idx, &origin) in path_set.origins.iter().enumerate() {
                let od_idxs = path_set.od_indices_from_origin(origin);
                let o_total: f64 = od_idxs.iter().map(|&od_idx| od_probs[od_idx]).sum();
                for &od_idx in &od_idxs {
                    o_od[[o_idx, od_idx]] = od_probs[od_idx] / o_total;
                }
            }
        }
        ProportionMode::Independent { min_weight, max_weight } => {
            // the draw range must be non-empty and must contain a nonzero value,
            // or the rejection loop below could never terminate
            if min_weight >= max_weight || *max_weight < 2 {
                return Err(NetGenError::InvalidWeightRange {
                    min: *min_weight,
                    max: *max_weight,
                });
            }
            for (o_idx, &origin) in path_set.origins.iter().enumerate() {
                let od_idxs = path_set.od_indices_from_origin(origin);
                let weights = draw_nonzero_weights(rng, od_idxs.len(), *min_weight, *max_weight);
                let total: f64 = weights.iter().map(|&ww| ww as f64).sum();
                for (ii, &od_idx) in od_idxs.iter().enumerate() {
                    o_od[[o_idx, od_idx]] = weights[ii] as f64 / total;
                }
            }
            for od_idx in 0..n_ods {
                let p_idxs = path_set.path_indices_for_od(od_idx);
                let weights = draw_nonzero_weights(rng, p_idxs.len(), *min_weight, *max_weight);
                let total: f64 = weights.iter().map(|&ww| ww as f64).sum();
                for (ii, &p_idx) in p_idxs.iter().enumerate() {
                    od_path[[od_idx, p_idx]] = weights[ii] as f64 / total;
                }
            }
        }
    }
    Ok(Proportions { o_od, od_path })
}

fn draw_nonzero_weights(rng: &mut Isaac64Rng, count: usize, min_weight: u32, max_weight: u32)
                        -> Vec<u32> {
    loop {
        let draw: Vec<u32> = (0..count).map(|_| rng.gen_range(min_weight..max_weight)).collect();
        if draw.iter().any(|&ww| ww > 0) {
            return draw;
        }
    }
}
