// writes the finalized network description, assignment draws and constraint
// masks as CSV files, the form consumed by the external optimisation routine.
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::prelude::*;

use super::constraints;
use super::constraints::hstack_steps;
use super::network::Network;
use super::paths::AssignmentStrategy;
use super::proportions::ProportionMode;
use super::NetGenError;


/// Whether the exported model is time-collapsed or time-expanded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepMode {
    Single,
    Multi,
}

/// Serializes a fully computed network for the external solver: index lists
/// (1-based on the solver side), the horizon and strategy flags, the
/// link-multiplicity matrix, the constraint mask bundle, and repeated
/// independent draws of the origin-flow assignment.
pub struct SolverExporter {
    out_dir: PathBuf,
    step: StepMode,
    trials: usize,
}

impl SolverExporter {
    pub fn new(out_dir: &Path, step: StepMode, trials: usize) -> SolverExporter {
        return SolverExporter { out_dir: out_dir.to_path_buf(), step, trials };
    }

    pub fn export(&self, net: &mut Network) -> Result<(), NetGenError> {
        fs::create_dir_all(&self.out_dir)?;
        let path_set = net.path_set()?;
        let expanded = net.path_assignment()?;

        let is_shortest = path_set.strategy == AssignmentStrategy::ShortestPath;
        self.write_rows("shortest_path", vec![vec![is_shortest as u8]])?;
        self.write_rows("trials", vec![vec![self.trials]])?;
        self.write_rows("tau_max", vec![vec![path_set.tau_max]])?;

        // index lists are 1-based on the solver side
        self.write_rows("o_list", path_set.origins.iter().map(|&oo| vec![oo + 1]).collect())?;
        self.write_rows("e_list",
                        net.links().iter().map(|&(tail, head)| vec![tail + 1, head + 1])
                           .collect())?;
        self.write_rows("od_list",
                        path_set.od_pairs.iter().map(|&(oo, dd)| vec![oo + 1, dd + 1])
                           .collect())?;
        self.write_matrix("lc", &expanded.lc)?;

        self.export_flow_draws(net, "P_target")?;
        self.export_flow_draws(net, "P_initialise")?;
        self.export_constraints(net)?;
        log::info!("wrote solver inputs to {}", self.out_dir.display());
        Ok(())
    }

    /// One independent proportion draw and assignment recomputation per
    /// trial; each trial's origin-flow matrix lands in its own file.
    fn export_flow_draws(&self, net: &mut Network, name: &str) -> Result<(), NetGenError> {
        for trial in 0..self.trials {
            net.generate_random_proportions(&ProportionMode::default())?;
            net.compute_assignment_matrix()?;
            let flows = net.flows()?;
            let matrix = match self.step {
                StepMode::Single => flows.p.clone(),
                StepMode::Multi => hstack_steps(&flows.p_ms),
            };
            self.write_matrix(&format!("{}_{}", name, trial), &matrix)?;
        }
        Ok(())
    }

    fn export_constraints(&self, net: &mut Network) -> Result<(), NetGenError> {
        match self.step {
            StepMode::Single => {
                let cons = constraints::single_step_constraints(net)?;
                self.write_bool_matrix("c3", &cons.c3)?;
                self.write_bool_matrix("c4", &cons.c4)?;
                self.write_bool_matrix("c5_in_edges", &cons.c5_in_edges)?;
                self.write_bool_matrix("c5_in_check", &cons.c5_in_check)?;
                self.write_bool_matrix("c5_out_edges", &cons.c5_out_edges)?;
                self.write_bool_matrix("c5_out_check", &cons.c5_out_check)?;
            }
            StepMode::Multi => {
                let cons = constraints::multi_step_constraints(net)?;
                self.write_bool_matrix("c3", &cons.c3)?;
                self.write_bool_matrix("c4", &cons.c4)?;
                self.write_bool_matrix("c5_in_edges", &cons.c5_in_edges)?;
                self.write_bool_matrix("c5_in_check", &cons.c5_in_check)?;
                self.write_bool_matrix("c5_out_edges", &cons.c5_out_edges)?;
                self.write_bool_matrix("c5_out_check", &cons.c5_out_check)?;
                if let Some(c7) = &cons.c7 {
                    self.write_int_matrix("c7_enter_link", &c7.enter_step)?;
                    self.write_int_matrix("c7_end_link", &c7.exit_step)?;
                }
            }
        }
        Ok(())
    }

    fn write_matrix(&self, name: &str, matrix: &Array2<f64>) -> Result<(), NetGenError> {
        return self.write_rows(name, matrix.rows().into_iter().map(|rr| rr.to_vec()).collect());
    }

    fn write_bool_matrix(&self, name: &str, matrix: &Array2<bool>) -> Result<(), NetGenError> {
        // masks are serialized as 0/1
        let rows = matrix.rows().into_iter()
            .map(|rr| rr.iter().map(|&bb| bb as u8).collect())
            .collect();
        return self.write_rows(name, rows);
    }

    fn write_int_matrix(&self, name: &str, matrix: &Array2<i64>) -> Result<(), NetGenError> {
        return self.write_rows(name, matrix.rows().into_iter().map(|rr| rr.to_vec()).collect());
    }

    fn write_rows<T: ToString>(&self, name: &str, rows: Vec<Vec<T>>) -> Result<(), NetGenError> {
        let path = self.out_dir.join(format!("{}.csv", name));
        let mut writer = csv::Writer::from_path(&path)?;
        for row in rows {
            writer.write_record(row.iter().map(|vv| vv.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::network::{CostMode, GridKind};
    use crate::paths::Horizon;

    fn ready_net() -> Network {
        let mut net = Network::grid(GridKind::Unidirectional, 2, 2, Some(31)).unwrap();
        net.assign_link_costs(CostMode::Rigid).unwrap();
        net.find_all_paths(Horizon::Steps(4), AssignmentStrategy::Random).unwrap();
        net.compute_path_assignment_matrix().unwrap();
        net.generate_random_proportions(&ProportionMode::Matched).unwrap();
        net.compute_assignment_matrix().unwrap();
        return net;
    }

    fn read_csv(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new().has_headers(false)
                                                  .from_path(path).unwrap();
        return reader.records()
            .map(|rec| rec.unwrap().iter().map(String::from).collect())
            .collect();
    }

    #[test]
    fn test_single_step_export() {
        let dir = tempdir().unwrap();
        let mut net = ready_net();
        let exporter = SolverExporter::new(dir.path(), StepMode::Single, 2);
        exporter.export(&mut net).unwrap();

        for name in &["shortest_path", "trials", "tau_max", "o_list", "e_list", "od_list",
                      "lc", "P_target_0", "P_target_1", "P_initialise_0", "P_initialise_1",
                      "c3", "c4", "c5_in_edges", "c5_in_check", "c5_out_edges",
                      "c5_out_check"] {
            assert!(dir.path().join(format!("{}.csv", name)).exists(), "missing {}", name);
        }

        // links are 1-based on the solver side
        let e_list = read_csv(&dir.path().join("e_list.csv"));
        assert_eq!(e_list[0], vec!["1", "2"]);
        assert_eq!(e_list.len(), 4);

        let tau_max = read_csv(&dir.path().join("tau_max.csv"));
        assert_eq!(tau_max[0], vec!["2"]);

        // lc keeps its links-by-origins shape
        let lc = read_csv(&dir.path().join("lc.csv"));
        assert_eq!(lc.len(), 4);
        assert_eq!(lc[0].len(), 3);
    }

    #[test]
    fn test_multi_step_export_concatenates_steps() {
        let dir = tempdir().unwrap();
        let mut net = ready_net();
        let exporter = SolverExporter::new(dir.path(), StepMode::Multi, 1);
        exporter.export(&mut net).unwrap();

        let n_origins = net.path_set().unwrap().origins.len();
        let tau_max = net.path_set().unwrap().tau_max;
        let target = read_csv(&dir.path().join("P_target_0.csv"));
        assert_eq!(target.len(), 4);
        assert_eq!(target[0].len(), n_origins * tau_max);
        // random assignment derives no transit-step records
        assert!(!dir.path().join("c7_enter_link.csv").exists());
    }

    #[test]
    fn test_multi_step_export_writes_c7_for_shortest_path() {
        let dir = tempdir().unwrap();
        let mut net = Network::grid(GridKind::Bidirectional, 2, 2, Some(31)).unwrap();
        net.assign_link_costs(CostMode::Real).unwrap();
        net.find_all_paths(Horizon::Steps(4), AssignmentStrategy::ShortestPath).unwrap();
        net.compute_path_assignment_matrix().unwrap();
        net.generate_random_proportions(&ProportionMode::Matched).unwrap();
        net.compute_assignment_matrix().unwrap();
        let exporter = SolverExporter::new(dir.path(), StepMode::Multi, 1);
        exporter.export(&mut net).unwrap();
        assert!(dir.path().join("c7_enter_link.csv").exists());
        assert!(dir.path().join("c7_end_link.csv").exists());
    }
}
