use std::env;
use std::path::Path;

use oflow_netgen::{ExperimentConfig, NetGenError, Network, ProportionMode, SolverExporter};


fn run(cfg: &ExperimentConfig) -> Result<(), NetGenError> {
    let mut net = Network::grid(cfg.direction, cfg.height, cfg.width, cfg.seed)?;
    net.assign_link_costs(cfg.cost_mode.clone())?;
    net.find_all_paths(cfg.horizon, cfg.strategy)?;
    net.compute_path_assignment_matrix()?;
    net.generate_random_proportions(&ProportionMode::default())?;
    net.compute_assignment_matrix()?;

    let path_set = net.path_set()?;
    log::info!("network has {} paths over {} od pairs, tau_max {}",
               path_set.n_paths(), path_set.od_pairs.len(), path_set.tau_max);

    let exporter = SolverExporter::new(&cfg.out_dir, cfg.step, cfg.trials);
    exporter.export(&mut net)?;
    println!("wrote solver inputs to {}", cfg.out_dir.display());
    Ok(())
}

fn main() {
    env_logger::init();
    let cfg_path = env::args().nth(1).unwrap_or_else(|| String::from("experiment.yaml"));
    let cfg = match ExperimentConfig::from_yaml_file(Path::new(&cfg_path)) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("could not load {}: {}", cfg_path, err);
            std::process::exit(1);
        }
    };
    if let Err(err) = run(&cfg) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
