// parsing of the YAML experiment description that drives the pipeline binary.
use std::path::{Path, PathBuf};

use yaml_rust::{Yaml, YamlLoader};

use super::export::StepMode;
use super::network::{CostMode, GridKind};
use super::paths::{AssignmentStrategy, Horizon};
use super::NetGenError;


/// One experiment: the grid topology to generate, how to cost and assign it,
/// and what to export for the solver.
#[derive(Clone, Debug)]
pub struct ExperimentConfig {
    pub direction: GridKind,
    pub height: usize,
    pub width: usize,
    pub cost_mode: CostMode,
    pub strategy: AssignmentStrategy,
    pub horizon: Horizon,
    pub step: StepMode,
    pub trials: usize,
    pub seed: Option<u64>,
    pub out_dir: PathBuf,
}

impl ExperimentConfig {
    pub fn from_yaml_file(path: &Path) -> Result<ExperimentConfig, NetGenError> {
        let text = std::fs::read_to_string(path)?;
        return ExperimentConfig::from_yaml_str(&text);
    }

    pub fn from_yaml_str(text: &str) -> Result<ExperimentConfig, NetGenError> {
        let docs = YamlLoader::load_from_str(text)
            .map_err(|err| NetGenError::Config(format!("malformed yaml: {}", err)))?;
        if docs.is_empty() {
            return Err(NetGenError::Config(String::from("empty config document")));
        }
        let doc = &docs[0];

        let direction = match doc["direction"].as_str().unwrap_or("bi") {
            "uni" => GridKind::Unidirectional,
            "bi" => GridKind::Bidirectional,
            other => {
                return Err(NetGenError::Config(
                    format!("direction '{}' is not recognised", other)));
            }
        };
        let height = parse_dim(doc, "height")?;
        let width = parse_dim(doc, "width")?;

        let cost_mode = match doc["costs"].as_str().unwrap_or("real") {
            "rigid" => CostMode::Rigid,
            "mult_int" => CostMode::MultInt,
            "real" => CostMode::Real,
            other => return Err(NetGenError::UnknownCostMode(String::from(other))),
        };
        let strategy = match doc["assignment"].as_str().unwrap_or("shortest_path") {
            "random" => AssignmentStrategy::Random,
            "shortest_path" => AssignmentStrategy::ShortestPath,
            other => return Err(NetGenError::UnknownStrategy(String::from(other))),
        };
        let horizon = match &doc["tau_max"] {
            Yaml::String(word) if word == "mpl" => Horizon::LongestShortestPath,
            Yaml::Integer(steps) if *steps > 0 => Horizon::Steps(*steps as usize),
            Yaml::BadValue => Horizon::Steps(4),
            other => {
                return Err(NetGenError::Config(
                    format!("tau_max must be a positive integer or 'mpl', got {:?}", other)));
            }
        };
        let step = match doc["step"].as_str().unwrap_or("multi") {
            "single" => StepMode::Single,
            "multi" => StepMode::Multi,
            other => {
                return Err(NetGenError::Config(
                    format!("step '{}' is not recognised", other)));
            }
        };
        let trials = match doc["trials"].as_i64() {
            Some(trials) if trials > 0 => trials as usize,
            Some(trials) => {
                return Err(NetGenError::Config(
                    format!("trials must be positive, got {}", trials)));
            }
            None => 3,
        };
        let seed = doc["seed"].as_i64().map(|seed| seed as u64);
        let out_dir = PathBuf::from(doc["out_dir"].as_str().unwrap_or("solver_inputs"));

        Ok(ExperimentConfig {
            direction,
            height,
            width,
            cost_mode,
            strategy,
            horizon,
            step,
            trials,
            seed,
            out_dir,
        })
    }
}

fn parse_dim(doc: &Yaml, key: &str) -> Result<usize, NetGenError> {
    match doc[key].as_i64() {
        Some(dim) if dim > 0 => Ok(dim as usize),
        Some(dim) => Err(NetGenError::Config(format!("{} must be positive, got {}", key, dim))),
        None => Ok(3),
    }
}
