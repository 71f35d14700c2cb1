use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, DEFAULT_MAX_LOOP_ITERATIONS};

#[derive(Debug, Parser)]
#[command(name = "dstep", version, about = "Run data step scripts over tabular datasets")]
pub struct Args {
    /// Script file to run
    pub script: PathBuf,

    /// Make a file available to `set` as NAME (CSV, TSV or Parquet)
    #[arg(long = "set", value_name = "NAME=PATH", value_parser = parse_binding)]
    pub datasets: Vec<(String, PathBuf)>,

    /// Write every produced dataset to DIR/NAME.csv
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Iteration ceiling for each DO loop
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_LOOP_ITERATIONS)]
    pub max_loop: usize,

    /// Print produced datasets to stdout (the default without --out-dir)
    #[arg(long)]
    pub print: bool,
}

impl Args {
    pub fn config(&self) -> Config {
        Config::default().max_loop_iterations(self.max_loop)
    }

    pub fn should_print(&self) -> bool {
        self.print || self.out_dir.is_none()
    }
}

fn parse_binding(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{}'", s)),
    }
}
