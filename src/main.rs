use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser as _;
use tracing::{error, info};

use dstep::action::run_program;
use dstep::builtins::FunctionRegistry;
use dstep::cli::Args;
use dstep::diagnostics::TracingDiagnostics;
use dstep::library::Library;
use dstep::output;

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_env("DSTEP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let source = match fs::read_to_string(&args.script) {
        Ok(s) => s,
        Err(e) => {
            error!("{}: {}", args.script.display(), e);
            return ExitCode::from(1);
        }
    };

    let program = match dstep::compile(&source) {
        Ok(p) => p,
        Err(e) => {
            error!("{}:{}", args.script.display(), e);
            return ExitCode::from(2);
        }
    };

    let mut library = Library::new();
    for (name, path) in &args.datasets {
        if let Err(e) = library.load_file(name, path) {
            error!("{}", e);
            return ExitCode::from(1);
        }
    }

    let functions = FunctionRegistry::with_builtins();
    let config = args.config();
    let mut diagnostics = TracingDiagnostics;
    let produced = match run_program(&program, &mut library, &functions, &config, &mut diagnostics) {
        Ok(ids) => ids,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    if let Some(dir) = &args.out_dir {
        if let Err(e) = fs::create_dir_all(dir) {
            error!("{}: {}", dir.display(), e);
            return ExitCode::from(1);
        }
        for id in &produced {
            let Some(dataset) = library.get(id) else { continue };
            let path = dir.join(format!("{}.csv", id));
            if let Err(e) = output::save_csv(dataset, &path) {
                error!("{}", e);
                return ExitCode::from(1);
            }
            info!("wrote {}", path.display());
        }
    }

    if args.should_print() {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for id in &produced {
            let Some(dataset) = library.get(id) else { continue };
            if writeln!(out, "{}", output::render_table(id, dataset)).is_err() {
                return ExitCode::from(1);
            }
        }
    }

    ExitCode::SUCCESS
}
