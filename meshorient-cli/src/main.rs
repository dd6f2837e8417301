/// meshorient - normalize mesh placement and units
///
/// Usage: meshorient <input> <metadata> [output] [scale]

use std::process::ExitCode;

use clap::Parser;
use meshorient_cli::{init_logging, run, Args};
use tracing::error;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(&args) {
        Ok(report) => {
            println!("{}", report.output.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
