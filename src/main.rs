use std::process::ExitCode;

use clap::Parser;

use arcdrawer::cli::{self, CliArgs};
use arcdrawer::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    logger::init(args.verbose);
    cli::run(args)
}
