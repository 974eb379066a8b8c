use clap::Parser;
use revscan::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
