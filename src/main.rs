use clap::Parser;
use order_ledger::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
