//! Terrace CLI: multi-environment orchestration for terraform/tofu.

use clap::Parser;
use terrace::cli::Cli;

fn main() {
    let cli = Cli::parse();
    terrace::logging::init(cli.verbose);

    let code = match terrace::cli::dispatch(cli.command, &cli.file) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}
