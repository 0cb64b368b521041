//! Binary entry point: parses arguments, builds an `Engine`, and drains the
//! configured input(s) into the configured output, reporting any fatal
//! error on stderr with a nonzero exit status.

use clap::Parser;
use macropp_cli::cli::Cli;

fn main() {
    let cli = Cli::parse();
    macropp_cli::init_logging(cli.verbose);

    if let Err(err) = macropp_cli::run(&cli) {
        log::error!("{err}");
        eprintln!("{err}");
        std::process::exit(1);
    }
}
