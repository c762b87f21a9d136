//! The `helm-dowser` executable.

#![forbid(unsafe_code)]

use helm_dowser::args::DowserCli;
use helm_dowser::cli;

use clap::{ErrorKind, Parser};

fn main() {
    let args = match DowserCli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => cli::EXIT_OK,
                _ => cli::EXIT_USAGE,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    env_logger::Builder::new()
        .filter_level(args.log_level_filter())
        .init();

    if args.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let code = cli::run(&args, &mut stdout.lock(), &mut stderr.lock());
    std::process::exit(code);
}
