//! The CLI arguments parser, using clap derive.

use clap::Parser;

use std::path::PathBuf;

#[derive(Debug, Parser)]
#[clap(name = "helm-dowser", version, bin_name = "helm-dowser")]
#[clap(about = "Finds unused and undefined values in Helm charts")]
pub struct DowserCli {
    /// Increase the log level; repeatable (-v info, -vv debug).
    #[clap(short = 'v', long = "verbose", parse(from_occurrences))]
    pub verbose: usize,

    /// Disable colored output.
    #[clap(long = "no-color")]
    pub no_color: bool,

    /// Emit results as JSON.
    #[clap(long)]
    pub json: bool,

    /// Include referenced paths in the JSON output.
    #[clap(long)]
    pub referenced: bool,

    /// Drop findings matching PATTERN (dot notation, `*` wildcards); repeatable.
    #[clap(short = 'i', long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// Additional values file flattened into the definitions; repeatable.
    #[clap(short = 'f', long = "values-file", value_name = "PATH")]
    pub values_files: Vec<PathBuf>,

    /// Chart directory, any file inside one, or a gzipped chart archive.
    #[clap(required = true, value_name = "CHART")]
    pub charts: Vec<PathBuf>,
}

impl DowserCli {
    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }
}
