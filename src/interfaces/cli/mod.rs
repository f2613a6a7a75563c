//! Command-line interface of the `kunfold` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::io::format::kunfold_output;

const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Logs a nicely formatted `kunfold` heading to the `kunfold-output` logger.
pub fn log_heading() {
    let version = if let Some(ver) = VERSION {
        format!("v{ver}")
    } else {
        "v unknown".to_string()
    };
    kunfold_output!("╭─────────────────────────────────────────────────────────────────────────────────────────────────────╮");
    kunfold_output!("│                                                                                                     │");
    kunfold_output!("│   k   k  u   u  n   n  fffff   ooo   l      ddd                                                     │");
    kunfold_output!("│   k  k   u   u  nn  n  f      o   o  l      d  d                                                    │");
    kunfold_output!("│   kkk    u   u  n n n  ffff   o   o  l      d   d      k-point to supercell orbital unfolding       │");
    kunfold_output!("│   k  k   u   u  n  nn  f      o   o  l      d  d                                                    │");
    kunfold_output!("│   k   k   uuu   n   n  f       ooo   lllll  ddd                                                     │");
    kunfold_output!("│                                                                                       {version:>13} │");
    kunfold_output!("╰─────────────────────────────────────────────────────────────────────────────────────────────────────╯");
    kunfold_output!("");
}

/// Command-line arguments of the `kunfold` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// The YAML input file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// The file to which the main output is written. If absent, the main output goes to stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verbosity of the diagnostic log on stderr. May be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
