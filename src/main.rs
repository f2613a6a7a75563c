use anyhow::{self, format_err};
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use kunfold::errors::UnfoldError;
use kunfold::interfaces::cli::{log_heading, Cli};
use kunfold::interfaces::input::Input;
use kunfold::interfaces::InputHandle;
use kunfold::io::read_kunfold_yaml;

/// Configures the main `kunfold-output` logger and the diagnostic root logger.
fn init_logging(cli: &Cli) -> Result<(), anyhow::Error> {
    let output_encoder = Box::new(PatternEncoder::new("{m}{n}"));
    let output_appender = if let Some(path) = cli.output.as_ref() {
        Appender::builder().build(
            "output",
            Box::new(FileAppender::builder().encoder(output_encoder).append(false).build(path)?),
        )
    } else {
        Appender::builder().build(
            "output",
            Box::new(ConsoleAppender::builder().encoder(output_encoder).build()),
        )
    };
    let diagnostics_appender = Appender::builder().build(
        "diagnostics",
        Box::new(
            ConsoleAppender::builder()
                .target(Target::Stderr)
                .encoder(Box::new(PatternEncoder::new("{h({l})} {t} - {m}{n}")))
                .build(),
        ),
    );
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = Config::builder()
        .appender(output_appender)
        .appender(diagnostics_appender)
        .logger(
            Logger::builder()
                .appender("output")
                .additive(false)
                .build("kunfold-output", LevelFilter::Info),
        )
        .build(Root::builder().appender("diagnostics").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    log_heading();

    let inp: Input = read_kunfold_yaml(&cli.config)?;
    inp.handle().map_err(|err| match err.downcast_ref::<UnfoldError>() {
        Some(UnfoldError::Domain(msg)) => format_err!("Unable to unfold the k-point mesh: {msg}."),
        Some(UnfoldError::Dimension(msg)) => {
            format_err!("Inconsistent periodic mean-field solution: {msg}.")
        }
        _ => err,
    })
}
