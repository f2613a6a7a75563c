//! Nice `kunfold` output formatting.

use std::fmt;

use log;

const KUNFOLD_BANNER_LENGTH: usize = 103;

/// Logs an error to the `kunfold-output` logger.
macro_rules! kunfold_error {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::error!($fmt, $($($arg)*)?);
        log::error!(target: "kunfold-output", $fmt, $($($arg)*)?);
    }
}

/// Logs a warning to the `kunfold-output` logger.
macro_rules! kunfold_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::warn!(target: "kunfold-output", $fmt, $($($arg)*)?); }
}

/// Logs a main output line to the `kunfold-output` logger.
macro_rules! kunfold_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "kunfold-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {kunfold_error, kunfold_output, kunfold_warn};

/// Logs a nicely formatted section title to the `kunfold-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(KUNFOLD_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    kunfold_output!("┌──{bar}──┐");
    kunfold_output!("│§ {title:^length$} §│");
    kunfold_output!("└──{bar}──┘");
}

/// Writes a nicely formatted subtitle.
pub(crate) fn write_subtitle(f: &mut fmt::Formatter<'_>, subtitle: &str) -> fmt::Result {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    writeln!(f, "{subtitle}")?;
    writeln!(f, "{bar}")?;
    Ok(())
}

/// Logs a nicely formatted subtitle to the `kunfold-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    kunfold_output!("{}", subtitle);
    kunfold_output!("{}", bar);
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging `kunfold` outputs nicely.
pub(crate) trait UnfoldOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            kunfold_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> UnfoldOutput for T where T: fmt::Debug + fmt::Display {}
