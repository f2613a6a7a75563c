//! YAML input files for the `kunfold` binary.

use std::path::PathBuf;

use anyhow::{self, format_err};
use serde::{Deserialize, Serialize};

use crate::drivers::k2gamma::{KPointUnfoldingDriver, KPointUnfoldingParams};
use crate::drivers::UnfoldDriver;
use crate::interfaces::InputHandle;
use crate::io::format::{kunfold_error, kunfold_output, kunfold_warn, log_subtitle};
use crate::io::{read_kunfold_binary, read_kunfold_yaml, KUnfoldFileType};
use crate::target::mean_field::PeriodicMeanField;


/// An enumerated type representing the possible sources of the periodic mean-field solution to be
/// unfolded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MeanFieldSource {
    /// Variant indicating that the solution will be read in from a YAML file. The associated path
    /// includes the `.yml` or `.yaml` extension.
    FromYaml(PathBuf),

    /// Variant indicating that the solution will be read in from a `kunfold`
    /// [`KUnfoldFileType::Pmf`] binary file. The associated string gives the name of the file
    /// without its `.kunfold.pmf` extension.
    FromBinary(String),
}

impl MeanFieldSource {
    /// Reads in the periodic mean-field solution and checks its internal consistency.
    pub fn load(&self) -> Result<PeriodicMeanField, anyhow::Error> {
        let pmf: PeriodicMeanField = match self {
            MeanFieldSource::FromYaml(path) => read_kunfold_yaml(path)?,
            MeanFieldSource::FromBinary(name) => read_kunfold_binary(name, KUnfoldFileType::Pmf)?,
        };
        pmf.validate()
            .map_err(|err| format_err!("Invalid periodic mean-field solution: {err}"))?;
        Ok(pmf)
    }
}

/// A structure containing `kunfold` input parameters which can be serialised into and
/// deserialised from a YAML input file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Input {
    /// The source of the periodic mean-field solution.
    pub mean_field: MeanFieldSource,

    /// The parameters for k-point unfolding.
    ///
    /// # Default
    ///
    /// If not specified, [`KPointUnfoldingParams::default`] will be used.
    #[serde(default)]
    pub unfolding: KPointUnfoldingParams,
}

impl InputHandle for Input {
    fn handle(&self) -> Result<(), anyhow::Error> {
        let pmf = self.mean_field.load()?;
        let mut driver = KPointUnfoldingDriver::builder()
            .parameters(&self.unfolding)
            .mean_field(&pmf)
            .build()?;
        driver.run().map_err(|err| {
            kunfold_error!("k-point unfolding failed: {err}");
            err
        })?;
        let warnings = driver.result()?.supercell_mean_field.warnings();
        if !warnings.is_empty() {
            log_subtitle("Numerical warnings");
            kunfold_output!("");
            for warning in warnings {
                kunfold_warn!("{warning}");
            }
            kunfold_output!("");
        }
        Ok(())
    }
}
