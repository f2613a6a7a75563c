//! Reading and writing `kunfold` snapshots, results and configuration files.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{self, format_err};
use bincode;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml;

pub(crate) mod format;

#[cfg(test)]
#[path = "io_tests.rs"]
mod io_tests;

/// An enumerated type for `kunfold` file types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KUnfoldFileType {
    /// Variant for binary files containing periodic mean-field solutions sampled on k-points.
    Pmf,

    /// Variant for binary files containing unfolded supercell solutions.
    Scf,
}

impl KUnfoldFileType {
    /// Returns the extension of the file type.
    pub fn ext(&self) -> String {
        match self {
            KUnfoldFileType::Pmf => "kunfold.pmf".to_string(),
            KUnfoldFileType::Scf => "kunfold.scf".to_string(),
        }
    }

    /// Returns the full path of a file of this type with the given stem.
    pub fn path<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        let mut path = name.as_ref().to_path_buf();
        path.set_extension(self.ext());
        path
    }
}

/// Reads a `kunfold` binary file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (without `kunfold`-specific extensions).
/// * `file_type` - The type of the `kunfold` file to be read in.
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_kunfold_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: KUnfoldFileType,
) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let path = file_type.path(name);
    let mut reader = BufReader::new(
        File::open(&path).map_err(|err| format_err!("{}: {err}", path.display()))?,
    );
    bincode::deserialize_from(&mut reader).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into a `kunfold` binary file.
///
/// # Arguments
///
/// * `name` - The name of the file to be written (without `kunfold`-specific extensions).
/// * `file_type` - The type of the `kunfold` file to be written.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_kunfold_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: KUnfoldFileType,
    value: &T,
) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let mut writer = BufWriter::new(File::create(file_type.path(name))?);
    bincode::serialize_into(&mut writer, value).map_err(|err| format_err!(err))
}

/// Reads a YAML file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (with its `.yml` or `.yaml` extension).
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_kunfold_yaml<T, P: AsRef<Path>>(name: P) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let path = name.as_ref();
    let mut reader = BufReader::new(
        File::open(path).map_err(|err| format_err!("{}: {err}", path.display()))?,
    );
    serde_yaml::from_reader(&mut reader).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into a YAML file.
///
/// # Arguments
///
/// * `name` - The name of the YAML file to be written (without extensions). The resulting file
/// will have the `.yml` extension.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_kunfold_yaml<T, P: AsRef<Path>>(name: P, value: &T) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let mut path = name.as_ref().to_path_buf();
    path.set_extension("yml");
    let mut writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(&mut writer, value).map_err(|err| format_err!(err))
}
