//! Dataset codecs.
//!
//! * [`binary`]: fixed little-endian layout (`.bin`).
//! * [`container`]: HDF5 container with named arrays and attributes (`.hdf5`).
//! * [`tensors`]: the same layout as a safetensors file (`.safetensors`).
//! * [`describe`]: deterministic text dump for diff-based fixtures.

pub mod binary;
pub mod container;
pub mod describe;
pub mod tensors;

use std::path::Path;

use bytemuck::Pod;

use crate::{
    dataset::Dataset,
    errors::{BenchError, Result},
};

// The byte views below are the on-disk little-endian representation only on
// little-endian hosts.
#[cfg(not(target_endian = "little"))]
compile_error!("vcal-bench dataset codecs require a little-endian target");

/// On-disk dataset encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Binary,
    Hdf5,
    SafeTensors,
}

impl Encoding {
    pub fn extension(self) -> &'static str {
        match self {
            Encoding::Binary => "bin",
            Encoding::Hdf5 => "hdf5",
            Encoding::SafeTensors => "safetensors",
        }
    }

    /// Pick the encoding from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => Ok(Encoding::Binary),
            Some("hdf5" | "h5") => Ok(Encoding::Hdf5),
            Some("safetensors") => Ok(Encoding::SafeTensors),
            _ => Err(BenchError::format(format!(
                "cannot tell dataset encoding of {} (expected .bin, .hdf5 or .safetensors)",
                path.display()
            ))),
        }
    }
}

/// Load a dataset, named after the file stem.
pub fn load(path: &Path) -> Result<Dataset> {
    let dataset = match Encoding::from_path(path)? {
        Encoding::Binary => binary::read(path)?,
        Encoding::Hdf5 => container::read(path)?,
        Encoding::SafeTensors => tensors::read(path)?,
    };
    Ok(match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => dataset.with_name(stem),
        None => dataset,
    })
}

/// Store a dataset in the encoding implied by `path`.
pub fn save(dataset: &Dataset, path: &Path) -> Result<()> {
    match Encoding::from_path(path)? {
        Encoding::Binary => binary::write(dataset, path),
        Encoding::Hdf5 => container::write(dataset, path),
        Encoding::SafeTensors => tensors::write(dataset, path),
    }
}

pub(crate) fn ensure_generated(dataset: &Dataset) -> Result<()> {
    if !dataset.is_generated() {
        return Err(BenchError::invalid("dataset has not been generated"));
    }
    Ok(())
}

/// Little-endian bytes of a slice of plain numbers.
#[inline]
pub(crate) fn as_le_bytes<T: Pod>(values: &[T]) -> &[u8] {
    bytemuck::cast_slice(values)
}

/// Copy little-endian bytes into a freshly allocated (aligned) vector.
/// `bytes.len()` must be a multiple of `size_of::<T>()`.
pub(crate) fn from_le_bytes<T: Pod>(bytes: &[u8]) -> Vec<T> {
    let mut out = vec![T::zeroed(); bytes.len() / std::mem::size_of::<T>()];
    bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(bytes);
    out
}
