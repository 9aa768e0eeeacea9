//! generator.rs — turn a `GeneratorConfig` into dataset files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    codec::{self, describe, Encoding},
    config::GeneratorConfig,
    dataset::Dataset,
    errors::Result,
};

/// Generate every record and write `<name>.bin` and `<name>.hdf5`
/// (plus `<name>.txt` when `describe_output`) into `out_dir`.
///
/// Stops at the first failing record; files already written stay.
pub fn generate_all(config: &GeneratorConfig, out_dir: &Path, describe_output: bool) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();

    for record in &config.datasets {
        let mut dataset = Dataset::new(record.params)?.with_name(record.name.as_str());
        dataset.generate();

        for enc in [Encoding::Binary, Encoding::Hdf5] {
            let path = out_dir.join(format!("{}.{}", record.name, enc.extension()));
            codec::save(&dataset, &path)?;
            written.push(path);
        }
        if describe_output {
            let path = out_dir.join(format!("{}.txt", record.name));
            describe::write_description(&dataset, &path)?;
            written.push(path);
        }
        info!(dataset = %dataset, "dataset written");
    }
    Ok(written)
}
