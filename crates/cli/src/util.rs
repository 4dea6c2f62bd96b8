// Shared helpers for reading inputs and emitting reports.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tally_config::Context;
use tally_core::Record;
use tally_recon::{load_csv_records, SourceConfig};

use crate::CliError;

/// Directory config-relative file names resolve against.
pub(crate) fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::runtime(format!("cannot read {}: {e}", path.display())))
}

/// Load one CSV extract as records typed by the context.
pub(crate) fn read_records(path: &Path, source: &SourceConfig, ctx: &Context) -> Result<Vec<Record>, CliError> {
    let data = read_file(path)?;
    let records = load_csv_records(source, &data, ctx)
        .map_err(|e| CliError::runtime(format!("{}: {e}", path.display())))?;
    log::debug!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Pretty JSON to `--output` and/or stdout.
pub(crate) fn emit_json<T: Serialize>(value: &T, stdout: bool, output: Option<&Path>) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::other(format!("JSON serialization error: {e}")))?;

    if let Some(path) = output {
        std::fs::write(path, &json)
            .map_err(|e| CliError::runtime(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }

    if stdout {
        println!("{json}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_dir_of_bare_file_is_cwd() {
        assert_eq!(base_dir(Path::new("audit.toml")), PathBuf::from("."));
        assert_eq!(base_dir(Path::new("conf/audit.toml")), PathBuf::from("conf"));
    }
}
