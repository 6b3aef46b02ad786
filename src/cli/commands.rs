//! CLI command implementations
//!
//! Every command writes one JSON response to stdout. Failures are returned
//! to the entry point, which prints them to stderr.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::config::NodeDbConfig;
use crate::hash::{hash_file, split_hash};
use crate::model::{CodeIndex, FileFingerprint};
use crate::observability::Logger;
use crate::store::load_image;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let config = load_config(cli.config.as_deref())?;
    run_command(cli.command, &config)
}

fn load_config(path: Option<&Path>) -> CliResult<NodeDbConfig> {
    let config = match path {
        Some(path) => NodeDbConfig::load(path)?,
        None => NodeDbConfig::default(),
    };
    Logger::set_min_severity(config.severity()?);
    Ok(config)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command, config: &NodeDbConfig) -> CliResult<()> {
    let data = match cmd {
        Command::Hash { files } => hash_files(&files)?,
        Command::Fingerprint { file } => fingerprint(&file)?,
        Command::Schema => schema(config)?,
        Command::Verify { image } => verify(&image, config)?,
    };
    write_response(data)
}

/// Content hash of each file, as hex and as 32-bit halves.
pub fn hash_files(files: &[PathBuf]) -> CliResult<Value> {
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let hash = hash_file(path).map_err(|e| {
            CliError::io_error(format!("failed to read {}: {}", path.display(), e))
        })?;
        let (high, low) = split_hash(hash);
        results.push(json!({
            "path": path.display().to_string(),
            "hash": format!("{:016x}", hash),
            "high": high,
            "low": low,
        }));
    }
    Ok(json!({ "files": results }))
}

pub fn fingerprint(file: &Path) -> CliResult<Value> {
    let fingerprint = FileFingerprint::of_file(file)?;
    Ok(json!({
        "path": file.display().to_string(),
        "fingerprint": fingerprint,
        "missing": fingerprint.is_missing(),
    }))
}

pub fn schema(config: &NodeDbConfig) -> CliResult<Value> {
    let index = CodeIndex::from_config(config)?;
    Ok(serde_json::to_value(index.dump_schema())?)
}

/// Loads the image and reports its size. Any corruption is an error.
pub fn verify(image: &Path, config: &NodeDbConfig) -> CliResult<Value> {
    let store = load_image(image, config.max_size_bytes)?;
    Ok(json!({
        "image": image.display().to_string(),
        "bytes": store.used_len(),
        "blocks": store.allocated_blocks(),
        "free_blocks": store.free_block_count(),
        "max_size_bytes": store.max_size(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    use crate::store::{save_image, MemoryStore, Store};

    #[test]
    fn test_hash_files_reports_halves() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "int x = 1;").unwrap();
        let value = hash_files(&[file.path().to_path_buf()]).unwrap();
        let entry = &value["files"][0];
        let expected = crate::hash::hash("int x = 1;");
        assert_eq!(entry["hash"], format!("{:016x}", expected));
        assert_eq!(entry["high"], (expected >> 32) as u32);
        assert_eq!(entry["low"], expected as u32);
    }

    #[test]
    fn test_hash_files_distinguishes_binary_bytes() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("A.class");
        let second = dir.path().join("B.class");
        fs::write(&first, [0xca, 0xfe, 0xba, 0xbe, 0x80]).unwrap();
        fs::write(&second, [0xca, 0xfe, 0xba, 0xbe, 0x81]).unwrap();
        let value = hash_files(&[first, second]).unwrap();
        assert_ne!(value["files"][0]["hash"], value["files"][1]["hash"]);
    }

    #[test]
    fn test_hash_missing_file_is_io_error() {
        let err = hash_files(&[PathBuf::from("/nonexistent/file")]).unwrap_err();
        assert_eq!(err.code_str(), "ND_CLI_IO_ERROR");
    }

    #[test]
    fn test_schema_lists_tags() {
        let value = schema(&NodeDbConfig::default()).unwrap();
        let kinds = value["kinds"].as_array().unwrap();
        assert!(kinds
            .iter()
            .any(|k| k["name"] == "ResourceFile" && k["tag"] == 1));
        assert_eq!(value["reserved_tags"], json!([6, 7]));
    }

    #[test]
    fn test_verify_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.ndb");
        let mut store = MemoryStore::new();
        store.allocate(32).unwrap();
        save_image(&store, &path).unwrap();

        let value = verify(&path, &NodeDbConfig::default()).unwrap();
        assert_eq!(value["blocks"], 1);
    }

    #[test]
    fn test_verify_corrupt_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ndb");
        fs::write(&path, b"not an image at all").unwrap();
        let err = verify(&path, &NodeDbConfig::default()).unwrap_err();
        assert_eq!(err.code_str(), "ND_CLI_CORRUPTION");
    }
}
