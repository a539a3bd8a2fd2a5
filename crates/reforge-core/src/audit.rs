//! Auditable persistence of refinement runs and reports.
//!
//! Each record is written as pretty JSON next to a `.digest` file holding the
//! SHA-256 of the JSON bytes. Reads verify the digest before decoding. These
//! files are an audit trail; nothing in the engine reads them back to make
//! decisions.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::{RefinementResult, ReforgeError, Result, ValidationReport};

const REFINEMENT_FILE: &str = "refinement";
const REPORT_FILE: &str = "report";

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn checked_dir(dir: &Path, name: &str) -> Result<PathBuf> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);
    if !valid {
        return Err(ReforgeError::InvalidConfig(format!(
            "invalid audit record name: {name:?}"
        )));
    }
    Ok(dir.join(name))
}

fn write_record<T: Serialize>(value: &T, dir: &Path, name: &str, stem: &str) -> Result<PathBuf> {
    let record_dir = checked_dir(dir, name)?;
    std::fs::create_dir_all(&record_dir)?;

    let artifact_path = record_dir.join(format!("{stem}.json"));
    let digest_path = record_dir.join(format!("{stem}.digest"));
    let json = serde_json::to_vec_pretty(value)?;
    let digest = content_digest(&json);

    std::fs::write(&artifact_path, &json)?;
    std::fs::write(&digest_path, digest.as_bytes())?;
    debug!(path = %artifact_path.display(), digest = %digest, "audit record written");

    Ok(artifact_path)
}

fn read_record<T: DeserializeOwned>(dir: &Path, name: &str, stem: &str) -> Result<T> {
    let record_dir = checked_dir(dir, name)?;
    let json = std::fs::read(record_dir.join(format!("{stem}.json")))?;
    let expected = std::fs::read_to_string(record_dir.join(format!("{stem}.digest")))?;
    let expected = expected.trim();

    let actual = content_digest(&json);
    if expected != actual {
        return Err(ReforgeError::DigestMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

/// Persist `<dir>/<run_id>/refinement.json` and `refinement.digest`.
pub fn write_refinement_artifact(result: &RefinementResult, dir: &Path) -> Result<PathBuf> {
    write_record(result, dir, &result.run_id, REFINEMENT_FILE)
}

/// Read and verify `<dir>/<run_id>/refinement.json`.
pub fn read_refinement_artifact(run_id: &str, dir: &Path) -> Result<RefinementResult> {
    read_record(dir, run_id, REFINEMENT_FILE)
}

/// Persist `<dir>/<name>/report.json` and `report.digest`.
pub fn write_report_artifact(report: &ValidationReport, dir: &Path, name: &str) -> Result<PathBuf> {
    write_record(report, dir, name, REPORT_FILE)
}

/// Read and verify `<dir>/<name>/report.json`.
pub fn read_report_artifact(name: &str, dir: &Path) -> Result<ValidationReport> {
    read_record(dir, name, REPORT_FILE)
}
