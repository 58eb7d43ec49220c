//! Credential-free profile export.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use super::ProfileSnapshot;
use crate::error::CoreError;

/// `{name}_{YYYYMMDD}_{HHMMSS}.json`, with path separators in the name
/// replaced.
pub fn export_file_name<Tz: TimeZone>(name: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let name: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    let name = if name.is_empty() { "profile" } else { &name };
    format!("{}_{}.json", name, at.format("%Y%m%d_%H%M%S"))
}

/// Pretty JSON of the whole profile without `apiKey`.
pub fn export_json(profile: &ProfileSnapshot) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(profile)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("apiKey");
    }
    serde_json::to_string_pretty(&value)
}

/// Write an export into `dir` and return its path.
pub fn write_export<Tz: TimeZone>(
    profile: &ProfileSnapshot,
    dir: &Path,
    at: &DateTime<Tz>,
) -> Result<PathBuf, CoreError>
where
    Tz::Offset: std::fmt::Display,
{
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(&profile.name, at));
    std::fs::write(&path, export_json(profile)?)?;
    Ok(path)
}
