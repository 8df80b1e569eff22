//! File naming convention: `<prefix>_<instance>_<run>.<ext>`.

use av_core::{InstanceId, RunId};

use crate::{ResultsError, ResultsResult};

/// Splits `name` into stem and extension at the last dot.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Leading part every file of `instance` starts with.
pub fn instance_stem_prefix(prefix: &str, instance: &InstanceId) -> String {
    if prefix.is_empty() {
        format!("{}_", instance)
    } else {
        format!("{}_{}_", prefix, instance)
    }
}

/// True if `file_name` belongs to `instance` and carries one of `extensions`.
///
/// Everything after the instance must be a single run token. The token
/// itself is not validated here, so a file with a bad run token still
/// matches and is reported later as a malformed run id.
pub fn matches_instance(
    file_name: &str,
    prefix: &str,
    instance: &InstanceId,
    extensions: &[String],
) -> bool {
    let (stem, ext) = split_extension(file_name);
    let Some(ext) = ext else {
        return false;
    };
    if !extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
        return false;
    }
    let lead = instance_stem_prefix(prefix, instance);
    stem.strip_prefix(lead.as_str())
        .is_some_and(|token| !token.is_empty() && !token.contains('_'))
}

/// Run id from the trailing `_`-separated token of the file stem.
pub fn parse_run_id(file_name: &str) -> ResultsResult<RunId> {
    let (stem, _) = split_extension(file_name);
    let token = stem.rsplit('_').next().unwrap_or(stem);
    token.parse().map_err(|_| ResultsError::MalformedRunId {
        file: file_name.to_string(),
    })
}
