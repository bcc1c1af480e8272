//! Manifest path parsing.

/// Separator between child names in a manifest path.
pub const PATH_SEPARATOR: char = '/';

/// Split a manifest path into child-name segments.
///
/// Empty segments are dropped, so leading, trailing and doubled separators
/// are all tolerated. An empty result refers to the root itself.
pub fn parse_path(path: &str) -> Vec<String> {
    path.split(PATH_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Join segments back into the canonical form used in diagnostics.
pub fn join_segments(segments: &[String]) -> String {
    let mut joined = String::new();
    for segment in segments {
        joined.push(PATH_SEPARATOR);
        joined.push_str(segment);
    }
    if joined.is_empty() {
        joined.push(PATH_SEPARATOR);
    }
    joined
}
