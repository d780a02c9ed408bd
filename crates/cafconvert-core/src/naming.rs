//! File naming policy: eligibility, sanitization and output names.
//!
//! Upload names are untrusted. They are checked for the source extension
//! before anything else, then sanitized into a flat, ASCII-only file name
//! before they are ever joined onto a filesystem path.

use std::path::Path;

/// Extension (without dot) of files accepted for conversion.
pub const SOURCE_EXTENSION: &str = "caf";

/// Extension (without dot) of converted files.
pub const TARGET_EXTENSION: &str = "mp3";

/// Download name of the archive returned for multi-file submissions.
pub const ARCHIVE_NAME: &str = "converted_files.zip";

/// Check whether an upload name ends with the source extension.
///
/// The comparison is case-insensitive and looks at the raw name, before
/// sanitization. A bare `.caf` counts; it sanitizes to `caf`.
///
/// # Examples
///
/// ```
/// use cafconvert_core::naming::is_eligible;
///
/// assert!(is_eligible("clip.caf"));
/// assert!(is_eligible("CLIP.CAF"));
/// assert!(is_eligible(".caf"));
/// assert!(!is_eligible("notes.txt"));
/// assert!(!is_eligible("caf"));
/// ```
pub fn is_eligible(name: &str) -> bool {
    let suffix_len = SOURCE_EXTENSION.len() + 1;
    name.len()
        .checked_sub(suffix_len)
        .and_then(|start| name.get(start..))
        .is_some_and(|tail| {
            tail.starts_with('.') && tail[1..].eq_ignore_ascii_case(SOURCE_EXTENSION)
        })
}

/// Turn an untrusted upload name into a safe, flat file name.
///
/// - non-ASCII characters are dropped
/// - path separators become spaces, then runs of whitespace become `_`
/// - anything outside `[A-Za-z0-9_.-]` is removed
/// - leading and trailing `.` and `_` are stripped
///
/// The result may be empty; callers must treat that as an unusable name.
///
/// # Examples
///
/// ```
/// use cafconvert_core::naming::sanitize_filename;
///
/// assert_eq!(sanitize_filename("My Recording.caf"), "My_Recording.caf");
/// assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
/// assert_eq!(sanitize_filename("..."), "");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let flattened: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Name of the converted file for a (sanitized) input name: same stem, target
/// extension.
///
/// # Examples
///
/// ```
/// use cafconvert_core::naming::output_file_name;
///
/// assert_eq!(output_file_name("clip.caf"), "clip.mp3");
/// assert_eq!(output_file_name("take.2.caf"), "take.2.mp3");
/// ```
pub fn output_file_name(sanitized: &str) -> String {
    let stem = Path::new(sanitized)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("output");
    format!("{stem}.{TARGET_EXTENSION}")
}
