use anyhow::{Context, Result};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Case-insensitive suffix match against the configured extension filter.
/// Suffixes are matched against the file name, so ".pdf" and "pdf" behave
/// the same as long as the dot is included in the filter entry.
pub fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| name.ends_with(&ext.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_filter_is_case_insensitive() {
        let exts = vec![".pdf".to_string(), ".tif".to_string()];
        assert!(matches_extension(&PathBuf::from("/in/scan.PDF"), &exts));
        assert!(matches_extension(&PathBuf::from("/in/page.tif"), &exts));
        assert!(!matches_extension(&PathBuf::from("/in/notes.txt"), &exts));
        assert!(!matches_extension(&PathBuf::from("/in/"), &exts));
    }
}
