//! Finding measurement exports on disk.
//!
//! Symlinks are not followed and only regular files with a `.csv` or `.txt`
//! extension are returned. Walk errors and bad exclude patterns are reported
//! alongside the file list, never dropped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use glob::Pattern;
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::{ScanError, ScanErrorKind};
use crate::model::IoType;

/// A measurement export found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub path: PathBuf,
    /// File name (last path component), used for decoding.
    pub name: String,
    /// Path relative to the input directory with `/` separators. Equals
    /// `name` for top-level files. Measurement-type selections use it.
    pub key: String,
    pub io_type: IoType,
}

/// Files found under the input directory, plus discovery failures.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Sorted by path.
    pub files: Vec<DataFile>,
    pub scan_errors: Vec<ScanError>,
}

impl Discovery {
    pub fn csv_files(&self) -> impl Iterator<Item = &DataFile> {
        self.files.iter().filter(|f| f.io_type == IoType::Output)
    }

    pub fn txt_files(&self) -> impl Iterator<Item = &DataFile> {
        self.files.iter().filter(|f| f.io_type == IoType::Input)
    }

    #[must_use]
    pub fn csv_count(&self) -> usize {
        self.csv_files().count()
    }

    #[must_use]
    pub fn txt_count(&self) -> usize {
        self.txt_files().count()
    }

    /// Earliest modification time among the discovered files.
    #[must_use]
    pub fn earliest_modified(&self) -> Option<DateTime<Local>> {
        self.files
            .iter()
            .filter_map(|f| f.path.metadata().and_then(|m| m.modified()).ok())
            .min()
            .map(DateTime::<Local>::from)
    }
}

/// Map a file extension to the I/O type of its export family.
#[must_use]
pub fn io_type_for(path: &Path) -> Option<IoType> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("csv") {
        Some(IoType::Output)
    } else if ext.eq_ignore_ascii_case("txt") {
        Some(IoType::Input)
    } else {
        None
    }
}

/// Check if a path matches any of the exclude patterns
fn relative_key(input_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(input_dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn matches_exclude(path: &Path, exclude_patterns: &[Pattern]) -> bool {
    let path_str = path.to_string_lossy();
    exclude_patterns.iter().any(|pattern| {
        pattern.matches(&path_str)
            || path
                .file_name()
                .is_some_and(|name| pattern.matches(&name.to_string_lossy()))
    })
}

/// Find all measurement exports under `config.input_dir`.
///
/// Only the top level is searched unless `config.recursive` is set.
#[must_use]
pub fn find_data_files(config: &ScanConfig) -> Discovery {
    let mut discovery = Discovery::default();

    let mut exclude_patterns = Vec::with_capacity(config.exclude.len());
    for pat_str in &config.exclude {
        match Pattern::new(pat_str) {
            Ok(pat) => exclude_patterns.push(pat),
            Err(e) => discovery.scan_errors.push(ScanError {
                file: PathBuf::from(pat_str),
                kind: ScanErrorKind::InvalidExcludePattern,
                message: format!("Invalid exclude glob pattern '{pat_str}': {e}"),
            }),
        }
    }

    let max_depth = if config.recursive { config.max_depth } else { 1 };

    for entry_result in WalkDir::new(&config.input_dir)
        .follow_links(false)
        .min_depth(1)
        .max_depth(max_depth)
    {
        let entry = match entry_result {
            Ok(e) => e,
            Err(walk_err) => {
                let path = walk_err
                    .path()
                    .map_or_else(|| config.input_dir.clone(), Path::to_path_buf);
                discovery.scan_errors.push(ScanError {
                    file: path,
                    kind: ScanErrorKind::WalkError,
                    message: format!("Directory traversal error: {walk_err}"),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(io_type) = io_type_for(path) else {
            continue;
        };
        if matches_exclude(path, &exclude_patterns) {
            continue;
        }

        discovery.files.push(DataFile {
            path: path.to_path_buf(),
            name: entry.file_name().to_string_lossy().into_owned(),
            key: relative_key(&config.input_dir, path),
            io_type,
        });
    }

    discovery.files.sort_by(|a, b| a.path.cmp(&b.path));
    discovery
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn scan(dir: &Path) -> ScanConfig {
        ScanConfig::new(dir)
    }

    fn names(discovery: &Discovery) -> Vec<&str> {
        discovery.files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_finds_csv_and_txt_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b_5V_CH1.csv"), "").unwrap();
        fs::write(tmp.path().join("a_5V.TXT"), "").unwrap();
        fs::write(tmp.path().join("notes.md"), "").unwrap();
        fs::write(tmp.path().join("run.xlsx"), "").unwrap();

        let discovery = find_data_files(&scan(tmp.path()));
        assert_eq!(names(&discovery), vec!["a_5V.TXT", "b_5V_CH1.csv"]);
        assert_eq!(discovery.csv_count(), 1);
        assert_eq!(discovery.txt_count(), 1);
        assert!(discovery.scan_errors.is_empty());
    }

    #[test]
    fn test_non_recursive_by_default() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("deep_1V_CH1.csv"), "").unwrap();
        fs::write(tmp.path().join("top_1V_CH1.csv"), "").unwrap();

        let discovery = find_data_files(&scan(tmp.path()));
        assert_eq!(names(&discovery), vec!["top_1V_CH1.csv"]);

        let mut config = scan(tmp.path());
        config.recursive = true;
        let discovery = find_data_files(&config);
        assert_eq!(discovery.files.len(), 2);
    }

    #[test]
    fn test_keys_are_relative_to_input_dir() {
        let tmp = TempDir::new().unwrap();
        for sub in ["run_a", "run_b"] {
            fs::create_dir(tmp.path().join(sub)).unwrap();
            fs::write(tmp.path().join(sub).join("VT_5V_R10V.txt"), "").unwrap();
        }
        fs::write(tmp.path().join("VT_5V_R10V.txt"), "").unwrap();

        let mut config = scan(tmp.path());
        config.recursive = true;
        let discovery = find_data_files(&config);
        let keys: Vec<_> = discovery.files.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["VT_5V_R10V.txt", "run_a/VT_5V_R10V.txt", "run_b/VT_5V_R10V.txt"]
        );
        assert!(discovery.files.iter().all(|f| f.name == "VT_5V_R10V.txt"));
    }

    #[test]
    fn test_exclude_by_file_name() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep_1V_CH1.csv"), "").unwrap();
        fs::write(tmp.path().join("skip_1V_CH1.csv"), "").unwrap();

        let mut config = scan(tmp.path());
        config.exclude = vec!["skip_*".to_owned()];
        let discovery = find_data_files(&config);
        assert_eq!(names(&discovery), vec!["keep_1V_CH1.csv"]);
    }

    #[test]
    fn test_invalid_exclude_is_reported() {
        let tmp = TempDir::new().unwrap();
        let mut config = scan(tmp.path());
        config.exclude = vec!["[".to_owned()];
        let discovery = find_data_files(&config);
        assert_eq!(discovery.scan_errors.len(), 1);
        assert_eq!(
            discovery.scan_errors[0].kind,
            ScanErrorKind::InvalidExcludePattern
        );
    }

    #[test]
    fn test_missing_dir_is_a_walk_error() {
        let tmp = TempDir::new().unwrap();
        let discovery = find_data_files(&scan(&tmp.path().join("missing")));
        assert!(discovery.files.is_empty());
        assert_eq!(discovery.scan_errors[0].kind, ScanErrorKind::WalkError);
    }

    #[test]
    fn test_earliest_modified() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a_1V_CH1.csv"), "").unwrap();
        let discovery = find_data_files(&scan(tmp.path()));
        assert!(discovery.earliest_modified().is_some());
        assert!(Discovery::default().earliest_modified().is_none());
    }
}
