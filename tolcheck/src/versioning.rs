//! Output file naming.
//!
//! Existing outputs are never overwritten: a taken name gets a `_v<N>`
//! suffix, counting up from the version already in the name.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Suffix that turns a workbook name into its HTML report name.
pub const REPORT_SUFFIX: &str = "_report.html";

/// Workbook name used when the input directory has no usable name.
const FALLBACK_STEM: &str = "results";

static VERSION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"^(.+)_v(\d+)$") {
    Ok(r) => r,
    Err(err) => panic!("Invalid version suffix regex: {err}"),
});

/// Return `base` if it does not exist, else the first free `<stem>_v<k><ext>`.
///
/// A stem already ending in `_v<N>` continues from `N + 1`; otherwise
/// numbering starts at 2.
#[must_use]
pub fn versioned_path(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }

    let dir = base.parent().unwrap_or_else(|| Path::new(""));
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let (base_name, current) = match VERSION_SUFFIX.captures(&stem) {
        Some(caps) => (
            caps[1].to_owned(),
            caps[2].parse::<u64>().unwrap_or(1),
        ),
        None => (stem.clone(), 1),
    };

    let mut version = if current > 1 { current + 1 } else { 2 };
    loop {
        let candidate = dir.join(format!("{base_name}_v{version}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        version += 1;
    }
}

/// Name of the input directory, used as the workbook stem.
#[must_use]
pub fn input_dir_name(input_dir: &Path) -> String {
    let name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
    };
    name(input_dir)
        .or_else(|| input_dir.canonicalize().ok().and_then(|p| name(&p)))
        .unwrap_or_else(|| FALLBACK_STEM.to_owned())
}

/// Next free workbook path `<output_dir>/<input dir name>.xlsx`.
#[must_use]
pub fn workbook_path(output_dir: &Path, input_dir: &Path) -> PathBuf {
    versioned_path(&output_dir.join(format!("{}.xlsx", input_dir_name(input_dir))))
}

/// HTML report path belonging to a workbook (`.xlsx` → `_report.html`).
#[must_use]
pub fn report_path_for(workbook: &Path) -> PathBuf {
    let name = workbook
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let report_name = match name.strip_suffix(".xlsx") {
        Some(stem) => format!("{stem}{REPORT_SUFFIX}"),
        None => format!("{name}{REPORT_SUFFIX}"),
    };
    workbook.with_file_name(report_name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_free_name_is_kept() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("run.xlsx");
        assert_eq!(versioned_path(&base), base);
    }

    #[test]
    fn test_taken_name_gets_v2() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("run.xlsx");
        fs::write(&base, "").unwrap();
        assert_eq!(versioned_path(&base), tmp.path().join("run_v2.xlsx"));
    }

    #[test]
    fn test_skips_taken_versions() {
        let tmp = TempDir::new().unwrap();
        for name in ["run.xlsx", "run_v2.xlsx", "run_v3.xlsx"] {
            fs::write(tmp.path().join(name), "").unwrap();
        }
        assert_eq!(
            versioned_path(&tmp.path().join("run.xlsx")),
            tmp.path().join("run_v4.xlsx")
        );
    }

    #[test]
    fn test_continues_from_existing_version() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("run_v5.xlsx");
        fs::write(&base, "").unwrap();
        assert_eq!(versioned_path(&base), tmp.path().join("run_v6.xlsx"));
    }

    #[test]
    fn test_v1_restarts_at_v2() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("run_v1.xlsx");
        fs::write(&base, "").unwrap();
        assert_eq!(versioned_path(&base), tmp.path().join("run_v2.xlsx"));
    }

    #[test]
    fn test_report_path() {
        assert_eq!(
            report_path_for(Path::new("/out/run_v2.xlsx")),
            PathBuf::from("/out/run_v2_report.html")
        );
    }

    #[test]
    fn test_dot_dir_resolves_to_real_name() {
        let name = input_dir_name(Path::new("."));
        assert!(!name.is_empty());
        assert_ne!(name, ".");
    }

    #[test]
    fn test_workbook_path_uses_dir_name() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("bench_01");
        fs::create_dir(&input).unwrap();
        assert_eq!(
            workbook_path(tmp.path(), &input),
            tmp.path().join("bench_01.xlsx")
        );
    }
}
