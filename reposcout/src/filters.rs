/// This module implements file discovery: a recursive walk of the scan root that keeps
/// every regular file whose name ends with one of the configured suffixes.
///
/// # Suffix matching
///
/// Suffixes are normalized before comparison:
/// - compared case-insensitively (`.PY` matches `main.py`)
/// - anchored on a leading dot (`py` becomes `.py`), so `.sx` never matches `sample.jsx`
/// - `all` or `*` anywhere in the list disables filtering
///
/// Discovery never fails. A missing or empty root simply produces no tasks; callers that
/// care validate the root first with [`ScanRequest::validate`](crate::ScanRequest::validate).
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Normalized extension filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionFilter {
    /// Every file qualifies
    All,
    /// Lower-cased, dot-prefixed suffixes
    Suffixes(Vec<String>),
}

impl ExtensionFilter {
    /// Builds a filter from the raw configuration list
    pub fn new(extensions: &Option<Vec<String>>) -> Self {
        let Some(exts) = extensions else {
            return Self::All;
        };

        let mut suffixes = Vec::with_capacity(exts.len());
        for ext in exts {
            let ext = ext.trim();
            if ext.is_empty() {
                continue;
            }
            if ext == "*" || ext.eq_ignore_ascii_case("all") {
                return Self::All;
            }
            let suffix = normalize_suffix(ext);
            if !suffixes.contains(&suffix) {
                suffixes.push(suffix);
            }
        }

        if suffixes.is_empty() {
            Self::All
        } else {
            Self::Suffixes(suffixes)
        }
    }

    /// Checks whether the file name of `path` qualifies
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::All => true,
            Self::Suffixes(suffixes) => {
                let Some(name) = path.file_name() else {
                    return false;
                };
                let name = name.to_string_lossy().to_lowercase();
                suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
            }
        }
    }
}

/// Lower-cases a suffix and gives it a leading dot
pub fn normalize_suffix(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Lower-cased, dot-prefixed extension of `path`, used to look up comment syntax
pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// Checks if a file should be included in the scan based on its suffix
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    ExtensionFilter::new(extensions).matches(path)
}

/// Anchors a relative root on the current directory so discovered paths are absolute
fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(root))
        .unwrap_or_else(|_| root.to_path_buf())
}

fn is_file_entry(ft: std::fs::FileType, path: &Path) -> bool {
    ft.is_file() || (ft.is_symlink() && !path.is_dir())
}

/// Walks `root` recursively and returns every qualifying file.
///
/// Hidden files and `.gitignore`d files are included: this is a plain walk, not a
/// repository-aware one. Directory links are not followed, but links to files are listed
/// (dangling ones too, the reader reports them). Entries that cannot be read are skipped.
pub fn enumerate_files(root: &Path, filter: &ExtensionFilter) -> Vec<PathBuf> {
    if !root.exists() {
        debug!("Root {} does not exist, no files to scan", root.display());
        return Vec::new();
    }

    let root = absolute_root(root);
    let mut walker = WalkBuilder::new(&root);
    walker.standard_filters(false).follow_links(false);

    let files: Vec<PathBuf> = walker
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| is_file_entry(ft, entry.path())))
        .filter(|entry| filter.matches(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    debug!("Found {} files under {}", files.len(), root.display());
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_has_valid_extension() {
        let extensions = Some(vec!["py".to_string()]);
        assert!(has_valid_extension(Path::new("main.py"), &extensions));
        assert!(has_valid_extension(Path::new("MAIN.PY"), &extensions)); // Case insensitive
        assert!(!has_valid_extension(Path::new("main.rs"), &extensions));
        assert!(!has_valid_extension(Path::new("py"), &extensions)); // No dot

        assert!(has_valid_extension(Path::new("anything"), &None));
    }

    #[test]
    fn test_suffix_is_dot_anchored() {
        let extensions = Some(vec![".sx".to_string()]);
        assert!(!has_valid_extension(Path::new("sample.jsx"), &extensions));
        assert!(has_valid_extension(Path::new("sample.sx"), &extensions));
    }

    #[test]
    fn test_multi_part_suffix() {
        let extensions = Some(vec![".tar.gz".to_string()]);
        assert!(has_valid_extension(Path::new("backup.TAR.GZ"), &extensions));
        assert!(!has_valid_extension(Path::new("backup.gz"), &extensions));
    }

    #[test]
    fn test_all_disables_filtering() {
        assert_eq!(
            ExtensionFilter::new(&Some(vec!["rs".to_string(), "All".to_string()])),
            ExtensionFilter::All
        );
        assert_eq!(
            ExtensionFilter::new(&Some(vec!["*".to_string()])),
            ExtensionFilter::All
        );
        assert_eq!(ExtensionFilter::new(&Some(vec![])), ExtensionFilter::All);
        assert_eq!(
            ExtensionFilter::new(&Some(vec!["Rs".to_string(), ".rs".to_string()])),
            ExtensionFilter::Suffixes(vec![".rs".to_string()])
        );
    }

    #[test]
    fn test_normalized_extension() {
        assert_eq!(
            normalized_extension(Path::new("src/Main.JAVA")),
            Some(".java".to_string())
        );
        assert_eq!(normalized_extension(Path::new("Makefile")), None);
    }

    #[test]
    fn test_enumerate_files_recursive() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("top.py"), "x").unwrap();
        fs::write(nested.join("deep.py"), "x").unwrap();
        fs::write(nested.join("deep.txt"), "x").unwrap();
        fs::write(dir.path().join(".hidden.py"), "x").unwrap();

        let mut all = enumerate_files(dir.path(), &ExtensionFilter::All);
        all.sort();
        assert_eq!(all.len(), 4);

        let filter = ExtensionFilter::new(&Some(vec!["py".to_string()]));
        let py = enumerate_files(dir.path(), &filter);
        assert_eq!(py.len(), 3);
        assert!(py.iter().all(|p| p.extension().unwrap() == "py"));
    }

    #[cfg(unix)]
    #[test]
    fn test_enumerate_includes_file_symlinks() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(dir.path().join("plain.txt"), "needle").unwrap();
        fs::write(sub.join("target.txt"), "needle").unwrap();
        symlink(sub.join("target.txt"), dir.path().join("link.txt")).unwrap();
        symlink(dir.path().join("gone.txt"), dir.path().join("dangling.txt")).unwrap();
        symlink(&sub, dir.path().join("sublink")).unwrap();

        let mut files = enumerate_files(dir.path(), &ExtensionFilter::All);
        files.sort();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("dangling.txt"),
                PathBuf::from("link.txt"),
                PathBuf::from("plain.txt"),
                PathBuf::from("sub/target.txt"),
            ]
        );
    }

    #[test]
    fn test_enumerate_missing_root() {
        let dir = tempdir().unwrap();
        let files = enumerate_files(&dir.path().join("nope"), &ExtensionFilter::All);
        assert!(files.is_empty());

        let files = enumerate_files(dir.path(), &ExtensionFilter::All);
        assert!(files.is_empty());
    }
}
