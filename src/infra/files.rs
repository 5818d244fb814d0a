//! Lazy enumeration of source files matching glob patterns.

use std::path::{Path, PathBuf};

use ignore::{
    Walk, WalkBuilder,
    overrides::{Override, OverrideBuilder},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("invalid source pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },
    #[error("failed to compile source patterns: {0}")]
    Compile(#[source] ignore::Error),
    #[error("failed to traverse `{root}`: {source}")]
    Traverse {
        root: PathBuf,
        #[source]
        source: ignore::Error,
    },
}

/// Files under `root` selected by include patterns and not rejected by a
/// `!`-prefixed exclude pattern. Paths are yielded one at a time as the
/// directory tree is walked; siblings are visited in file-name order.
pub struct SourceFiles {
    root: PathBuf,
    walk: Option<Walk>,
}

impl SourceFiles {
    pub fn new<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Self, EnumerationError> {
        let includes = patterns
            .iter()
            .map(|pattern| pattern.as_ref().trim())
            .filter(|pattern| !pattern.is_empty() && !pattern.starts_with('!'))
            .count();
        if includes == 0 {
            return Ok(Self {
                root: root.to_path_buf(),
                walk: None,
            });
        }

        let overrides = build_overrides(root, patterns)?;
        let walk = WalkBuilder::new(root)
            .standard_filters(false)
            .overrides(overrides)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        Ok(Self {
            root: root.to_path_buf(),
            walk: Some(walk),
        })
    }
}

impl Iterator for SourceFiles {
    type Item = Result<PathBuf, EnumerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let walk = self.walk.as_mut()?;
        loop {
            match walk.next()? {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|kind| kind.is_file()) {
                        return Some(Ok(entry.into_path()));
                    }
                }
                Err(err) => {
                    return Some(Err(EnumerationError::Traverse {
                        root: self.root.clone(),
                        source: err,
                    }));
                }
            }
        }
    }
}

fn build_overrides<S: AsRef<str>>(
    root: &Path,
    patterns: &[S],
) -> Result<Override, EnumerationError> {
    let mut builder = OverrideBuilder::new(root);
    for pattern in patterns {
        let pattern = pattern.as_ref().trim();
        if pattern.is_empty() || pattern == "!" {
            continue;
        }
        builder
            .add(pattern)
            .map_err(|err| EnumerationError::Pattern {
                pattern: pattern.to_string(),
                source: err,
            })?;
    }
    builder.build().map_err(EnumerationError::Compile)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, "<p></p>").expect("write file");
    }

    fn relative_names(root: &Path, files: SourceFiles) -> Vec<String> {
        files
            .map(|path| {
                let path = path.expect("walk entry");
                path.strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn default_patterns_skip_dependency_directory() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "b.html");
        touch(dir.path(), "a.html");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "docs/guide.html");
        touch(dir.path(), "node_modules/pkg/readme.html");

        let files =
            SourceFiles::new(dir.path(), &["**/*.html", "!node_modules/**"]).expect("files");

        assert_eq!(
            relative_names(dir.path(), files),
            vec!["a.html", "b.html", "docs/guide.html"]
        );
    }

    #[test]
    fn hidden_and_gitignored_files_are_not_filtered() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), ".hidden/page.html");
        fs::write(dir.path().join(".gitignore"), "*.html\n").expect("write gitignore");

        let files = SourceFiles::new(dir.path(), &["**/*.html"]).expect("files");
        assert_eq!(relative_names(dir.path(), files), vec![".hidden/page.html"]);
    }

    #[test]
    fn only_exclusions_select_nothing() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "a.html");

        let files = SourceFiles::new(dir.path(), &["!a.html"]).expect("files");
        assert_eq!(files.count(), 0);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let err = SourceFiles::new(dir.path(), &["**/[.html"]).err().expect("bad glob");
        assert!(matches!(err, EnumerationError::Pattern { .. }));
        assert!(err.to_string().contains("**/[.html"));
    }

    #[test]
    fn missing_root_is_a_traversal_error() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("missing");
        let mut files = SourceFiles::new(&missing, &["**/*.html"]).expect("files");
        assert!(matches!(
            files.next(),
            Some(Err(EnumerationError::Traverse { .. }))
        ));
    }
}
