//! WorkingDirNormalizer - アノテーションのパスを作業ディレクトリ相対に揃える
//!
//! # ルール
//! - 絶対パスは作業ディレクトリからの相対パスに書き換える（外なら破棄）
//! - `./` や `..` は字句的に畳み込み、区切りは `/` に統一
//! - 開始行 > 終了行 のものは破棄
//! - location を持たないアノテーションはそのまま通す

use std::path::{Path, PathBuf};

use crate::app::resolver::{clean_path, relative_artifact_path};
use crate::domain::{Annotation, NormalizeError};
use crate::ports::{AnnotationNormalizer, Normalized};

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkingDirNormalizer;

impl AnnotationNormalizer for WorkingDirNormalizer {
    fn normalize(&self, working_dir: &Path, annotations: Vec<Annotation>) -> Normalized {
        let working_dir = clean_path(working_dir);
        let mut normalized = Normalized::default();

        for mut annotation in annotations {
            if annotation.location.is_none() {
                normalized.annotations.push(annotation);
                continue;
            }
            let Some(location) = annotation.location.as_mut() else {
                continue;
            };

            match normalize_path(&working_dir, &location.path) {
                Ok(path) => location.path = path,
                Err(err) => {
                    normalized.rejected.push(err);
                    continue;
                }
            }

            if location.end_line != 0 && location.start_line > location.end_line {
                normalized.rejected.push(NormalizeError::InvalidLineRange {
                    path: location.path.clone(),
                    start: location.start_line,
                    end: location.end_line,
                });
                continue;
            }

            normalized.annotations.push(annotation);
        }

        normalized
    }
}

fn normalize_path(working_dir: &Path, raw: &str) -> Result<String, NormalizeError> {
    let outside = || NormalizeError::PathOutsideWorkingDir {
        path: raw.to_string(),
        working_dir: working_dir.to_string_lossy().into_owned(),
    };

    let candidate = PathBuf::from(raw.replace('\\', "/"));
    let absolute = if candidate.is_absolute() {
        clean_path(&candidate)
    } else {
        clean_path(&working_dir.join(&candidate))
    };

    if absolute == working_dir {
        return Err(NormalizeError::EmptyPath {
            path: raw.to_string(),
        });
    }
    relative_artifact_path(working_dir, &absolute).ok_or_else(outside)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileLocation;

    fn at(path: &str) -> Annotation {
        Annotation::test_failure("boom").with_location(FileLocation::new(path).with_lines(1, 2))
    }

    #[test]
    fn rewrites_absolute_and_dotted_paths() {
        let normalized = WorkingDirNormalizer.normalize(
            Path::new("/repo"),
            vec![at("/repo/src/lib.rs"), at("./tests/it.rs"), at("src\\win.rs")],
        );

        let paths: Vec<_> = normalized.annotations.iter().filter_map(|a| a.path()).collect();
        assert_eq!(paths, vec!["src/lib.rs", "tests/it.rs", "src/win.rs"]);
        assert!(!normalized.has_rejections());
    }

    #[test]
    fn rejects_paths_outside_working_dir() {
        let normalized = WorkingDirNormalizer.normalize(
            Path::new("/repo"),
            vec![at("/etc/passwd"), at("../sibling/x.rs"), at("ok.rs")],
        );

        assert_eq!(normalized.annotations.len(), 1);
        assert_eq!(normalized.rejected.len(), 2);
        assert!(matches!(
            normalized.rejected[0],
            NormalizeError::PathOutsideWorkingDir { .. }
        ));
    }

    #[test]
    fn rejects_inverted_line_ranges() {
        let bad = Annotation::test_failure("boom")
            .with_location(FileLocation::new("a.rs").with_lines(9, 3));
        let normalized = WorkingDirNormalizer.normalize(Path::new("/repo"), vec![bad]);

        assert!(normalized.annotations.is_empty());
        assert_eq!(
            normalized.rejected,
            vec![NormalizeError::InvalidLineRange {
                path: "a.rs".to_string(),
                start: 9,
                end: 3
            }]
        );
    }

    #[test]
    fn annotations_without_location_pass_through() {
        let normalized =
            WorkingDirNormalizer.normalize(Path::new("/repo"), vec![Annotation::test_failure("x")]);
        assert_eq!(normalized.annotations.len(), 1);
    }

    #[test]
    fn working_dir_itself_is_an_empty_path() {
        let normalized = WorkingDirNormalizer.normalize(Path::new("/repo"), vec![at("/repo/")]);
        assert!(matches!(normalized.rejected[0], NormalizeError::EmptyPath { .. }));
    }
}
