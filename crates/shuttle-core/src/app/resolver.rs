//! PathResolver - glob パターンを作業ディレクトリ内の具体的なファイルに解決
//!
//! # 設計原則
//! - 相対パターンは作業ディレクトリ配下に結合し、字句的に正規化してから glob する
//!   （`..` で外に出るパターンも包含チェックで捕まえるため）
//! - マッチした全パスが `working_dir/**` に一致しなければ、その場で全体を中止
//! - 1 つでも違反があればアップロードは一切始まらない
//! - 末尾の `**` はその配下のすべてのエントリに一致する（`build/**` → `build/**/*`）

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::domain::{ArtifactError, ProcessedPath};
use crate::ports::TextExpander;

/// `*` stays inside one path segment; only `**` recurses.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

pub struct PathResolver<'a> {
    working_dir: PathBuf,
    expander: &'a dyn TextExpander,
}

impl<'a> PathResolver<'a> {
    pub fn new(working_dir: impl AsRef<Path>, expander: &'a dyn TextExpander) -> Self {
        Self {
            working_dir: clean_path(working_dir.as_ref()),
            expander,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolves every pattern, in order. The first failure aborts the whole
    /// instruction; no partial result is returned.
    pub fn resolve(
        &self,
        patterns: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Vec<ProcessedPath>, ArtifactError> {
        let containment = self.containment_pattern()?;
        let mut processed = Vec::with_capacity(patterns.len());

        for raw in patterns {
            let pattern = self.absolute_pattern(raw, env);
            let paths = glob_paths(&pattern)?;

            for path in &paths {
                if !containment.matches_path_with(path, MATCH_OPTIONS) {
                    tracing::warn!(
                        path = %path.display(),
                        working_dir = %self.working_dir.display(),
                        "artifact path escapes the working directory"
                    );
                    return Err(ArtifactError::PathOutsideWorkingDir {
                        path: path.clone(),
                        working_dir: self.working_dir.clone(),
                    });
                }
            }

            tracing::debug!(pattern = %pattern, matched = paths.len(), "resolved artifact pattern");
            processed.push(ProcessedPath::new(pattern, paths));
        }

        Ok(processed)
    }

    fn absolute_pattern(&self, raw: &str, env: &HashMap<String, String>) -> String {
        let expanded = self.expander.expand(raw, env);
        let joined = if Path::new(&expanded).is_absolute() {
            PathBuf::from(expanded)
        } else {
            // The working dir is literal text, not part of the pattern.
            PathBuf::from(Pattern::escape(&self.working_dir.to_string_lossy())).join(expanded)
        };
        let mut cleaned = clean_path(&joined);
        if cleaned.file_name().is_some_and(|name| name == "**") {
            cleaned.push("*");
        }
        cleaned.to_string_lossy().into_owned()
    }

    fn containment_pattern(&self) -> Result<Pattern, ArtifactError> {
        let escaped = Pattern::escape(&self.working_dir.to_string_lossy());
        let matcher = if escaped.ends_with('/') {
            format!("{escaped}**")
        } else {
            format!("{escaped}/**")
        };
        Pattern::new(&matcher).map_err(|source| ArtifactError::InvalidPattern {
            pattern: matcher.clone(),
            source,
        })
    }
}

fn glob_paths(pattern: &str) -> Result<Vec<PathBuf>, ArtifactError> {
    let entries =
        glob::glob_with(pattern, MATCH_OPTIONS).map_err(|source| ArtifactError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

    entries
        .map(|entry| {
            entry.map_err(|source| ArtifactError::ListArtifacts {
                pattern: pattern.to_string(),
                source,
            })
        })
        .collect()
}

/// Lexically normalizes a path: drops `.`, folds `..` into its parent.
/// `..` directly under the root stays at the root.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Slash-separated path of `path` relative to `working_dir`, or `None` if
/// `path` is not below it.
pub fn relative_artifact_path(working_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(working_dir).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::EnvExpander;
    use rstest::rstest;
    use std::fs;

    fn env_for(dir: &Path) -> HashMap<String, String> {
        HashMap::from([(
            "CIRRUS_WORKING_DIR".to_string(),
            dir.to_string_lossy().into_owned(),
        )])
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[rstest]
    #[case::dot("/w/./a", "/w/a")]
    #[case::parent("/w/a/../b", "/w/b")]
    #[case::escape("/w/../secret.txt", "/secret.txt")]
    #[case::above_root("/../../etc", "/etc")]
    #[case::relative_parent("../x", "../x")]
    #[case::empty(".", ".")]
    fn clean_path_folds_dots(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_path(Path::new(input)), PathBuf::from(expected));
    }

    #[test]
    fn relative_path_is_slash_separated() {
        let rel = relative_artifact_path(Path::new("/repo"), Path::new("/repo/build/a.xml"));
        assert_eq!(rel.as_deref(), Some("build/a.xml"));
        assert_eq!(relative_artifact_path(Path::new("/repo"), Path::new("/etc/passwd")), None);
        assert_eq!(relative_artifact_path(Path::new("/repo"), Path::new("/repo")), None);
    }

    #[test]
    fn single_star_does_not_recurse() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("build/a.xml"));
        touch(&dir.path().join("build/nested/c.xml"));
        let expander = EnvExpander;
        let resolver = PathResolver::new(dir.path(), &expander);

        let processed = resolver
            .resolve(&["build/*.xml".to_string()], &env_for(dir.path()))
            .unwrap();

        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].paths, vec![dir.path().join("build/a.xml")]);
    }

    #[test]
    fn double_star_recurses_in_listing_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("build/b.xml"));
        touch(&dir.path().join("build/a.xml"));
        touch(&dir.path().join("build/nested/c.xml"));
        let expander = EnvExpander;
        let resolver = PathResolver::new(dir.path(), &expander);

        let processed = resolver
            .resolve(&["build/**/*.xml".to_string()], &env_for(dir.path()))
            .unwrap();

        let names: Vec<_> = processed[0]
            .paths
            .iter()
            .map(|p| relative_artifact_path(dir.path(), p).unwrap())
            .collect();
        assert_eq!(names, vec!["build/a.xml", "build/b.xml", "build/nested/c.xml"]);
    }

    #[rstest]
    #[case::trailing("build/**")]
    #[case::everything("**")]
    fn trailing_double_star_matches_files_below(#[case] pattern: &str) {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("build/a.xml"));
        touch(&dir.path().join("build/nested/c.xml"));
        let expander = EnvExpander;
        let resolver = PathResolver::new(dir.path(), &expander);

        let processed = resolver
            .resolve(&[pattern.to_string()], &env_for(dir.path()))
            .unwrap();

        let mut files: Vec<_> = processed[0]
            .paths
            .iter()
            .filter(|p| p.is_file())
            .map(|p| relative_artifact_path(dir.path(), p).unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["build/a.xml", "build/nested/c.xml"]);
    }

    #[test]
    fn glob_characters_in_working_dir_are_literal() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("re[po]*");
        touch(&work.join("build/a.xml"));
        touch(&root.path().join("rep/build/b.xml"));
        let expander = EnvExpander;
        let resolver = PathResolver::new(&work, &expander);

        let processed = resolver
            .resolve(&["build/*.xml".to_string()], &env_for(&work))
            .unwrap();

        assert_eq!(processed[0].paths, vec![work.join("build/a.xml")]);
    }

    #[test]
    fn placeholders_are_expanded_before_matching() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("out/report.txt"));
        let expander = EnvExpander;
        let resolver = PathResolver::new(dir.path(), &expander);

        let processed = resolver
            .resolve(
                &["$CIRRUS_WORKING_DIR/out/*.txt".to_string()],
                &env_for(dir.path()),
            )
            .unwrap();

        assert_eq!(processed[0].paths, vec![dir.path().join("out/report.txt")]);
    }

    #[test]
    fn parent_escape_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        fs::create_dir_all(&work).unwrap();
        touch(&root.path().join("secret.txt"));
        let expander = EnvExpander;
        let resolver = PathResolver::new(&work, &expander);

        let err = resolver
            .resolve(&["../secret.txt".to_string()], &env_for(&work))
            .unwrap_err();

        assert!(err.is_path_outside_working_dir());
        assert!(err.to_string().contains("secret.txt"));
    }

    #[test]
    fn violation_in_any_pattern_aborts_everything() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        touch(&work.join("ok.txt"));
        touch(&root.path().join("outside.txt"));
        let expander = EnvExpander;
        let resolver = PathResolver::new(&work, &expander);
        let outside = root.path().join("outside.txt").to_string_lossy().into_owned();

        let result = resolver.resolve(&["ok.txt".to_string(), outside], &env_for(&work));

        assert!(result.unwrap_err().is_path_outside_working_dir());
    }

    #[test]
    fn sibling_with_shared_prefix_is_outside() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        fs::create_dir_all(&work).unwrap();
        touch(&root.path().join("work-other/file.txt"));
        let expander = EnvExpander;
        let resolver = PathResolver::new(&work, &expander);

        let err = resolver
            .resolve(&["../work-other/*.txt".to_string()], &env_for(&work))
            .unwrap_err();

        assert!(err.is_path_outside_working_dir());
    }

    #[test]
    fn malformed_glob_is_a_retryable_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let expander = EnvExpander;
        let resolver = PathResolver::new(dir.path(), &expander);

        let err = resolver
            .resolve(&["build/[".to_string()], &env_for(dir.path()))
            .unwrap_err();

        assert!(matches!(err, ArtifactError::InvalidPattern { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn no_matches_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let expander = EnvExpander;
        let resolver = PathResolver::new(dir.path(), &expander);

        let processed = resolver
            .resolve(&["missing/*.bin".to_string()], &env_for(dir.path()))
            .unwrap();

        assert_eq!(processed.len(), 1);
        assert!(processed[0].paths.is_empty());
    }
}
