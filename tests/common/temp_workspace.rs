use std::path::PathBuf;
use std::sync::Arc;

use kadabra_conductor::workspace::ProjectWorkspace;
use tempfile::TempDir;

/// Files parsed from a fixture string, plus the cursor.
#[derive(Debug)]
pub struct Fixture {
    /// Relative path and content of each file.
    pub files: Vec<(PathBuf, String)>,
    /// File, 1-based line and 1-based character of the `$0` marker.
    pub cursor: (PathBuf, u32, u32),
}

/// Splits a fixture into files at `//- path` markers and locates `$0`.
///
/// ## Panics
/// if input is malformed or cursor is not found
pub fn parse_fixture(input: &str) -> Fixture {
    let mut files = Vec::new();
    let mut current_path: Option<PathBuf> = None;
    let mut current_content = String::new();
    let mut cursor = None;

    for line in input.lines() {
        if let Some(path) = line.strip_prefix("//- ") {
            if let Some(p) = current_path.take() {
                files.push((p, std::mem::take(&mut current_content)));
            }
            current_path = Some(PathBuf::from(path.trim_start_matches('/')));
        } else {
            let mut l = line.to_string();
            if let Some(idx) = l.find("$0") {
                let line_no = u32::try_from(current_content.lines().count() + 1)
                    .expect("line count out of range");
                let col = u32::try_from(idx + 1).expect("line index out of range");
                cursor = Some((
                    current_path.clone().expect("cursor before first file marker"),
                    line_no,
                    col,
                ));
                l = l.replace("$0", "");
            }
            current_content.push_str(&l);
            current_content.push('\n');
        }
    }

    if let Some(p) = current_path {
        files.push((p, current_content));
    }

    Fixture {
        files,
        cursor: cursor.expect("missing $0 cursor"),
    }
}

/// A project written to a temporary directory.
pub struct TestWorkspace {
    /// Keeps the directory alive.
    pub root: TempDir,
    /// Parsed fixture.
    pub fixture: Fixture,
    /// Canonicalized root path (resolves symlinks like /var -> /private/var on macOS)
    canonical_root: PathBuf,
}

impl TestWorkspace {
    /// Writes `fixture` into a fresh temporary directory.
    /// ## Panics
    pub fn new(fixture: &str) -> Self {
        let root = TempDir::new().expect("Failed to create temp directory");
        let fixture = parse_fixture(fixture);

        for (path, content) in &fixture.files {
            let abs = root.path().join(path);
            std::fs::create_dir_all(abs.parent().unwrap()).unwrap();
            std::fs::write(&abs, content).unwrap();
        }

        let canonical_root = root
            .path()
            .canonicalize()
            .expect("Failed to canonicalize root");

        Self {
            root,
            fixture,
            canonical_root,
        }
    }

    /// Returns the canonicalized root path
    pub fn canonical_root(&self) -> &PathBuf {
        &self.canonical_root
    }

    /// Converts a relative path to an absolute path
    pub fn apath(&self, path: &str) -> PathBuf {
        self.canonical_root.join(path)
    }

    /// Relative path, line and character of the cursor.
    pub fn cursor(&self) -> (String, u32, u32) {
        let (path, line, character) = &self.fixture.cursor;
        (path.display().to_string(), *line, *character)
    }

    /// A resolver whose default root is this workspace.
    pub fn workspace(&self) -> Arc<ProjectWorkspace> {
        Arc::new(ProjectWorkspace::with_default_root(self.canonical_root.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixture_cursor() {
        let fixture = parse_fixture(
            "//- /src/lib.rs\npub fn add() {}\n//- /src/main.rs\nfn main() {\n    a$0dd();\n}\n",
        );
        assert_eq!(fixture.files.len(), 2);
        assert_eq!(fixture.cursor, (PathBuf::from("src/main.rs"), 2, 6));
        assert!(!fixture.files[1].1.contains("$0"));
    }
}
