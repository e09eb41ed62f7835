//! discovery and loading of configuration documents
//!
//! [discover] walks a directory tree depth-first and returns every file whose name ends with the
//! configured suffix. Entries are returned in the order the filesystem yields them; nothing is
//! sorted, so the order is only good for display.
//!
//! [ConfigDocument] pairs the raw text of one file with its path. The path is kept so rendering
//! errors can point back at the file that caused them.
use std::path::{Path, PathBuf};

/// Default suffix of job configuration documents
pub const DEFAULT_SUFFIX: &str = ".yaml";

/// Raw text of a single discovered file
#[derive(Debug, Clone, derive_new::new)]
pub struct ConfigDocument {
    pub path: PathBuf,
    pub raw_content: String,
}

impl ConfigDocument {
    pub fn load(path: &Path) -> Result<Self, DiscoveryError> {
        tracing::info!(path=%path.display(), "loading file");

        let raw_content = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
            path: path.to_owned(),
            source,
        })?;

        Ok(Self::new(path.to_owned(), raw_content))
    }
}

/// Recursively collect all files below `root_dir` whose name ends with `suffix`
pub fn discover(root_dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root_dir.exists() {
        return Err(DiscoveryError::RootMissing(root_dir.to_owned()));
    }

    if !root_dir.is_dir() {
        return Err(DiscoveryError::NotADirectory(root_dir.to_owned()));
    }

    let mut found = vec![];
    visit_directory(root_dir, suffix, &mut found)?;

    tracing::debug!(root=%root_dir.display(), count = found.len(), "discovery finished");
    Ok(found)
}

/// Discover and read every matching document below `root_dir`
pub fn load_all(root_dir: &Path, suffix: &str) -> Result<Vec<ConfigDocument>, DiscoveryError> {
    discover(root_dir, suffix)?
        .iter()
        .map(|path| ConfigDocument::load(path))
        .collect()
}

fn visit_directory(
    dir_path: &Path,
    suffix: &str,
    found: &mut Vec<PathBuf>,
) -> Result<(), DiscoveryError> {
    let traversal_error = |source| DiscoveryError::Traverse {
        path: dir_path.to_owned(),
        source,
    };

    let read_dir = std::fs::read_dir(dir_path).map_err(traversal_error)?;
    for dir_entry in read_dir {
        let dir_entry = dir_entry.map_err(traversal_error)?;
        let file_type = dir_entry.file_type().map_err(traversal_error)?;
        let entry_path = dir_entry.path();

        if file_type.is_dir() {
            visit_directory(&entry_path, suffix, found)?;
            continue;
        }

        let matches_suffix = dir_entry.file_name().to_string_lossy().ends_with(suffix);
        if !matches_suffix {
            continue;
        }

        tracing::trace!(path=%entry_path.display(), "discovered");
        found.push(entry_path);
    }

    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("Config root {0} does not exist")]
    RootMissing(PathBuf),
    #[error("Config root {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("Unable to traverse {path}")]
    Traverse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn finds_nested_files_with_suffix() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("a/job_a.yaml"), "a");
        touch(&root.path().join("a/b/c/job_c.yaml"), "c");
        touch(&root.path().join("b/readme.md"), "ignored");
        touch(&root.path().join("job_root.yaml"), "root");

        let mut found: Vec<_> = discover(root.path(), ".yaml")
            .unwrap()
            .into_iter()
            .map(|path| path.strip_prefix(root.path()).unwrap().to_owned())
            .collect();
        found.sort();

        assert_eq!(
            found,
            vec![
                PathBuf::from("a/b/c/job_c.yaml"),
                PathBuf::from("a/job_a.yaml"),
                PathBuf::from("job_root.yaml"),
            ]
        );
    }

    #[test]
    fn directories_are_not_matched_by_suffix() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("looks_like.yaml")).unwrap();

        assert!(discover(root.path(), ".yaml").unwrap().is_empty());
    }

    #[test]
    fn missing_root_errors() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");

        let err = discover(&missing, ".yaml").unwrap_err();
        assert!(matches!(err, DiscoveryError::RootMissing(path) if path == missing));
    }

    #[test]
    fn file_as_root_errors() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("file.yaml");
        touch(&file, "x");

        assert!(matches!(
            discover(&file, ".yaml"),
            Err(DiscoveryError::NotADirectory(_))
        ));
    }

    #[test]
    fn load_all_reads_contents() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("nested/job.yaml"), "jobConfig: {}");

        let documents = load_all(root.path(), ".yaml").unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].raw_content, "jobConfig: {}");
    }
}
