//! key-value parameter store used to hand resource identifiers between stacks
//!
//! Paths are hierarchical: `/{namespace}/{env_name}/{component}/{field}`. Values are opaque
//! strings (ARNs, names, comma-joined lists). An empty value is treated as if the path did not
//! exist.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Read/write access to a parameter store
///
/// Retry and backoff are the implementation's business; callers treat every error as final.
pub trait ParameterStore {
    /// Read the value at `path`
    fn get(&self, path: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` at `path`, overwriting any previous value
    fn put(&mut self, path: &str, value: &str) -> Result<(), StoreError>;

    /// Read a value that must exist and be non-empty
    fn resolve(&self, path: &str) -> Result<String, UnresolvedParameterError> {
        match self.get(path) {
            Ok(Some(value)) if !value.is_empty() => {
                tracing::debug!(path, "parameter resolved");
                Ok(value)
            }
            Ok(_) => Err(UnresolvedParameterError::new(path, None)),
            Err(e) => Err(UnresolvedParameterError::new(path, Some(e))),
        }
    }

    fn publish(&mut self, path: &str, value: &str) -> Result<(), StoreError> {
        tracing::info!(path, value, "publishing parameter");
        self.put(path, value)
    }
}

/// Points into the parameter store relative to the run's namespace and environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterReference {
    pub component: String,
    pub field: String,
}

impl ParameterReference {
    pub fn new(component: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            field: field.into(),
        }
    }

    pub fn path(&self, namespace: &str, env_name: &str) -> String {
        parameter_path(namespace, env_name, &self.component, &self.field)
    }
}

pub fn parameter_path(namespace: &str, env_name: &str, component: &str, field: &str) -> String {
    format!("/{namespace}/{env_name}/{component}/{field}")
}

/// Parameter store kept in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryParameterStore {
    values: IndexMap<String, String>,
}

impl InMemoryParameterStore {
    pub fn values(&self) -> &IndexMap<String, String> {
        &self.values
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InMemoryParameterStore {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ParameterStore for InMemoryParameterStore {
    fn get(&self, path: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(path).cloned())
    }

    fn put(&mut self, path: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(path.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Parameter store backed by a yaml file (`path: value` per line)
///
/// Every write rewrites the whole file.
#[derive(Debug)]
pub struct FileParameterStore {
    file_path: PathBuf,
    inner: InMemoryParameterStore,
}

impl FileParameterStore {
    /// Open a store file. A missing file is an empty store.
    pub fn open(file_path: &Path) -> Result<Self, StoreError> {
        let values = if file_path.exists() {
            tracing::info!(path=%file_path.display(), "loading parameter store");
            let contents = std::fs::read_to_string(file_path)?;
            if contents.trim().is_empty() {
                IndexMap::default()
            } else {
                serde_yaml::from_str(&contents)?
            }
        } else {
            IndexMap::default()
        };

        Ok(Self {
            file_path: file_path.to_owned(),
            inner: InMemoryParameterStore { values },
        })
    }

    fn save(&self) -> Result<(), StoreError> {
        let contents = serde_yaml::to_string(self.inner.values())?;
        std::fs::write(&self.file_path, contents)?;
        Ok(())
    }
}

impl ParameterStore for FileParameterStore {
    fn get(&self, path: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(path)
    }

    fn put(&mut self, path: &str, value: &str) -> Result<(), StoreError> {
        self.inner.put(path, value)?;
        self.save()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Parameter file is not a valid yaml map")]
    Format(#[from] serde_yaml::Error),
}

/// A required parameter is missing or empty
#[derive(thiserror::Error, Debug)]
#[error("Unresolved parameter {path}")]
pub struct UnresolvedParameterError {
    pub path: String,
    #[source]
    pub source: Option<StoreError>,
}

impl UnresolvedParameterError {
    pub fn new(path: &str, source: Option<StoreError>) -> Self {
        Self {
            path: path.to_owned(),
            source,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reference_path() {
        let reference = ParameterReference::new("data-services-baseline", "glue-role-arn");
        assert_eq!(
            reference.path("cdk", "dev"),
            "/cdk/dev/data-services-baseline/glue-role-arn"
        );
    }

    #[test]
    fn resolve_missing_and_empty() {
        let store: InMemoryParameterStore = [("/a", "value"), ("/empty", "")].into_iter().collect();

        assert_eq!(store.resolve("/a").unwrap(), "value");
        assert_eq!(store.resolve("/missing").unwrap_err().path, "/missing");
        assert_eq!(store.resolve("/empty").unwrap_err().path, "/empty");
    }

    #[test]
    fn publish_overwrites() {
        let mut store = InMemoryParameterStore::default();
        store.publish("/a", "one").unwrap();
        store.publish("/a", "two").unwrap();
        assert_eq!(store.resolve("/a").unwrap(), "two");
        assert_eq!(store.values().len(), 1);
    }

    #[test]
    fn file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("parameters.yaml");

        let mut store = FileParameterStore::open(&file).unwrap();
        assert_eq!(store.get("/cdk/dev/x/y").unwrap(), None);
        store.publish("/cdk/dev/x/y", "arn:aws:s3:::bucket").unwrap();

        let reopened = FileParameterStore::open(&file).unwrap();
        assert_eq!(reopened.resolve("/cdk/dev/x/y").unwrap(), "arn:aws:s3:::bucket");
    }
}
