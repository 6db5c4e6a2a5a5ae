use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use roster_core::backend::{BackendClient, BackendError};
use roster_core::store::{MemoryTableStore, RestTableStore, StoreError};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug)]
pub enum SetupError {
    Backend(BackendError),
    ReadSeed { path: PathBuf, source: std::io::Error },
    ParseSeed { path: PathBuf, source: serde_json::Error },
    Seed(StoreError),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "failed to build backend client: {err}"),
            Self::ReadSeed { path, source } => {
                write!(f, "failed to read seed file {}: {source}", path.display())
            }
            Self::ParseSeed { path, source } => {
                write!(f, "seed file {} is not a JSON object of tables: {source}", path.display())
            }
            Self::Seed(err) => write!(f, "invalid seed data: {err}"),
        }
    }
}

impl Error for SetupError {}

pub fn build_rest_store(url: &str, service_key: &str) -> Result<RestTableStore, SetupError> {
    let client = BackendClient::new(url, service_key).map_err(SetupError::Backend)?;
    info!(url = %client.base_url(), "using REST database backend");
    Ok(RestTableStore::new(client))
}

pub fn build_memory_store(seed: Option<&Path>) -> Result<MemoryTableStore, SetupError> {
    let Some(path) = seed else {
        info!("using empty in-memory database");
        return Ok(MemoryTableStore::new());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| SetupError::ReadSeed {
        path: path.to_path_buf(),
        source,
    })?;
    let tables = serde_json::from_str::<Map<String, Value>>(&raw).map_err(|source| {
        SetupError::ParseSeed {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let table_count = tables.len();
    let store = MemoryTableStore::from_seed(tables).map_err(SetupError::Seed)?;
    info!(seed = %path.display(), tables = table_count, "using seeded in-memory database");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_seed(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("roster-mcpd-{}-{name}.json", std::process::id()));
        std::fs::write(&path, contents).expect("write seed file");
        path
    }

    #[tokio::test]
    async fn loads_seed_tables() {
        let path = write_seed("valid", r#"{"scouts": [{"full_name": "Ada"}], "userroles": []}"#);

        let store = build_memory_store(Some(&path)).expect("seed loads");
        std::fs::remove_file(&path).ok();

        assert_eq!(store.table_names().await, vec!["scouts".to_string(), "userroles".to_string()]);
        assert_eq!(store.rows("scouts").await.len(), 1);
    }

    #[test]
    fn reports_unreadable_and_malformed_seeds() {
        let missing = std::env::temp_dir().join("roster-mcpd-does-not-exist.json");
        assert!(matches!(
            build_memory_store(Some(&missing)),
            Err(SetupError::ReadSeed { .. })
        ));

        let path = write_seed("malformed", "[1, 2, 3]");
        let result = build_memory_store(Some(&path));
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(SetupError::ParseSeed { .. })));
    }

    #[test]
    fn rejects_unparseable_backend_url() {
        assert!(matches!(
            build_rest_store("not a url", "key"),
            Err(SetupError::Backend(_))
        ));
    }
}
