// ── Discovery boundary ──
//
// Discovery yields plain records for the requested types. Live
// configuration queries sit behind the same trait as the offline
// snapshot, so controllers never care where records came from.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::ObjectRecord;
use crate::registry::TypeRegistry;
use crate::snapshot;

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Every object whose type is one of `types`. Unparseable or
    /// unrecognized records are skipped, never reported as errors.
    async fn objects(&self, types: &[&str]) -> Result<Vec<ObjectRecord>, CoreError>;
}

/// A fixed list of records.
#[derive(Debug, Default, Clone)]
pub struct StaticDiscovery {
    records: Vec<ObjectRecord>,
}

impl StaticDiscovery {
    pub fn new(records: Vec<ObjectRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn objects(&self, types: &[&str]) -> Result<Vec<ObjectRecord>, CoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| types.contains(&r.type_name.as_str()))
            .cloned()
            .collect())
    }
}

/// Records read from a Design Center backup on every call.
#[derive(Debug, Clone)]
pub struct SnapshotDiscovery {
    path: PathBuf,
    registry: TypeRegistry,
}

impl SnapshotDiscovery {
    pub fn new(path: impl Into<PathBuf>, registry: TypeRegistry) -> Self {
        Self {
            path: path.into(),
            registry,
        }
    }
}

#[async_trait]
impl Discovery for SnapshotDiscovery {
    async fn objects(&self, types: &[&str]) -> Result<Vec<ObjectRecord>, CoreError> {
        let records = snapshot::read_objects(&self.path, &self.registry).await?;
        Ok(records
            .into_iter()
            .filter(|r| types.contains(&r.type_name.as_str()))
            .collect())
    }
}
