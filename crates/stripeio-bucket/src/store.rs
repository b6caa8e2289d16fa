//! Store bootstrap: bucket creation and lookup above the single-bucket
//! engine

use std::collections::BTreeSet;
use std::sync::Arc;
use stripeio_common::{validate_bucket_name, EngineConfig, Error, Result};
use stripeio_topology::NodeMap;
use tracing::debug;

use crate::bucket::Bucket;
use crate::metadata::BucketManifest;
use crate::placement::BUCKET_MANIFEST;

/// Entry point owning the node registry and engine configuration
pub struct Store {
    nodes: Arc<NodeMap>,
    config: EngineConfig,
}

impl Store {
    /// Create a store over a node registry
    pub fn new(nodes: NodeMap, config: EngineConfig) -> Result<Self> {
        if nodes.total_disks() == 0 {
            return Err(Error::invalid_argument(
                "store requires at least one disk",
            ));
        }
        Ok(Self {
            nodes: Arc::new(nodes),
            config,
        })
    }

    /// Create a store with the default engine configuration
    pub fn with_default_config(nodes: NodeMap) -> Result<Self> {
        Self::new(nodes, EngineConfig::default())
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Total disk count backing the store
    #[must_use]
    pub fn total_disks(&self) -> usize {
        self.nodes.total_disks()
    }

    /// Create a bucket: validate the name and replicate a fresh manifest
    /// to every disk
    pub async fn make_bucket(&self, name: &str, acl: &str) -> Result<Bucket> {
        validate_bucket_name(name)?;
        let bucket = Bucket::new(name, acl, Arc::clone(&self.nodes), self.config);
        if bucket.manifest_exists().await {
            return Err(Error::BucketAlreadyExists(name.to_string()));
        }
        bucket
            .store_manifest(&BucketManifest::new(name, acl))
            .await?;
        Ok(bucket)
    }

    /// Open an existing bucket from its replicated manifest
    pub async fn load_bucket(&self, name: &str) -> Result<Bucket> {
        validate_bucket_name(name)?;
        let probe = Bucket::new(name, "", Arc::clone(&self.nodes), self.config);
        let manifest = match probe.load_manifest().await {
            Ok(manifest) => manifest,
            Err(e) => {
                debug!(bucket = name, error = %e, "no decodable manifest replica");
                return Err(Error::BucketNotFound(name.to_string()));
            }
        };
        Ok(Bucket::from_manifest(
            &manifest,
            Arc::clone(&self.nodes),
            self.config,
        ))
    }

    /// Names of every bucket with a manifest on any disk, ascending
    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for slot in self.nodes.shard_slots() {
            for path in slot.disk.list("").await? {
                let mut parts = path.split('/');
                if let (Some(root), Some(file), None) =
                    (parts.next(), parts.next(), parts.next())
                {
                    if file == BUCKET_MANIFEST {
                        names.insert(root.to_string());
                    }
                }
            }
        }
        Ok(names.into_iter().collect())
    }
}
