//! On-disk metadata documents
//!
//! Both documents are JSON. The bucket manifest is replicated identically
//! on every disk; object metadata is replicated on every data-bearing
//! disk. Readers accept the first replica that decodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stripeio_common::Result;

/// Format version stamped into both documents
pub const METADATA_VERSION: &str = "1.0.0";

/// Bucket manifest (`bucket_metadata.json`)
///
/// `BucketObjects` and `Multiparts` are sets serialized as JSON objects
/// with empty-string values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BucketManifest {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ACL")]
    pub acl: String,
    #[serde(rename = "Created")]
    pub created: DateTime<Utc>,
    #[serde(rename = "Metadata")]
    pub metadata: BTreeMap<String, String>,
    #[serde(rename = "BucketObjects")]
    pub objects: BTreeMap<String, String>,
    #[serde(rename = "Multiparts")]
    pub multiparts: BTreeMap<String, String>,
}

impl BucketManifest {
    /// Fresh manifest for a just-created bucket
    #[must_use]
    pub fn new(name: impl Into<String>, acl: impl Into<String>) -> Self {
        Self {
            version: METADATA_VERSION.to_string(),
            name: name.into(),
            acl: acl.into(),
            created: Utc::now(),
            metadata: BTreeMap::new(),
            objects: BTreeMap::new(),
            multiparts: BTreeMap::new(),
        }
    }

    /// True when the normalized object name is cataloged
    #[must_use]
    pub fn contains_object(&self, normalized_object: &str) -> bool {
        self.objects.contains_key(normalized_object)
    }

    /// Catalog a normalized object name
    pub fn insert_object(&mut self, normalized_object: impl Into<String>) {
        self.objects.insert(normalized_object.into(), String::new());
    }

    /// Serialize for replication
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode one replica
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Per-object metadata (`object_metadata.json`)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectInfo {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Bucket")]
    pub bucket: String,
    #[serde(rename = "Object")]
    pub object: String,
    #[serde(rename = "Created")]
    pub created: DateTime<Utc>,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "BlockSize")]
    pub block_size: usize,
    #[serde(rename = "ChunkCount")]
    pub chunk_count: u64,
    #[serde(rename = "DataDisks")]
    pub data_disks: usize,
    #[serde(rename = "ParityDisks")]
    pub parity_disks: usize,
    #[serde(rename = "MD5Sum")]
    pub md5_hex: String,
    #[serde(rename = "SHA512Sum")]
    pub sha512_hex: String,
    #[serde(rename = "Metadata")]
    pub user_metadata: BTreeMap<String, String>,
}

impl ObjectInfo {
    /// Serialize for replication
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode one replica
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}
