//! Bucket catalog
//!
//! One mutual-exclusion guard per bucket serializes every catalog and
//! object operation. Metadata and listing operations hold it from entry to
//! return; `read_object` holds it through planning and metadata load, then
//! releases it when the background producer starts.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use stripeio_common::{
    normalize_object_name, validate_object_name, EngineConfig, Error, Result,
};
use stripeio_topology::{NodeMap, ShardReader};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::metadata::{BucketManifest, ObjectInfo};
use crate::pipeline::{self, SignatureVerifier};
use crate::placement::{Placement, STREAM_DATA, STREAM_OBJECT_METADATA};
use crate::stream::ByteStream;

/// Capacity of the read pipe, in blocks; the producer blocks once the
/// consumer falls this far behind
const READ_PIPE_BLOCKS: usize = 2;

/// Result of a `list_objects` call
#[derive(Debug, Default)]
pub struct ObjectListing {
    /// Matched objects with their metadata, ascending by name
    pub objects: BTreeMap<String, ObjectInfo>,
    /// Delimiter-collapsed prefixes, ascending, deduplicated
    pub common_prefixes: Vec<String>,
    /// True when the object map was cut at `max_keys`
    pub is_truncated: bool,
}

/// One bucket over a node registry
///
/// The registry reference is shared-immutable; all mutation of the
/// bucket's durable state happens under `guard`.
pub struct Bucket {
    name: String,
    acl: String,
    created: DateTime<Utc>,
    xl_name: String,
    nodes: Arc<NodeMap>,
    placement: Placement,
    config: EngineConfig,
    guard: Mutex<()>,
}

impl Bucket {
    pub(crate) fn new(
        name: &str,
        acl: &str,
        nodes: Arc<NodeMap>,
        config: EngineConfig,
    ) -> Self {
        // The bucket name doubles as the stable on-disk root
        let xl_name = name.to_string();
        let placement = Placement::new(&xl_name, name, &nodes);
        Self {
            name: name.to_string(),
            acl: acl.to_string(),
            created: Utc::now(),
            xl_name,
            nodes,
            placement,
            config,
            guard: Mutex::new(()),
        }
    }

    pub(crate) fn from_manifest(
        manifest: &BucketManifest,
        nodes: Arc<NodeMap>,
        config: EngineConfig,
    ) -> Self {
        let mut bucket = Self::new(&manifest.name, &manifest.acl, nodes, config);
        bucket.created = manifest.created;
        bucket
    }

    /// Bucket name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket ACL
    #[must_use]
    pub fn acl(&self) -> &str {
        &self.acl
    }

    /// Creation time
    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Stable on-disk root shared across all backing disks
    #[must_use]
    pub fn xl_name(&self) -> &str {
        &self.xl_name
    }

    /// Node registry backing this bucket
    #[must_use]
    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    /// Write one object from a byte stream
    ///
    /// On success the object is durable: shard files and metadata replicas
    /// on every disk, plus a manifest entry. On any failure no partial
    /// state is promoted.
    pub async fn write_object(
        &self,
        object: &str,
        stream: ByteStream,
        declared_size: u64,
        expected_md5: Option<&str>,
        user_metadata: BTreeMap<String, String>,
        signature: Option<&dyn SignatureVerifier>,
    ) -> Result<ObjectInfo> {
        validate_object_name(object)?;
        let normalized = normalize_object_name(object);

        let _guard = self.guard.lock().await;
        let info = pipeline::write_object_stream(
            &self.placement,
            &self.config,
            &self.name,
            &normalized,
            stream,
            declared_size,
            expected_md5,
            user_metadata,
            signature,
        )
        .await?;

        let mut manifest = self.load_manifest().await?;
        manifest.insert_object(&normalized);
        self.store_manifest(&manifest).await?;
        Ok(info)
    }

    /// Read one object back as a byte stream plus its size
    ///
    /// The stream is fed by a background producer; integrity errors and
    /// shard-threshold failures arrive in-band as stream items.
    pub async fn read_object(&self, object: &str) -> Result<(ByteStream, u64)> {
        validate_object_name(object)?;
        let normalized = normalize_object_name(object);

        let guard = self.guard.lock().await;
        let manifest = self.load_manifest().await?;
        if !manifest.contains_object(&normalized) {
            return Err(Error::ObjectNotFound {
                bucket: self.name.clone(),
                object: normalized,
            });
        }
        let info = self.load_object_info(&normalized).await?;

        // Missing disks become null slots; the producer evaluates the
        // shard-count threshold per chunk
        let mut readers: Vec<Option<ShardReader>> = Vec::with_capacity(self.placement.total_disks());
        for slot in self.placement.slots() {
            let path = self.placement.shard_path(slot, &normalized, STREAM_DATA);
            match slot.disk.open(&path).await {
                Ok(reader) => readers.push(Some(reader)),
                Err(e) => {
                    warn!(disk = slot.disk.id(), path = %path, error = %e, "shard open failed");
                    readers.push(None);
                }
            }
        }

        let size = info.size;
        let (tx, rx) = mpsc::channel(READ_PIPE_BLOCKS);
        tokio::spawn(pipeline::produce_read(info, readers, tx));
        drop(guard);

        let stream: ByteStream = Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }));
        Ok((stream, size))
    }

    /// Metadata of one cataloged object
    pub async fn get_object_metadata(&self, object: &str) -> Result<ObjectInfo> {
        validate_object_name(object)?;
        let normalized = normalize_object_name(object);

        let _guard = self.guard.lock().await;
        let manifest = self.load_manifest().await?;
        if !manifest.contains_object(&normalized) {
            return Err(Error::ObjectNotFound {
                bucket: self.name.clone(),
                object: normalized,
            });
        }
        self.load_object_info(&normalized).await
    }

    /// List cataloged objects
    ///
    /// Keeps names with `starts_with(prefix)` strictly greater than
    /// `marker`. With a non-empty `delimiter` the prefix-trimmed remainder
    /// is split at its first delimiter occurrence: names containing it
    /// collapse into `common_prefixes`, the rest are returned as objects.
    /// `max_keys <= 0` defaults to the configured cap.
    pub async fn list_objects(
        &self,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: i64,
    ) -> Result<ObjectListing> {
        let _guard = self.guard.lock().await;
        let manifest = self.load_manifest().await?;

        let max_keys = if max_keys <= 0 {
            self.config.list_max_keys
        } else {
            max_keys as usize
        };

        let mut matched = BTreeSet::new();
        let mut common_prefixes = BTreeSet::new();
        for name in manifest.objects.keys() {
            if !name.starts_with(prefix) || name.as_str() <= marker {
                continue;
            }
            let trimmed = &name[prefix.len()..];
            if !delimiter.is_empty() {
                if let Some(pos) = trimmed.find(delimiter) {
                    let collapsed = &trimmed[..pos + delimiter.len()];
                    common_prefixes.insert(format!("{prefix}{collapsed}"));
                    continue;
                }
            }
            matched.insert(name.clone());
        }

        let mut listing = ObjectListing {
            common_prefixes: common_prefixes.into_iter().collect(),
            ..ObjectListing::default()
        };
        for name in matched {
            if listing.objects.len() == max_keys {
                listing.is_truncated = true;
                break;
            }
            let info = self.load_object_info(&name).await?;
            listing.objects.insert(name, info);
        }
        Ok(listing)
    }

    /// True when a manifest replica decodes on any disk
    pub(crate) async fn manifest_exists(&self) -> bool {
        self.load_manifest().await.is_ok()
    }

    /// Read the manifest: every disk of every node is tried in placement
    /// order and the first replica that decodes wins
    pub(crate) async fn load_manifest(&self) -> Result<BucketManifest> {
        let path = self.placement.manifest_path();
        let mut last_err: Option<Error> = None;
        for slot in self.placement.slots() {
            match slot.disk.read_document(&path).await {
                Ok(bytes) => match BucketManifest::from_json(&bytes) {
                    Ok(manifest) => return Ok(manifest),
                    Err(e) => {
                        debug!(disk = slot.disk.id(), error = %e, "manifest replica skipped");
                        last_err = Some(e);
                    }
                },
                Err(e) => {
                    debug!(disk = slot.disk.id(), error = %e, "manifest replica unreadable");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::BucketNotFound(self.name.clone())))
    }

    /// Write the manifest to every disk; any failure aborts
    pub(crate) async fn store_manifest(&self, manifest: &BucketManifest) -> Result<()> {
        let path = self.placement.manifest_path();
        let json = manifest.to_json()?;
        let results = join_all(self.placement.slots().iter().map(|slot| {
            let path = &path;
            let json = &json;
            async move { slot.disk.write_document(path, json).await }
        }))
        .await;
        for result in results {
            result?;
        }
        Ok(())
    }

    /// Load object metadata: first replica that decodes wins; when every
    /// replica fails the last error surfaces
    async fn load_object_info(&self, normalized_object: &str) -> Result<ObjectInfo> {
        let mut last_err: Option<Error> = None;
        for slot in self.placement.slots() {
            let path = self
                .placement
                .shard_path(slot, normalized_object, STREAM_OBJECT_METADATA);
            match slot.disk.read_document(&path).await {
                Ok(bytes) => match ObjectInfo::from_json(&bytes) {
                    Ok(info) => return Ok(info),
                    Err(e) => {
                        debug!(disk = slot.disk.id(), error = %e, "object metadata replica skipped");
                        last_err = Some(e);
                    }
                },
                Err(e) => {
                    debug!(disk = slot.disk.id(), error = %e, "object metadata replica unreadable");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::ObjectNotFound {
            bucket: self.name.clone(),
            object: normalized_object.to_string(),
        }))
    }
}
