//! Object pipeline
//!
//! Write: chunk the client stream into fixed blocks, encode each block into
//! one shard per disk, fan the shard writes out in parallel, and roll
//! MD5/SHA-512 (plus SHA-256 when a signature has to be checked) over the
//! raw bytes. Chunks are strictly sequential; shards within a chunk are
//! parallel. Any failure abandons every writer so nothing partial is
//! promoted.
//!
//! Read: a background producer owns the write end of a bounded pipe,
//! reads exactly one shard-length per disk per chunk in parallel, decodes,
//! and pushes the recovered bytes downstream. Reader failures degrade to
//! null slots until fewer than `k` remain. After the last chunk the
//! reconstructed stream's MD5 and SHA-512 must match the stored digests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use stripeio_common::{digest_eq, ContentHasher, EngineConfig, Error, Result};
use stripeio_erasure::StripeCodec;
use stripeio_topology::{ShardReader, ShardWriter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::metadata::{ObjectInfo, METADATA_VERSION};
use crate::placement::{Placement, STREAM_DATA, STREAM_OBJECT_METADATA};
use crate::stream::{ByteStream, StreamChunker};

/// Capability invoked once per write, after the stream is fully consumed,
/// with the hex SHA-256 of the raw bytes
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// True when the payload signature is valid
    async fn verify(&self, sha256_hex: &str) -> Result<bool>;
}

/// Abandon every writer still in flight; partial shard files are never
/// promoted into the bucket's durable state
async fn abandon_writers(writers: Vec<Box<dyn ShardWriter>>) {
    for writer in writers {
        if let Err(e) = writer.abort().await {
            warn!(error = %e, "failed to abandon shard writer");
        }
    }
}

/// Stream one object onto the bucket's disks and return its metadata
///
/// `object` is the normalized on-disk name. The caller holds the bucket
/// guard and promotes the returned metadata into the manifest.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn write_object_stream(
    placement: &Placement,
    config: &EngineConfig,
    bucket: &str,
    object: &str,
    stream: ByteStream,
    declared_size: u64,
    expected_md5: Option<&str>,
    user_metadata: BTreeMap<String, String>,
    signature: Option<&dyn SignatureVerifier>,
) -> Result<ObjectInfo> {
    let slots = placement.slots();
    let total_disks = slots.len();
    if total_disks == 0 {
        return Err(Error::invalid_argument("bucket has no backing disks"));
    }

    // Writer-open failures propagate immediately; siblings are cleaned up
    let mut writers: Vec<Box<dyn ShardWriter>> = Vec::with_capacity(total_disks);
    for slot in slots {
        let path = placement.shard_path(slot, object, STREAM_DATA);
        match slot.disk.create(&path).await {
            Ok(writer) => writers.push(writer),
            Err(e) => {
                error!(disk = slot.disk.id(), path = %path, error = %e, "shard writer open failed");
                abandon_writers(writers).await;
                return Err(e);
            }
        }
    }

    let codec = if total_disks > 1 {
        match StripeCodec::for_disk_count(total_disks) {
            Ok(codec) => Some(codec),
            Err(e) => {
                abandon_writers(writers).await;
                return Err(e);
            }
        }
    } else {
        None
    };

    let mut hasher = if signature.is_some() {
        ContentHasher::with_sha256()
    } else {
        ContentHasher::new()
    };
    let mut chunker = StreamChunker::new(stream, config.block_size);
    let mut size: u64 = 0;
    let mut chunk_count: u64 = 0;

    loop {
        let block = match chunker.next_block().await {
            Ok(Some(block)) => block,
            Ok(None) => break,
            Err(e) => {
                abandon_writers(writers).await;
                return Err(e);
            }
        };
        hasher.update(&block);
        size += block.len() as u64;

        match codec {
            // Single disk: tee the stream straight through, no encoding
            None => {
                if let Some(writer) = writers.first_mut() {
                    if let Err(e) = writer.write_all(&block).await {
                        abandon_writers(writers).await;
                        return Err(e.into());
                    }
                }
            }
            Some(codec) => {
                chunk_count += 1;
                let shards = match codec.encode(&block) {
                    Ok(shards) => shards,
                    Err(e) => {
                        abandon_writers(writers).await;
                        return Err(e);
                    }
                };
                // Shard-parallel within the chunk; the chunk completes
                // before the next one starts
                let results = join_all(
                    writers
                        .iter_mut()
                        .zip(shards.iter())
                        .map(|(writer, shard)| writer.write_all(shard)),
                )
                .await;
                for (index, result) in results.into_iter().enumerate() {
                    if let Err(e) = result {
                        error!(shard = index, error = %e, "shard write failed");
                        abandon_writers(writers).await;
                        return Err(e.into());
                    }
                }
            }
        }
    }

    let digest = hasher.finalize();

    if let Some(verifier) = signature {
        let sha256_hex = digest.sha256_hex.as_deref().unwrap_or_default();
        match verifier.verify(sha256_hex).await {
            Ok(true) => {}
            Ok(false) => {
                abandon_writers(writers).await;
                return Err(Error::SignatureDoesNotMatch);
            }
            Err(e) => {
                abandon_writers(writers).await;
                return Err(e);
            }
        }
    }

    if let Some(expected) = expected_md5.filter(|md5| !md5.is_empty()) {
        if !digest_eq(expected, &digest.md5_hex) {
            abandon_writers(writers).await;
            return Err(Error::BadDigest {
                expected: expected.to_string(),
                computed: digest.md5_hex,
            });
        }
    }

    if declared_size > 0 && declared_size != size {
        abandon_writers(writers).await;
        return Err(Error::invalid_argument(format!(
            "declared size {declared_size} does not match {size} bytes consumed"
        )));
    }

    let (data_disks, parity_disks) = match codec {
        Some(codec) => (codec.data_shards(), codec.parity_shards()),
        None => (0, 0),
    };
    let info = ObjectInfo {
        version: METADATA_VERSION.to_string(),
        bucket: bucket.to_string(),
        object: object.to_string(),
        created: Utc::now(),
        size,
        block_size: config.block_size,
        chunk_count,
        data_disks,
        parity_disks,
        md5_hex: digest.md5_hex,
        sha512_hex: digest.sha512_hex,
        user_metadata,
    };

    // Metadata replica on every data-bearing disk
    let json = match info.to_json() {
        Ok(json) => json,
        Err(e) => {
            abandon_writers(writers).await;
            return Err(e);
        }
    };
    let replica_results = join_all(slots.iter().map(|slot| {
        let path = placement.shard_path(slot, object, STREAM_OBJECT_METADATA);
        let json = &json;
        async move { slot.disk.write_document(&path, json).await }
    }))
    .await;
    for result in replica_results {
        if let Err(e) = result {
            error!(error = %e, "object metadata replica write failed");
            abandon_writers(writers).await;
            return Err(e);
        }
    }

    // Promote the shard files
    let mut commit_err = None;
    for writer in writers {
        if commit_err.is_none() {
            if let Err(e) = writer.commit().await {
                error!(error = %e, "shard commit failed");
                commit_err = Some(e);
            }
        } else if let Err(e) = writer.abort().await {
            warn!(error = %e, "failed to abandon shard writer");
        }
    }
    if let Some(e) = commit_err {
        return Err(e);
    }

    Ok(info)
}

/// Background producer for one object read
///
/// Owns the pipe's write end; a closed consumer is observed on the next
/// send and stops the producer, releasing the shard readers.
pub(crate) async fn produce_read(
    info: ObjectInfo,
    mut readers: Vec<Option<ShardReader>>,
    tx: mpsc::Sender<Result<Bytes>>,
) {
    let mut hasher = ContentHasher::new();

    if info.data_disks == 0 {
        // Inline object: stream the single replica straight through
        let Some(mut reader) = readers.into_iter().flatten().next() else {
            let _ = tx
                .send(Err(Error::InsufficientShards {
                    available: 0,
                    required: 1,
                }))
                .await;
            return;
        };
        let mut remaining = info.size;
        let mut buf = vec![0u8; 256 * 1024];
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            if let Err(e) = reader.read_exact(&mut buf[..want]).await {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
            hasher.update(&buf[..want]);
            if tx
                .send(Ok(Bytes::copy_from_slice(&buf[..want])))
                .await
                .is_err()
            {
                return;
            }
            remaining -= want as u64;
        }
    } else {
        let codec = match StripeCodec::new(info.data_disks, info.parity_disks) {
            Ok(codec) => codec,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };
        let mut remaining = info.size;
        for _ in 0..info.chunk_count {
            let cur_block = remaining.min(info.block_size as u64) as usize;
            let shard_len = codec.encoded_shard_len(cur_block);

            // One exact-length read per surviving disk, in parallel; a
            // failed reader becomes a null slot for the rest of the object
            let shards: Vec<Option<Vec<u8>>> = join_all(readers.iter_mut().map(|slot| async move {
                let reader = slot.as_mut()?;
                let mut shard = vec![0u8; shard_len];
                match reader.read_exact(&mut shard).await {
                    Ok(_) => Some(shard),
                    Err(e) => {
                        warn!(error = %e, "shard read failed; dropping reader");
                        *slot = None;
                        None
                    }
                }
            }))
            .await;

            let available = shards.iter().filter(|s| s.is_some()).count();
            if available < codec.data_shards() {
                let _ = tx
                    .send(Err(Error::InsufficientShards {
                        available,
                        required: codec.data_shards(),
                    }))
                    .await;
                return;
            }

            let block = match codec.decode(&shards, cur_block) {
                Ok(block) => block,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            hasher.update(&block);
            if tx.send(Ok(Bytes::from(block))).await.is_err() {
                return;
            }
            remaining -= cur_block as u64;
        }
    }

    // End-to-end verification strictly after all bytes are produced
    let digest = hasher.finalize();
    if !digest_eq(&digest.md5_hex, &info.md5_hex) {
        let _ = tx
            .send(Err(Error::ChecksumMismatch {
                algorithm: "md5",
                expected: info.md5_hex,
                actual: digest.md5_hex,
            }))
            .await;
        return;
    }
    if !digest_eq(&digest.sha512_hex, &info.sha512_hex) {
        let _ = tx
            .send(Err(Error::ChecksumMismatch {
                algorithm: "sha512",
                expected: info.sha512_hex,
                actual: digest.sha512_hex,
            }))
            .await;
    }
}
