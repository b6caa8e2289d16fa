//! StripeIO Bucket - the erasure-coded bucket engine
//!
//! A `Store` owns the node/disk registry and hands out `Bucket`s. A bucket
//! stripes each object stream over every backing disk: the stream is cut
//! into fixed blocks, each block is Reed-Solomon encoded into one shard
//! per disk, and shard writes fan out in parallel while MD5/SHA-512 roll
//! over the raw bytes. Reads reverse the pipeline, tolerating up to `m`
//! missing disks, and verify the reconstructed stream against the stored
//! digests before the pipe closes.
//!
//! Metadata lives beside the data: one replicated JSON manifest per bucket
//! plus one `object_metadata.json` replica per disk per object; readers
//! accept the first replica that decodes.

pub mod bucket;
pub mod metadata;
pub mod pipeline;
pub mod placement;
pub mod store;
pub mod stream;

pub use bucket::{Bucket, ObjectListing};
pub use metadata::{BucketManifest, ObjectInfo};
pub use pipeline::SignatureVerifier;
pub use placement::{Placement, BUCKET_MANIFEST, STREAM_DATA, STREAM_OBJECT_METADATA};
pub use store::Store;
pub use stream::{bytes_stream, ByteStream, StreamChunker};
