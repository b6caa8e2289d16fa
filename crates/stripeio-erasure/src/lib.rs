//! StripeIO Erasure Coding
//!
//! Reed-Solomon stripe codec used by the object pipeline. A block of up to
//! `block_size` bytes is padded into `k` equal-length data shards, from
//! which `m` recovery shards are computed; any `k` of the `k + m` shards
//! reconstruct the block exactly.
//!
//! # Example
//!
//! ```
//! use stripeio_erasure::StripeCodec;
//!
//! let codec = StripeCodec::new(2, 2).unwrap();
//! let shards = codec.encode(b"Hello, World!").unwrap();
//! assert_eq!(shards.len(), 4);
//! ```

pub mod codec;

pub use codec::StripeCodec;
