//! Reed-Solomon encoder/decoder
//!
//! Wraps `reed-solomon-simd`: data shards are added as original shards,
//! recovery shards come back from the encoder, and the decoder restores
//! missing originals from any `k` present shards.

use reed_solomon_simd::{ReedSolomonDecoder, ReedSolomonEncoder};
use stripeio_common::{Error, Result};

/// Shard length granularity; keeps every shard length acceptable to the
/// SIMD backend regardless of `k`
const SHARD_ALIGN: usize = 64;

/// Most parity shards a stripe may carry
pub const MAX_PARITY_SHARDS: usize = 127;

/// Most shards a stripe may carry in total
pub const MAX_TOTAL_SHARDS: usize = 255;

/// Erasure codec for one `(k, m)` stripe geometry
///
/// Encoding is deterministic: the same block under the same geometry always
/// produces the same shards, and shard index `i` always lands on the same
/// disk slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StripeCodec {
    data_shards: usize,
    parity_shards: usize,
}

impl StripeCodec {
    /// Create a codec with `k` data shards and `m` parity shards
    ///
    /// `m == 0` is accepted and degenerates to a plain split: all `k`
    /// shards are then required to reconstruct.
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 {
            return Err(Error::invalid_argument("data_shards must be > 0"));
        }
        if data_shards + parity_shards > MAX_TOTAL_SHARDS {
            return Err(Error::invalid_argument(format!(
                "total shards must be <= {MAX_TOTAL_SHARDS}"
            )));
        }
        Ok(Self {
            data_shards,
            parity_shards,
        })
    }

    /// Derive the stripe geometry for a disk count `n > 1`
    ///
    /// `k = ceil(n/2)`, `m = floor(n/2)`, so `k + m == n` and
    /// `k - m ∈ {0, 1}`.
    pub fn for_disk_count(total_disks: usize) -> Result<Self> {
        let (k, m) = Self::derive_shards(total_disks)?;
        Self::new(k, m)
    }

    /// Compute `(k, m)` for a disk count without building a codec
    pub fn derive_shards(total_disks: usize) -> Result<(usize, usize)> {
        if total_disks < 2 {
            return Err(Error::invalid_argument(
                "erasure coding requires at least 2 disks",
            ));
        }
        let parity = total_disks / 2;
        if parity > MAX_PARITY_SHARDS {
            return Err(Error::ParityOverflow { parity });
        }
        Ok((total_disks - parity, parity))
    }

    /// Number of data shards (k)
    #[must_use]
    pub const fn data_shards(&self) -> usize {
        self.data_shards
    }

    /// Number of parity shards (m)
    #[must_use]
    pub const fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    /// Total shards (k + m)
    #[must_use]
    pub const fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Length of every shard produced for a block of `block_len` bytes
    ///
    /// `ceil(block_len / k)` rounded up to the alignment granularity; the
    /// block is zero-padded to `k * shard_len` before splitting.
    #[must_use]
    pub fn encoded_shard_len(&self, block_len: usize) -> usize {
        let per_shard = block_len.div_ceil(self.data_shards).max(1);
        per_shard.div_ceil(SHARD_ALIGN) * SHARD_ALIGN
    }

    /// Encode a block into `k + m` shards of `encoded_shard_len(block.len())`
    /// bytes each
    pub fn encode(&self, block: &[u8]) -> Result<Vec<Vec<u8>>> {
        let k = self.data_shards;
        let m = self.parity_shards;
        let shard_len = self.encoded_shard_len(block.len());

        let mut padded = vec![0u8; shard_len * k];
        padded[..block.len()].copy_from_slice(block);

        let mut shards: Vec<Vec<u8>> = padded.chunks(shard_len).map(<[u8]>::to_vec).collect();

        if m == 0 {
            return Ok(shards);
        }

        let mut encoder = ReedSolomonEncoder::new(k, m, shard_len)
            .map_err(|e| Error::erasure(e.to_string()))?;
        for shard in &shards {
            encoder
                .add_original_shard(shard)
                .map_err(|e| Error::erasure(e.to_string()))?;
        }
        let encoded = encoder.encode().map_err(|e| Error::erasure(e.to_string()))?;

        shards.extend(encoded.recovery_iter().map(<[u8]>::to_vec));
        Ok(shards)
    }

    /// Reconstruct the original `block_len` bytes from `>= k` shards
    ///
    /// `shards` holds one slot per shard index; `None` marks a missing
    /// shard. Present shards must be exactly `encoded_shard_len(block_len)`
    /// bytes.
    pub fn decode(&self, shards: &[Option<Vec<u8>>], block_len: usize) -> Result<Vec<u8>> {
        let k = self.data_shards;
        let m = self.parity_shards;
        let shard_len = self.encoded_shard_len(block_len);

        if shards.len() != k + m {
            return Err(Error::invalid_argument(format!(
                "expected {} shard slots, got {}",
                k + m,
                shards.len()
            )));
        }
        for (i, shard) in shards.iter().enumerate() {
            if let Some(data) = shard {
                if data.len() != shard_len {
                    return Err(Error::invalid_argument(format!(
                        "shard {} has length {}, expected {}",
                        i,
                        data.len(),
                        shard_len
                    )));
                }
            }
        }

        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < k {
            return Err(Error::InsufficientShards {
                available,
                required: k,
            });
        }

        // All data shards present: concatenate without touching the decoder
        if shards[..k].iter().all(Option::is_some) {
            let mut block = Vec::with_capacity(k * shard_len);
            for shard in shards.iter().take(k).flatten() {
                block.extend_from_slice(shard);
            }
            block.truncate(block_len);
            return Ok(block);
        }

        let mut decoder = ReedSolomonDecoder::new(k, m, shard_len)
            .map_err(|e| Error::erasure(e.to_string()))?;
        for (i, shard) in shards.iter().enumerate().take(k) {
            if let Some(data) = shard {
                decoder
                    .add_original_shard(i, data)
                    .map_err(|e| Error::erasure(e.to_string()))?;
            }
        }
        for (i, shard) in shards.iter().enumerate().skip(k) {
            if let Some(data) = shard {
                decoder
                    .add_recovery_shard(i - k, data)
                    .map_err(|e| Error::erasure(e.to_string()))?;
            }
        }
        let restored = decoder.decode().map_err(|e| Error::erasure(e.to_string()))?;

        let mut block = Vec::with_capacity(k * shard_len);
        for (i, shard) in shards.iter().enumerate().take(k) {
            match shard {
                Some(data) => block.extend_from_slice(data),
                None => match restored.restored_original(i) {
                    Some(data) => block.extend_from_slice(data),
                    None => {
                        return Err(Error::erasure(format!("failed to restore data shard {i}")))
                    }
                },
            }
        }
        block.truncate(block_len);
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_slots(shards: Vec<Vec<u8>>) -> Vec<Option<Vec<u8>>> {
        shards.into_iter().map(Some).collect()
    }

    #[test]
    fn test_encode_decode_all_present() {
        let codec = StripeCodec::new(4, 2).unwrap();
        let block = b"Hello, World! This is a stripe codec test.";

        let shards = codec.encode(block).unwrap();
        assert_eq!(shards.len(), 6);
        let shard_len = codec.encoded_shard_len(block.len());
        assert!(shards.iter().all(|s| s.len() == shard_len));

        let decoded = codec.decode(&to_slots(shards), block.len()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_decode_with_missing() {
        let codec = StripeCodec::new(4, 2).unwrap();
        let block: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();

        let mut slots = to_slots(codec.encode(&block).unwrap());
        slots[1] = None; // one data shard
        slots[4] = None; // one parity shard

        let decoded = codec.decode(&slots, block.len()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_insufficient_shards() {
        let codec = StripeCodec::new(4, 2).unwrap();
        let block = vec![7u8; 1024];

        let mut slots = to_slots(codec.encode(&block).unwrap());
        slots[0] = None;
        slots[2] = None;
        slots[5] = None;

        let err = codec.decode(&slots, block.len()).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientShards {
                available: 3,
                required: 4
            }
        ));
    }

    #[test]
    fn test_shard_length_mismatch_rejected() {
        let codec = StripeCodec::new(2, 1).unwrap();
        let block = vec![1u8; 300];

        let mut slots = to_slots(codec.encode(&block).unwrap());
        if let Some(shard) = slots[0].as_mut() {
            shard.pop();
        }
        assert!(codec.decode(&slots, block.len()).is_err());
    }

    #[test]
    fn test_no_parity_geometry() {
        let codec = StripeCodec::new(3, 0).unwrap();
        let block = b"degenerate stripe without parity";

        let shards = codec.encode(block).unwrap();
        assert_eq!(shards.len(), 3);
        let decoded = codec.decode(&to_slots(shards), block.len()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_derivation_properties() {
        for n in 2..=254usize {
            let (k, m) = StripeCodec::derive_shards(n).unwrap();
            assert_eq!(k + m, n);
            assert!(k >= m);
            assert!(k - m <= 1);
        }
        assert!(matches!(
            StripeCodec::derive_shards(256),
            Err(Error::ParityOverflow { parity: 128 })
        ));
        assert!(StripeCodec::derive_shards(255).is_ok());
        assert!(StripeCodec::derive_shards(1).is_err());
    }

    #[test]
    fn test_shard_len_is_aligned_and_monotone() {
        let codec = StripeCodec::new(5, 3).unwrap();
        let mut last = 0;
        for len in [1usize, 63, 64, 65, 1024, 99_999, 10 * 1024 * 1024] {
            let shard_len = codec.encoded_shard_len(len);
            assert_eq!(shard_len % 64, 0);
            assert!(shard_len * 5 >= len);
            assert!(shard_len >= last);
            last = shard_len;
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let codec = StripeCodec::new(3, 2).unwrap();
        let mut block = vec![0u8; 4096];
        for (i, b) in block.iter_mut().enumerate() {
            *b = (i * 31 % 256) as u8;
        }
        assert_eq!(codec.encode(&block).unwrap(), codec.encode(&block).unwrap());
    }

    #[test]
    fn test_random_loss_roundtrip() {
        use rand::seq::SliceRandom;
        use rand::RngCore;

        let mut rng = rand::thread_rng();
        let codec = StripeCodec::for_disk_count(8).unwrap();
        assert_eq!((codec.data_shards(), codec.parity_shards()), (4, 4));

        let mut block = vec![0u8; 70_000];
        rng.fill_bytes(&mut block);

        let mut slots = to_slots(codec.encode(&block).unwrap());
        let mut indices: Vec<usize> = (0..slots.len()).collect();
        indices.shuffle(&mut rng);
        for &i in indices.iter().take(codec.parity_shards()) {
            slots[i] = None;
        }

        let decoded = codec.decode(&slots, block.len()).unwrap();
        assert_eq!(decoded, block);
    }
}
