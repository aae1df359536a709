//! Strip decoders for compressed slices.
//!
//! The sample assembler only needs `decode(raw, expected_len) -> bytes` for
//! each compressed strip. Decoders are looked up by TIFF compression code in
//! a [`CodecRegistry`]; a code with no decoder is `UnknownCompression`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;
use weezl::{decode::Decoder, BitOrder, LzwStatus};

use crate::error::TiffError;
use crate::format::tiff::Compression;

// =============================================================================
// StripDecoder
// =============================================================================

/// Decodes one compressed strip.
pub trait StripDecoder: Send + Sync {
    /// The compression scheme this decoder handles.
    fn compression(&self) -> Compression;

    /// Decode `raw` into exactly `expected_len` bytes.
    ///
    /// Decoding stops once `expected_len` bytes are produced; shorter output
    /// is an error.
    fn decode(&self, raw: &[u8], expected_len: usize) -> Result<Vec<u8>, TiffError>;
}

/// TIFF-flavoured LZW (MSB-first codes, early code size switch).
#[derive(Debug, Clone, Copy, Default)]
pub struct LzwDecoder;

impl StripDecoder for LzwDecoder {
    fn compression(&self) -> Compression {
        Compression::Lzw
    }

    fn decode(&self, raw: &[u8], expected_len: usize) -> Result<Vec<u8>, TiffError> {
        let mut decoder = Decoder::with_tiff_size_switch(BitOrder::Msb, 8);
        let mut out = vec![0u8; expected_len];
        let mut consumed = 0;
        let mut filled = 0;

        // The output buffer bounds the work done on a strip that expands
        // past its declared size.
        while filled < expected_len {
            let result = decoder.decode_bytes(&raw[consumed..], &mut out[filled..]);
            consumed += result.consumed_in;
            filled += result.consumed_out;
            match result.status {
                Ok(LzwStatus::Ok) if result.consumed_in + result.consumed_out > 0 => {}
                Ok(_) => break,
                Err(err) => {
                    return Err(TiffError::Codec {
                        compression: Compression::Lzw.name(),
                        message: err.to_string(),
                    })
                }
            }
        }

        if filled < expected_len {
            return Err(TiffError::Codec {
                compression: Compression::Lzw.name(),
                message: format!("decoded {} bytes, expected {}", filled, expected_len),
            });
        }

        trace!(
            raw = raw.len(),
            decoded = expected_len,
            consumed,
            "decoded LZW strip"
        );
        Ok(out)
    }
}

// =============================================================================
// CodecRegistry
// =============================================================================

/// Strip decoders keyed by compression code.
#[derive(Clone)]
pub struct CodecRegistry {
    decoders: BTreeMap<u16, Arc<dyn StripDecoder>>,
}

impl CodecRegistry {
    /// A registry with no decoders; only uncompressed data can be read.
    pub fn empty() -> Self {
        Self {
            decoders: BTreeMap::new(),
        }
    }

    /// Add a decoder, replacing any earlier one for the same compression.
    pub fn with_decoder(mut self, decoder: impl StripDecoder + 'static) -> Self {
        self.decoders
            .insert(decoder.compression().as_u16(), Arc::new(decoder));
        self
    }

    /// Decoder for a compression code.
    pub fn get(&self, compression: u16) -> Option<&dyn StripDecoder> {
        self.decoders.get(&compression).map(|d| d.as_ref())
    }

    pub fn supports(&self, compression: u16) -> bool {
        self.decoders.contains_key(&compression)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::empty().with_decoder(LzwDecoder)
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.decoders.values().map(|d| d.compression().name()))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
