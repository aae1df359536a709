//! Extension points of the directory decoder.
//!
//! Two ordered hook lists run during parsing:
//!
//! - **pre-decode** hooks see each [`RawEntry`] before its value is located
//!   and may rewrite the type code or count, or mark the entry as
//!   vendor-significant.
//! - **finalize** hooks run once per entry after the whole directory has been
//!   decoded, so they can consult sibling entries. They may record extra
//!   memory regions and attach vendor metadata to the directory.
//!
//! A [`HookRegistry`] is built once, before any file is opened, and shared
//! immutably between parses.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::TiffError;

use super::accessor::ByteAccessor;
use super::directory::VendorMetadata;
use super::entry::{DirectoryEntry, RawEntry};
use super::regions::MemoryRegion;
use super::tags::TiffTag;

// =============================================================================
// Hook traits
// =============================================================================

/// Runs on every entry record before its value is resolved.
pub trait PreDecodeHook: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn pre_decode(&self, entry: &mut RawEntry, bytes: ByteAccessor<'_>) -> Result<(), TiffError>;
}

/// Runs on every decoded entry once its directory is complete.
pub trait FinalizeHook: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn finalize(
        &self,
        entry: &DirectoryEntry,
        ctx: &mut FinalizeContext<'_, '_>,
    ) -> Result<(), TiffError>;
}

/// What a finalize hook may see and change.
pub struct FinalizeContext<'d, 'a> {
    entries: &'d [DirectoryEntry],
    bytes: ByteAccessor<'a>,
    regions: &'d mut Vec<MemoryRegion>,
    vendor: &'d mut Option<VendorMetadata>,
}

impl<'d, 'a> FinalizeContext<'d, 'a> {
    pub fn new(
        entries: &'d [DirectoryEntry],
        bytes: ByteAccessor<'a>,
        regions: &'d mut Vec<MemoryRegion>,
        vendor: &'d mut Option<VendorMetadata>,
    ) -> Self {
        Self {
            entries,
            bytes,
            regions,
            vendor,
        }
    }

    /// All entries of the directory being finalized, in file order.
    pub fn entries(&self) -> &'d [DirectoryEntry] {
        self.entries
    }

    /// First sibling entry with the given tag.
    pub fn find(&self, tag: TiffTag) -> Option<&'d DirectoryEntry> {
        let id = tag.as_u16();
        self.entries.iter().find(|e| e.tag == id)
    }

    pub fn bytes(&self) -> ByteAccessor<'a> {
        self.bytes
    }

    pub fn add_region(&mut self, region: MemoryRegion) {
        self.regions.push(region);
    }

    /// Attach vendor metadata to the directory. A later attachment replaces
    /// an earlier one.
    pub fn attach_vendor(&mut self, metadata: VendorMetadata) {
        *self.vendor = Some(metadata);
    }
}

// =============================================================================
// HookRegistry
// =============================================================================

/// Immutable, ordered lists of pre-decode and finalize hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    pre_decode: Vec<Arc<dyn PreDecodeHook>>,
    finalize: Vec<Arc<dyn FinalizeHook>>,
}

impl HookRegistry {
    /// A registry with no hooks at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The baseline hooks every TIFF needs: strip region bookkeeping.
    pub fn standard() -> Self {
        Self::builder().finalize(StripRegionsHook).build()
    }

    pub fn builder() -> HookRegistryBuilder {
        HookRegistryBuilder::default()
    }

    /// Start a builder that already holds this registry's hooks.
    pub fn to_builder(&self) -> HookRegistryBuilder {
        HookRegistryBuilder {
            pre_decode: self.pre_decode.clone(),
            finalize: self.finalize.clone(),
        }
    }

    pub fn pre_decode_hooks(&self) -> impl Iterator<Item = &dyn PreDecodeHook> {
        self.pre_decode.iter().map(|h| h.as_ref())
    }

    pub fn finalize_hooks(&self) -> impl Iterator<Item = &dyn FinalizeHook> {
        self.finalize.iter().map(|h| h.as_ref())
    }

    /// Run every finalize hook over every entry, entries in file order.
    pub(crate) fn run_finalize(&self, ctx: &mut FinalizeContext<'_, '_>) -> Result<(), TiffError> {
        let entries = ctx.entries();
        for entry in entries {
            for hook in self.finalize_hooks() {
                hook.finalize(entry, ctx)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pre: Vec<_> = self.pre_decode.iter().map(|h| h.name()).collect();
        let fin: Vec<_> = self.finalize.iter().map(|h| h.name()).collect();
        f.debug_struct("HookRegistry")
            .field("pre_decode", &pre)
            .field("finalize", &fin)
            .finish()
    }
}

/// Builder for [`HookRegistry`]. Hooks run in registration order.
#[derive(Default)]
pub struct HookRegistryBuilder {
    pre_decode: Vec<Arc<dyn PreDecodeHook>>,
    finalize: Vec<Arc<dyn FinalizeHook>>,
}

impl HookRegistryBuilder {
    pub fn pre_decode(mut self, hook: impl PreDecodeHook + 'static) -> Self {
        self.pre_decode.push(Arc::new(hook));
        self
    }

    pub fn finalize(mut self, hook: impl FinalizeHook + 'static) -> Self {
        self.finalize.push(Arc::new(hook));
        self
    }

    pub fn build(self) -> HookRegistry {
        HookRegistry {
            pre_decode: self.pre_decode,
            finalize: self.finalize,
        }
    }
}

// =============================================================================
// Built-in hooks
// =============================================================================

/// Records one memory region per strip, using the sibling StripByteCounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripRegionsHook;

impl FinalizeHook for StripRegionsHook {
    fn name(&self) -> &'static str {
        "strip-regions"
    }

    fn finalize(
        &self,
        entry: &DirectoryEntry,
        ctx: &mut FinalizeContext<'_, '_>,
    ) -> Result<(), TiffError> {
        if entry.tag != TiffTag::StripOffsets.as_u16() {
            return Ok(());
        }
        let Some(counts_entry) = ctx.find(TiffTag::StripByteCounts) else {
            debug!("StripOffsets without StripByteCounts, no strip regions recorded");
            return Ok(());
        };

        let bytes = ctx.bytes();
        let (Some(offsets), Some(counts)) = (
            entry.values(bytes)?.to_u64_vec(),
            counts_entry.values(bytes)?.to_u64_vec(),
        ) else {
            return Ok(());
        };

        if offsets.len() == 1 && counts.len() == 1 {
            ctx.add_region(MemoryRegion::new(offsets[0], offsets[0] + counts[0], "strip"));
            return Ok(());
        }
        for (i, (offset, count)) in offsets.iter().zip(&counts).enumerate() {
            ctx.add_region(MemoryRegion::new(
                *offset,
                offset + count,
                format!("strip {}", i),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
