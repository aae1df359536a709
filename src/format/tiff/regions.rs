//! Byte-range bookkeeping for diagnostics.
//!
//! Every structure the parser touches (header, directory tables, out-of-line
//! values, strips) is recorded as a [`MemoryRegion`]. [`validate_regions`]
//! sorts them and reports unaccounted bytes and overlaps. Nothing on the read
//! path consults this.

use serde::Serialize;
use tracing::{debug, warn};

// =============================================================================
// MemoryRegion
// =============================================================================

/// A labelled half-open byte range `[start, end)` of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub label: String,
}

impl MemoryRegion {
    pub fn new(start: u64, end: u64, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Validation
// =============================================================================

/// A problem found between two consecutive regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RegionIssue {
    /// Bytes `[start, end)` are not claimed by any region
    Gap { start: u64, end: u64 },

    /// `label` starts at `start`, before the previous region ended
    Overlap {
        start: u64,
        previous_end: u64,
        label: String,
    },
}

impl RegionIssue {
    /// Number of bytes involved.
    pub fn len(&self) -> u64 {
        match self {
            RegionIssue::Gap { start, end } => end - start,
            RegionIssue::Overlap {
                start,
                previous_end,
                ..
            } => previous_end - start,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of checking a set of regions.
#[derive(Debug, Clone, Serialize)]
pub struct RegionReport {
    /// True when the regions tile the covered range exactly
    pub is_valid: bool,

    /// Regions sorted by start offset
    pub regions: Vec<MemoryRegion>,

    /// Gaps and overlaps in file order
    pub issues: Vec<RegionIssue>,
}

impl RegionReport {
    /// Total number of bytes not claimed by any region.
    pub fn unknown_bytes(&self) -> u64 {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, RegionIssue::Gap { .. }))
            .map(RegionIssue::len)
            .sum()
    }
}

/// Sort `regions` and report every gap and overlap between neighbours.
pub fn validate_regions(mut regions: Vec<MemoryRegion>) -> RegionReport {
    regions.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let mut issues = Vec::new();
    let mut last_end: Option<u64> = None;

    for region in &regions {
        if let Some(previous_end) = last_end {
            if region.start > previous_end {
                warn!(
                    bytes = region.start - previous_end,
                    at = previous_end,
                    "unknown bytes"
                );
                issues.push(RegionIssue::Gap {
                    start: previous_end,
                    end: region.start,
                });
            } else if region.start < previous_end {
                warn!(
                    label = %region.label,
                    start = region.start,
                    previous_end,
                    "overlapping memory area"
                );
                issues.push(RegionIssue::Overlap {
                    start: region.start,
                    previous_end,
                    label: region.label.clone(),
                });
            }
        }

        debug!(
            "{}..{}[{}] contains {}",
            region.start,
            region.end,
            region.len(),
            region.label
        );

        // A region nested inside the previous one must not pull the end back
        last_end = Some(last_end.map_or(region.end, |end| end.max(region.end)));
    }

    RegionReport {
        is_valid: issues.is_empty(),
        regions,
        issues,
    }
}

// =============================================================================
// Tests
// =============================================================================
