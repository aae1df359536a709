//! Format parsers for image stacks.
//!
//! [`tiff`] holds the generic machinery: header and directory chain parsing,
//! entry decoding with hooks, memory accounting and sample assembly.
//! [`lsm`] plugs the Zeiss LSM extension into that machinery through hooks.

pub mod lsm;
pub mod tiff;
