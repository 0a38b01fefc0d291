//! Fixed on-disk constants shared across the engine.

/// Width of a bucket address / tuple hash, in bits. Also the fixed length
/// of a choice vector. Bounds the maximum supported linear-hashing depth
/// to `MAXCHVEC - 1`.
pub const MAXCHVEC: usize = 32;

/// Fixed page size in bytes (header + body).
pub const PAGESIZE: usize = 4096;

/// Sentinel meaning "no overflow page follows".
pub const NO_PAGE: u64 = u64::MAX;

/// File name suffixes for the three files backing a relation.
pub const INFO_EXT: &str = "info";
pub const DATA_EXT: &str = "data";
pub const OVFLOW_EXT: &str = "ovflow";

/// Magic stamped at the start of `.info`.
pub const INFO_MAGIC: &[u8; 8] = b"MHDBINF1";

/// Magic stamped at the start of every page (data or overflow).
pub const PAGE_MAGIC: &[u8; 4] = b"MHPG";
