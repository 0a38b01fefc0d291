//! Ambient configuration knobs that do not change on-disk semantics.
//!
//! Everything spec.md fixes (choice vector width, bucket addressing rule,
//! split policy, page header layout) stays a compile-time constant in
//! [`crate::consts`]. `StoreConfig` only governs things a deployment is
//! free to vary: the page size `create` uses when the caller doesn't pass
//! one explicitly, and whether checksums are verified on every page read.

use crate::consts::PAGESIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Page size used by `create` when not overridden on the command line.
    pub page_size: usize,
    /// Verify the CRC32 trailer on every page read.
    pub verify_checksums: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: PAGESIZE,
            verify_checksums: true,
        }
    }
}

impl StoreConfig {
    /// Load from `MHDB_PAGE_SIZE` / `MHDB_VERIFY_CHECKSUMS`, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("MHDB_PAGE_SIZE") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.page_size = n;
            }
        }

        if let Ok(v) = std::env::var("MHDB_VERIFY_CHECKSUMS") {
            let s = v.trim().to_ascii_lowercase();
            cfg.verify_checksums = !(s == "0" || s == "false" || s == "off" || s == "no");
        }

        cfg
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_verify_checksums(mut self, on: bool) -> Self {
        self.verify_checksums = on;
        self
    }
}
