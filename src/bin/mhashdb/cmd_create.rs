use anyhow::Result;
use std::path::PathBuf;

use mhashdb::config::StoreConfig;
use mhashdb::relation::Relation;

pub fn exec(rel: PathBuf, nattrs: u32, pages: u32, depth: u32, chvec: String) -> Result<()> {
    Relation::create(&rel, nattrs, pages, depth, &chvec, &StoreConfig::from_env())?;
    println!(
        "created relation '{}' (nattrs={}, pages={}, depth={})",
        rel.display(),
        nattrs,
        pages,
        depth
    );
    Ok(())
}
