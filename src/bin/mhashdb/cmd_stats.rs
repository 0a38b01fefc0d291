use anyhow::Result;
use std::path::PathBuf;

use mhashdb::config::StoreConfig;
use mhashdb::relation::Relation;

pub fn exec(rel: PathBuf) -> Result<()> {
    let mut r = Relation::open(&rel, false, StoreConfig::from_env())?;
    print!("{}", r.stats()?);
    Ok(())
}
