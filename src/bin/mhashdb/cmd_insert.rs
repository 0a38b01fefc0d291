use anyhow::{Context, Result};
use std::io::{self, BufRead};
use std::path::PathBuf;

use mhashdb::config::StoreConfig;
use mhashdb::relation::Relation;

pub fn exec(rel: PathBuf) -> Result<()> {
    let mut r = Relation::open(&rel, true, StoreConfig::from_env())?;
    let stdin = io::stdin();
    let mut n = 0u64;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        r.add_to_relation(line.as_bytes())
            .with_context(|| format!("insert tuple '{}'", line))?;
        n += 1;
    }
    r.close()?;
    println!("inserted {} tuple(s) into '{}'", n, rel.display());
    Ok(())
}
