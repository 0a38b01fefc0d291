use anyhow::{anyhow, Result};
use std::path::PathBuf;

use mhashdb::config::StoreConfig;
use mhashdb::projection::Projection;
use mhashdb::relation::Relation;
use mhashdb::selection::Selection;

/// `query [-v] <proj-list> from <rel> where <query-tuple>`. Parsed by
/// hand, not by clap, so the positional `from`/`where` grammar stays
/// exactly what external scripts may already depend on.
pub fn exec(args: Vec<String>) -> Result<()> {
    let mut idx = 0;
    let verbose = args.first().map(|a| a == "-v").unwrap_or(false);
    if verbose {
        idx += 1;
    }

    let proj_list = args
        .get(idx)
        .ok_or_else(|| anyhow!("missing projection list"))?;
    idx += 1;

    if args.get(idx).map(String::as_str) != Some("from") {
        return Err(anyhow!("expected 'from' after projection list"));
    }
    idx += 1;

    let rel: PathBuf = args
        .get(idx)
        .ok_or_else(|| anyhow!("missing relation name after 'from'"))?
        .into();
    idx += 1;

    if args.get(idx).map(String::as_str) != Some("where") {
        return Err(anyhow!("expected 'where' after relation name"));
    }
    idx += 1;

    let query_tuple = args
        .get(idx)
        .ok_or_else(|| anyhow!("missing query tuple after 'where'"))?;
    idx += 1;

    if idx != args.len() {
        return Err(anyhow!("unexpected trailing arguments after query tuple"));
    }

    let mut r = Relation::open(&rel, false, StoreConfig::from_env())?;
    let n_attrs = r.n_attrs();
    let proj = Projection::parse(proj_list, n_attrs)?;

    let mut sel = Selection::start(&mut r, query_tuple.as_bytes())?;
    let mut n = 0u64;
    while let Some(t) = sel.next_tuple()? {
        let out = proj.project(&t, n_attrs)?;
        println!("{}", String::from_utf8_lossy(&out));
        n += 1;
    }
    if verbose {
        eprintln!("buckets visited: {}, tuples matched: {}", sel.buckets_visited(), n);
    }
    sel.close();
    Ok(())
}
