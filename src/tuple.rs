//! Tuple parsing and matching.
//!
//! A tuple on the wire is `v1,v2,...,vn` with no trailing NUL in this
//! representation (the NUL terminator is a page-body framing detail
//! owned by [`crate::page`]). In a query tuple, `vi` may be `?` (fully
//! unknown) or may contain `%` wildcards; otherwise it is a literal byte
//! string that must match exactly.

use anyhow::{anyhow, Result};
use regex::bytes::Regex;

/// Split a tuple into its `n_attrs` attribute byte strings. Fails if the
/// tuple does not have exactly `n_attrs` comma-separated fields.
pub fn split_attrs(t: &[u8], n_attrs: u32) -> Result<Vec<&[u8]>> {
    let parts: Vec<&[u8]> = t.split(|&b| b == b',').collect();
    if parts.len() != n_attrs as usize {
        return Err(anyhow!(
            "tuple has {} attributes, relation has {}",
            parts.len(),
            n_attrs
        ));
    }
    Ok(parts)
}

#[inline]
pub fn is_unknown(attr: &[u8]) -> bool {
    attr == b"?"
}

#[inline]
pub fn has_wildcard(attr: &[u8]) -> bool {
    attr.contains(&b'%')
}

/// Build the anchored regex for a `%`-wildcard attribute pattern:
/// `%` becomes `.*`, other bytes are matched literally, `^` is added
/// unless the pattern starts with `%`, `$` is added unless it ends with
/// `%`.
fn wildcard_regex(pattern: &[u8]) -> Result<Regex> {
    let segments: Vec<String> = pattern
        .split(|&b| b == b'%')
        .map(|seg| regex::escape(&String::from_utf8_lossy(seg)))
        .collect();
    let mut out = String::new();
    if !pattern.starts_with(b"%") {
        out.push('^');
    }
    out.push_str(&segments.join(".*"));
    if !pattern.ends_with(b"%") {
        out.push('$');
    }
    Regex::new(&out).map_err(|e| anyhow!("bad wildcard pattern: {}", e))
}

/// Does query attribute `q` match tuple attribute `v`?
pub fn attr_match(q: &[u8], v: &[u8]) -> Result<bool> {
    if is_unknown(q) {
        Ok(true)
    } else if has_wildcard(q) {
        Ok(wildcard_regex(q)?.is_match(v))
    } else {
        Ok(q == v)
    }
}

/// Does tuple `t` satisfy query tuple `q`, attribute by attribute?
pub fn tuple_match(q: &[u8], t: &[u8], n_attrs: u32) -> Result<bool> {
    let qvals = split_attrs(q, n_attrs)?;
    let tvals = split_attrs(t, n_attrs)?;
    for (qa, ta) in qvals.iter().zip(tvals.iter()) {
        if !attr_match(qa, ta)? {
            return Ok(false);
        }
    }
    Ok(true)
}
