//! Partial-match scanner: plans the minimal candidate bucket set for a
//! query tuple (some attributes known, some `?`/`%`), then iterates
//! matching tuples bucket by bucket, following each bucket's overflow
//! chain.
//!
//! Unlike the page/relation layer, a [`Selection`] does not alias a page
//! buffer across calls: `next_tuple` returns an owned `Vec<u8>`. Spec's
//! design notes flag the source's raw-pointer aliasing as something a
//! reimplementation should make explicit or avoid; owning the result is
//! the simpler and safer of the two options and costs one allocation per
//! yielded tuple, which is negligible next to the disk I/O already done
//! to fetch its page.

use crate::addr::bucket_of;
use crate::bits::{bit_is_set, Bits};
use crate::hash::hash_any;
use crate::relation::Relation;
use crate::tuple::{has_wildcard, is_unknown, split_attrs, tuple_match};
use anyhow::Result;
use log::debug;

/// One `(attribute-position, known?)` outcome per query attribute,
/// computed once up front.
struct AttrKnown {
    hash: u32,
    known: bool,
}

pub struct Selection<'r> {
    reln: &'r mut Relation,
    query: Vec<u8>,
    n_attrs: u32,
    /// Fixed `known` bits over `[0, qd)`; 0 at unknown-attribute positions.
    known: Bits,
    /// Positions (bit indices, low to high) whose attribute is unknown.
    star_positions: Vec<usize>,
    /// Next unknown-bit assignment to try, in `[0, 2^n_stars)`.
    next_u: u64,
    total_u: u64,
    /// Tuples of the page currently being scanned (cloned out of its
    /// buffer up front so the page itself can be dropped).
    cur_tuples: Vec<Vec<u8>>,
    cur_idx: usize,
    cur_overflow: u64,
    /// Count of primary buckets actually loaded so far (used by `-v`
    /// query output and by the "visits exactly 2^n_stars buckets" test).
    buckets_visited: u64,
}

impl<'r> Selection<'r> {
    /// `startSelection`: parse `query`, derive the scan depth and the
    /// known/unknown bit vectors, and position the cursor before the
    /// first candidate bucket.
    pub fn start(reln: &'r mut Relation, query: &[u8]) -> Result<Self> {
        let n_attrs = reln.n_attrs();
        let qvals = split_attrs(query, n_attrs)?;
        let cv = reln.cv().clone();
        let depth = reln.depth();
        let sp = reln.sp();

        let attrs: Vec<AttrKnown> = qvals
            .iter()
            .map(|q| {
                let known = !is_unknown(q) && !has_wildcard(q);
                AttrKnown {
                    hash: if known { hash_any(q) } else { 0 },
                    known,
                }
            })
            .collect();

        let bit_at = |i: usize| -> (bool, bool) {
            let item = cv.get(i);
            let a = &attrs[item.att as usize];
            (a.known, a.known && bit_is_set(a.hash, item.bit as usize))
        };

        // qd (spec.md §4.H step 2 / §9 open question: hoisted once, using
        // known-only bits, matching the source rather than re-evaluating
        // per candidate bucket — see DESIGN.md).
        let mut kd: Bits = 0;
        for i in 0..depth as usize {
            let (_, set) = bit_at(i);
            if set {
                kd |= 1 << i;
            }
        }
        let qd = if depth > 0 && kd < sp { depth + 1 } else { depth };

        let mut known: Bits = 0;
        let mut star_positions = Vec::new();
        for i in 0..qd as usize {
            let (is_known, set) = bit_at(i);
            if is_known {
                if set {
                    known |= 1 << i;
                }
            } else {
                star_positions.push(i);
            }
        }
        let n_stars = star_positions.len() as u32;
        let total_u = 1u64 << n_stars;

        debug!(
            "startSelection: qd={} known={:#x} n_stars={} total_candidates={}",
            qd, known, n_stars, total_u
        );

        Ok(Self {
            reln,
            query: query.to_vec(),
            n_attrs,
            known,
            star_positions,
            next_u: 0,
            total_u,
            cur_tuples: Vec::new(),
            cur_idx: 0,
            cur_overflow: crate::consts::NO_PAGE,
            buckets_visited: 0,
        })
    }

    /// Number of distinct primary buckets the scan has loaded so far.
    pub fn buckets_visited(&self) -> u64 {
        self.buckets_visited
    }

    fn assign(&self, u: u64) -> Bits {
        let mut out: Bits = 0;
        for (idx, &pos) in self.star_positions.iter().enumerate() {
            if (u >> idx) & 1 == 1 {
                out |= 1 << pos;
            }
        }
        out
    }

    /// Load `bucket` (primary page) as the current scan page, replacing
    /// whatever was loaded before.
    fn load_bucket(&mut self, bucket: u32) -> Result<()> {
        let page = self.reln.read_primary(bucket)?;
        self.cur_tuples = page.tuples().map(|t| t.to_vec()).collect();
        self.cur_idx = 0;
        self.cur_overflow = page.overflow();
        self.buckets_visited += 1;
        Ok(())
    }

    fn load_overflow(&mut self, id: u64) -> Result<()> {
        let page = self.reln.read_ovf(id)?;
        self.cur_tuples = page.tuples().map(|t| t.to_vec()).collect();
        self.cur_idx = 0;
        self.cur_overflow = page.overflow();
        Ok(())
    }

    /// Advance to the next in-range candidate bucket, loading its
    /// primary page. Out-of-range candidates are skipped and enumeration
    /// continues (the recommended resolution of spec.md §9's open
    /// question, documented in DESIGN.md). Returns `false` once every
    /// candidate has been tried.
    fn advance_bucket(&mut self) -> Result<bool> {
        let n_pages = self.reln.n_pages();
        while self.next_u < self.total_u {
            let u = self.next_u;
            self.next_u += 1;
            let bucket = self.known | self.assign(u);
            if bucket >= n_pages {
                debug!("selection: candidate bucket {} out of range ({}), skipping", bucket, n_pages);
                continue;
            }
            self.load_bucket(bucket)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// `getNextTuple`: yield the next matching tuple, or `None` once the
    /// candidate set is exhausted.
    pub fn next_tuple(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            while self.cur_idx < self.cur_tuples.len() {
                let t = self.cur_tuples[self.cur_idx].clone();
                self.cur_idx += 1;
                if tuple_match(&self.query, &t, self.n_attrs)? {
                    return Ok(Some(t));
                }
            }
            if self.cur_overflow != crate::consts::NO_PAGE {
                self.load_overflow(self.cur_overflow)?;
                continue;
            }
            if !self.advance_bucket()? {
                return Ok(None);
            }
        }
    }

    /// `closeSelection`: release the scan. Idempotent since it just
    /// drops owned buffers and the borrow of the relation; safe to call
    /// (or to simply drop the `Selection`) more than once in spirit.
    pub fn close(self) {}
}

impl<'r> Iterator for Selection<'r> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_tuple() {
            Ok(Some(t)) => Some(Ok(t)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use std::path::PathBuf;

    fn unique_root(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("mhashdb-sel-{}-{}-{}", prefix, pid, t))
    }

    const CV: &str = "0:0,1:0,2:0,0:1,1:1,2:1,0:2,1:2";

    fn fresh(prefix: &str) -> Relation {
        let root = unique_root(prefix);
        Relation::create(&root, 3, 1, 0, CV, &StoreConfig::default()).unwrap();
        Relation::open(&root, true, StoreConfig::default()).unwrap()
    }

    fn collect(r: &mut Relation, q: &[u8]) -> Vec<Vec<u8>> {
        let mut sel = Selection::start(r, q).unwrap();
        let mut out = Vec::new();
        while let Some(t) = sel.next_tuple().unwrap() {
            out.push(t);
        }
        out
    }

    #[test]
    fn full_wildcard_yields_everything() {
        let mut r = fresh("all");
        r.add_to_relation(b"1,a,x").unwrap();
        r.add_to_relation(b"2,b,y").unwrap();
        r.add_to_relation(b"3,c,z").unwrap();
        let got = collect(&mut r, b"?,?,?");
        assert_eq!(got.len(), 3);
    }

    #[test]
    fn literal_known_attribute_narrows_to_one() {
        let mut r = fresh("narrow");
        r.add_to_relation(b"1,a,x").unwrap();
        r.add_to_relation(b"2,b,y").unwrap();
        r.add_to_relation(b"3,c,z").unwrap();
        let got = collect(&mut r, b"1,?,?");
        assert_eq!(got, vec![b"1,a,x".to_vec()]);
    }

    #[test]
    fn wildcard_subsumption() {
        let mut r = fresh("subsume");
        r.add_to_relation(b"1,abc,x").unwrap();
        r.add_to_relation(b"1,abd,x").unwrap();
        let suffix = collect(&mut r, b"1,ab%,x");
        assert_eq!(suffix.len(), 2);
        let prefix_c = collect(&mut r, b"1,%c,x");
        assert_eq!(prefix_c, vec![b"1,abc,x".to_vec()]);
        let mid = collect(&mut r, b"1,ab%d,x");
        assert_eq!(mid, vec![b"1,abd,x".to_vec()]);
    }

    #[test]
    fn insert_idempotent_scan_yields_twice() {
        let mut r = fresh("dup");
        r.add_to_relation(b"1,a,x").unwrap();
        r.add_to_relation(b"1,a,x").unwrap();
        let got = collect(&mut r, b"1,a,x");
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn two_unknown_positions_visit_exactly_four_buckets() {
        let mut r = fresh("four-buckets");
        let mut i = 0u32;
        // Insert until the split pointer wraps back to 0 at depth >= 2, so
        // n_pages == 2^depth exactly and no candidate is out of range.
        while !(r.depth() >= 2 && r.sp() == 0) {
            let t = format!("{},{},z", i, i);
            r.add_to_relation(t.as_bytes()).unwrap();
            i += 1;
            assert!(i < 10_000, "did not reach depth>=2 within a sane number of inserts");
        }
        let mut sel = Selection::start(&mut r, b"?,?,z").unwrap();
        while sel.next_tuple().unwrap().is_some() {}
        assert_eq!(sel.buckets_visited(), 4);
    }

    #[test]
    fn scan_survives_a_split() {
        let mut r = fresh("split-scan");
        for i in 0..40u32 {
            let t = format!("{},a,x", i);
            r.add_to_relation(t.as_bytes()).unwrap();
        }
        assert!(r.depth() >= 1);
        for i in 0..40u32 {
            let q = format!("{},?,?", i);
            let got = collect(&mut r, q.as_bytes());
            assert_eq!(got.len(), 1, "tuple {} missing after split", i);
        }
    }
}
