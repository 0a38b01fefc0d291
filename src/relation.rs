//! The relation descriptor: metadata, insertion path, and linear-hashing split.

use crate::addr::{bucket_of, tuple_hash};
use crate::choice::ChoiceVector;
use crate::config::StoreConfig;
use crate::consts::{DATA_EXT, INFO_EXT, INFO_MAGIC, MAXCHVEC, NO_PAGE, OVFLOW_EXT, PAGESIZE};
use crate::page::Page;
use crate::tuple::split_attrs;
use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

fn info_path(name: &Path) -> PathBuf {
    with_ext(name, INFO_EXT)
}
fn data_path(name: &Path) -> PathBuf {
    with_ext(name, DATA_EXT)
}
fn ovflow_path(name: &Path) -> PathBuf {
    with_ext(name, OVFLOW_EXT)
}

fn with_ext(name: &Path, ext: &str) -> PathBuf {
    let mut s = name.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// A relation's metadata counters, persisted in its `.info` file. File
/// handles live separately on [`Relation`] so this struct stays
/// trivially (de)serializable.
#[derive(Debug, Clone)]
pub struct RelnMeta {
    pub n_attrs: u32,
    pub depth: u32,
    pub sp: u32,
    pub n_pages: u32,
    pub n_tups: u32,
    pub pagecap: u32,
    pub curcap: u32,
    pub cv: ChoiceVector,
}

impl RelnMeta {
    fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_all(INFO_MAGIC)?;
        w.write_u32::<LittleEndian>(self.n_attrs)?;
        w.write_u32::<LittleEndian>(self.depth)?;
        w.write_u32::<LittleEndian>(self.sp)?;
        w.write_u32::<LittleEndian>(self.n_pages)?;
        w.write_u32::<LittleEndian>(self.n_tups)?;
        w.write_u32::<LittleEndian>(self.pagecap)?;
        w.write_u32::<LittleEndian>(self.curcap)?;
        self.cv.write_to(w)?;
        Ok(())
    }

    fn read_from(r: &mut impl Read) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != INFO_MAGIC {
            return Err(anyhow!("bad .info magic"));
        }
        let n_attrs = r.read_u32::<LittleEndian>()?;
        let depth = r.read_u32::<LittleEndian>()?;
        let sp = r.read_u32::<LittleEndian>()?;
        let n_pages = r.read_u32::<LittleEndian>()?;
        let n_tups = r.read_u32::<LittleEndian>()?;
        let pagecap = r.read_u32::<LittleEndian>()?;
        let curcap = r.read_u32::<LittleEndian>()?;
        let cv = ChoiceVector::read_from(r)?;
        Ok(Self {
            n_attrs,
            depth,
            sp,
            n_pages,
            n_tups,
            pagecap,
            curcap,
            cv,
        })
    }
}

pub struct Relation {
    pub meta: RelnMeta,
    writable: bool,
    info: std::fs::File,
    data: std::fs::File,
    ovflow: std::fs::File,
    cfg: StoreConfig,
}

impl Relation {
    /// `newRelation`: create the three backing files and `n_pages0`
    /// empty primary pages, then close.
    pub fn create(
        name: &Path,
        n_attrs: u32,
        n_pages0: u32,
        depth0: u32,
        cv_text: &str,
        cfg: &StoreConfig,
    ) -> Result<()> {
        if n_attrs == 0 {
            return Err(anyhow!("n_attrs must be >= 1"));
        }
        if cfg.page_size != PAGESIZE {
            return Err(anyhow!(
                "custom page sizes are not supported in this build (requested {}, fixed at {})",
                cfg.page_size,
                PAGESIZE
            ));
        }
        if (depth0 as usize) + 1 > MAXCHVEC {
            return Err(anyhow!(
                "initial depth {} leaves no room in a {}-slot choice vector",
                depth0,
                MAXCHVEC
            ));
        }
        if n_pages0 == 0 {
            return Err(anyhow!("n_pages0 must be >= 1"));
        }
        let ip = info_path(name);
        if ip.exists() {
            return Err(anyhow!("relation '{}' already exists", name.display()));
        }
        let cv = ChoiceVector::parse(cv_text, n_attrs)?;
        let pagecap = 1024 / (10 * n_attrs);
        if pagecap == 0 {
            return Err(anyhow!(
                "n_attrs={} makes pagecap 0 (1024/(10*n_attrs)); too many attributes",
                n_attrs
            ));
        }

        let mut info = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&ip)
            .with_context(|| format!("create {}", ip.display()))?;
        let mut data = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(data_path(name))
            .with_context(|| format!("create {}", data_path(name).display()))?;
        let ovflow = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(ovflow_path(name))
            .with_context(|| format!("create {}", ovflow_path(name).display()))?;

        for _ in 0..n_pages0 {
            Page::add(&mut data)?;
        }

        let meta = RelnMeta {
            n_attrs,
            depth: depth0,
            sp: 0,
            n_pages: n_pages0,
            n_tups: 0,
            pagecap,
            curcap: 0,
            cv,
        };
        meta.write_to(&mut info)?;
        info.sync_all()?;
        data.sync_all()?;

        info!(
            "created relation '{}' (n_attrs={}, n_pages0={}, depth0={}, pagecap={})",
            name.display(),
            n_attrs,
            n_pages0,
            depth0,
            pagecap
        );
        drop(ovflow);
        Ok(())
    }

    /// Open an existing relation. `writable` governs both whether
    /// inserts are permitted and whether metadata is flushed back on
    /// close.
    pub fn open(name: &Path, writable: bool, cfg: StoreConfig) -> Result<Self> {
        let ip = info_path(name);
        let mut info = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&ip)
            .with_context(|| format!("open {}", ip.display()))?;
        info.seek(SeekFrom::Start(0))?;
        let meta = RelnMeta::read_from(&mut info)?;

        let data = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(data_path(name))
            .with_context(|| format!("open {}", data_path(name).display()))?;
        let ovflow = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(ovflow_path(name))
            .with_context(|| format!("open {}", ovflow_path(name).display()))?;

        Ok(Self {
            meta,
            writable,
            info,
            data,
            ovflow,
            cfg,
        })
    }

    pub fn exists(name: &Path) -> bool {
        info_path(name).exists()
    }

    /// Flush metadata in write mode. Idempotent: safe to call more than
    /// once (subsequent calls just rewrite the same bytes).
    pub fn close(&mut self) -> Result<()> {
        if self.writable {
            self.info.seek(SeekFrom::Start(0))?;
            self.meta.write_to(&mut self.info)?;
            self.info.sync_all()?;
        }
        Ok(())
    }

    #[inline]
    pub fn n_attrs(&self) -> u32 {
        self.meta.n_attrs
    }
    #[inline]
    pub fn depth(&self) -> u32 {
        self.meta.depth
    }
    #[inline]
    pub fn sp(&self) -> u32 {
        self.meta.sp
    }
    #[inline]
    pub fn n_pages(&self) -> u32 {
        self.meta.n_pages
    }
    #[inline]
    pub fn n_tups(&self) -> u32 {
        self.meta.n_tups
    }
    #[inline]
    pub fn cv(&self) -> &ChoiceVector {
        &self.meta.cv
    }

    fn get_primary(&mut self, id: u32) -> Result<Page> {
        Page::get(&mut self.data, id as u64, self.cfg.verify_checksums)
    }
    fn put_primary(&mut self, id: u32, p: &mut Page) -> Result<()> {
        p.put(&mut self.data, id as u64)
    }
    fn get_ovf(&mut self, id: u64) -> Result<Page> {
        Page::get(&mut self.ovflow, id, self.cfg.verify_checksums)
    }
    fn put_ovf(&mut self, id: u64, p: &mut Page) -> Result<()> {
        p.put(&mut self.ovflow, id)
    }
    fn add_ovf_page(&mut self) -> Result<u64> {
        Page::add(&mut self.ovflow)
    }

    pub(crate) fn tuple_hash_of(&self, t: &[u8]) -> Result<u32> {
        let attrs = split_attrs(t, self.meta.n_attrs)?;
        Ok(tuple_hash(&attrs, &self.meta.cv))
    }

    /// Insert one tuple into its overflow chain off primary bucket `pid`,
    /// extending the chain with a fresh overflow page if every existing
    /// one is full. Shared by `add_to_relation` and `split`.
    fn insert_into_chain(&mut self, pid: u32, t: &[u8]) -> Result<()> {
        let mut primary = self.get_primary(pid)?;
        if primary.overflow() == NO_PAGE {
            let newp = self.add_ovf_page()?;
            primary.set_overflow(newp);
            self.put_primary(pid, &mut primary)?;
            let mut np = self.get_ovf(newp)?;
            if !np.add_tuple(t)? {
                return Err(anyhow!(
                    "tuple of {} bytes cannot fit on a freshly allocated overflow page",
                    t.len()
                ));
            }
            self.put_ovf(newp, &mut np)?;
            return Ok(());
        }

        let mut chain_id = primary.overflow();
        loop {
            let mut pg = self.get_ovf(chain_id)?;
            if pg.add_tuple(t)? {
                self.put_ovf(chain_id, &mut pg)?;
                return Ok(());
            }
            let next = pg.overflow();
            if next == NO_PAGE {
                let newp = self.add_ovf_page()?;
                pg.set_overflow(newp);
                self.put_ovf(chain_id, &mut pg)?;
                let mut np = self.get_ovf(newp)?;
                if !np.add_tuple(t)? {
                    return Err(anyhow!(
                        "tuple of {} bytes cannot fit on a freshly allocated overflow page",
                        t.len()
                    ));
                }
                self.put_ovf(newp, &mut np)?;
                debug!("extended overflow chain at bucket {} with page {}", pid, newp);
                return Ok(());
            }
            chain_id = next;
        }
    }

    /// `addToRelation`: insert `t`, splitting first if the per-bucket
    /// insertion quota has been reached. Returns the primary bucket id
    /// the tuple was addressed to (its actual storage page may be a
    /// page further down that bucket's overflow chain).
    pub fn add_to_relation(&mut self, t: &[u8]) -> Result<u32> {
        if !self.writable {
            return Err(anyhow!("relation is read-only"));
        }
        split_attrs(t, self.meta.n_attrs)?; // arity check, fails fast
        if self.meta.curcap == self.meta.pagecap {
            self.split()?;
            self.meta.curcap = 0;
        }
        self.meta.curcap += 1;

        let h = self.tuple_hash_of(t)?;
        let p = bucket_of(h, self.meta.depth, self.meta.sp);

        let mut primary = self.get_primary(p)?;
        if primary.add_tuple(t)? {
            self.put_primary(p, &mut primary)?;
            self.meta.n_tups += 1;
            return Ok(p);
        }
        self.insert_into_chain(p, t)?;
        self.meta.n_tups += 1;
        Ok(p)
    }

    /// `split`: drain bucket `sp`'s primary page and overflow chain into
    /// itself and its new sibling `2^depth + sp`, by bit `depth` of each
    /// tuple's hash, then advance the split pointer (and depth, if the
    /// round just completed).
    fn split(&mut self) -> Result<()> {
        if (self.meta.depth as usize) + 1 >= MAXCHVEC {
            return Err(anyhow!(
                "cannot split past depth {}: choice vector only has {} slots",
                self.meta.depth,
                MAXCHVEC
            ));
        }
        let sp = self.meta.sp;
        let new_bucket = (1u32 << self.meta.depth) + sp;

        let new_id = Page::add(&mut self.data)?;
        debug_assert_eq!(new_id, new_bucket as u64, "sibling bucket id must be 2^d + sp");
        self.meta.n_pages += 1;

        // Collect every tuple currently reachable from bucket `sp`
        // (primary + overflow chain), then reset those pages to empty.
        let old_primary = self.get_primary(sp)?;
        let mut drained: Vec<Vec<u8>> = old_primary.tuples().map(|t| t.to_vec()).collect();
        let mut ovf_chain: Vec<u64> = Vec::new();
        let mut next = old_primary.overflow();
        while next != NO_PAGE {
            let pg = self.get_ovf(next)?;
            drained.extend(pg.tuples().map(|t| t.to_vec()));
            ovf_chain.push(next);
            next = pg.overflow();
        }

        // Reset the primary page (overflow link intentionally dropped;
        // the chain pages themselves are reused below, zeroed).
        let mut fresh_primary = Page::new();
        self.put_primary(sp, &mut fresh_primary)?;

        // Re-initialize the old overflow pages as empty, in place, kept
        // available for reuse by the rebuilt chains rather than leaking
        // them as permanently-abandoned pages.
        for &ovf_id in &ovf_chain {
            let mut fresh = Page::new();
            self.put_ovf(ovf_id, &mut fresh)?;
        }
        let mut free_ovf: Vec<u64> = ovf_chain;
        let new_depth = self.meta.depth + 1;

        for t in &drained {
            let h = self.tuple_hash_of(t)?;
            let dest = bucket_of(h, new_depth, 0);
            debug_assert!(dest == sp || dest == new_bucket);
            self.split_insert_one(dest, t, &mut free_ovf)?;
        }

        debug!(
            "split bucket {} -> {{{}, {}}} ({} tuples redistributed), depth now candidate {}",
            sp,
            sp,
            new_bucket,
            drained.len(),
            new_depth
        );

        self.meta.sp += 1;
        if self.meta.sp == (1u32 << self.meta.depth) {
            self.meta.depth += 1;
            self.meta.sp = 0;
        }
        Ok(())
    }

    /// Insert one tuple during a split, preferring to reuse an
    /// already-zeroed overflow page from `free_ovf` before allocating a
    /// new one.
    fn split_insert_one(&mut self, pid: u32, t: &[u8], free_ovf: &mut Vec<u64>) -> Result<()> {
        let mut primary = self.get_primary(pid)?;
        if primary.add_tuple(t)? {
            self.put_primary(pid, &mut primary)?;
            return Ok(());
        }

        if primary.overflow() == NO_PAGE {
            let newp = self.take_or_alloc_ovf(free_ovf)?;
            primary.set_overflow(newp);
            self.put_primary(pid, &mut primary)?;
            let mut np = self.get_ovf(newp)?;
            if !np.add_tuple(t)? {
                return Err(anyhow!("tuple cannot fit on a fresh overflow page during split"));
            }
            self.put_ovf(newp, &mut np)?;
            return Ok(());
        }

        let mut chain_id = primary.overflow();
        loop {
            let mut pg = self.get_ovf(chain_id)?;
            if pg.add_tuple(t)? {
                self.put_ovf(chain_id, &mut pg)?;
                return Ok(());
            }
            let next = pg.overflow();
            if next == NO_PAGE {
                let newp = self.take_or_alloc_ovf(free_ovf)?;
                pg.set_overflow(newp);
                self.put_ovf(chain_id, &mut pg)?;
                let mut np = self.get_ovf(newp)?;
                if !np.add_tuple(t)? {
                    return Err(anyhow!("tuple cannot fit on a fresh overflow page during split"));
                }
                self.put_ovf(newp, &mut np)?;
                return Ok(());
            }
            chain_id = next;
        }
    }

    fn take_or_alloc_ovf(&mut self, free_ovf: &mut Vec<u64>) -> Result<u64> {
        if let Some(id) = free_ovf.pop() {
            Ok(id)
        } else {
            self.add_ovf_page()
        }
    }

    /// Render a human-readable summary: global counters, the choice
    /// vector, then one line per bucket showing its primary page and
    /// overflow chain as `(id,ntuples,freebytes,next) -> (ov...)`.
    pub fn stats(&mut self) -> Result<String> {
        use std::fmt::Write as _;
        let mut out = String::new();
        writeln!(
            out,
            "Global Info:\n#attrs:{}  #pages:{}  #tuples:{}  d:{}  sp:{}",
            self.meta.n_attrs, self.meta.n_pages, self.meta.n_tups, self.meta.depth, self.meta.sp
        )?;
        writeln!(out, "Choice vector\n{}", self.meta.cv.to_text())?;
        writeln!(out, "Bucket Info:")?;
        for pid in 0..self.meta.n_pages {
            let p = self.get_primary(pid)?;
            write!(
                out,
                "[{:2}]  (d{},{},{},{})",
                pid,
                pid,
                p.n_tuples(),
                p.free_space(),
                ovf_display(p.overflow())
            )?;
            let mut ovid = p.overflow();
            while ovid != NO_PAGE {
                let op = self.get_ovf(ovid)?;
                write!(
                    out,
                    " -> (ov{},{},{},{})",
                    ovid,
                    op.n_tuples(),
                    op.free_space(),
                    ovf_display(op.overflow())
                )?;
                ovid = op.overflow();
            }
            writeln!(out)?;
        }
        Ok(out)
    }

    /// Sum of `n_tuples` across every primary and overflow page — should
    /// always equal `n_tups()`.
    pub fn count_live_tuples(&mut self) -> Result<u64> {
        let mut total = 0u64;
        for pid in 0..self.meta.n_pages {
            let p = self.get_primary(pid)?;
            total += p.n_tuples() as u64;
            let mut ovid = p.overflow();
            while ovid != NO_PAGE {
                let op = self.get_ovf(ovid)?;
                total += op.n_tuples() as u64;
                ovid = op.overflow();
            }
        }
        Ok(total)
    }

    pub(crate) fn read_primary(&mut self, id: u32) -> Result<Page> {
        self.get_primary(id)
    }
    pub(crate) fn read_ovf(&mut self, id: u64) -> Result<Page> {
        self.get_ovf(id)
    }
}

fn ovf_display(id: u64) -> i64 {
    if id == NO_PAGE {
        -1
    } else {
        id as i64
    }
}

impl Drop for Relation {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
