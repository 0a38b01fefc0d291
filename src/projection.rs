//! Projection: trivial attribute rearrangement over scan output.
//!
//! Configured once (from a CLI's `<proj-list>` argument) and then applied
//! to every tuple a [`crate::selection::Selection`] yields.

use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub enum Projection {
    /// `*`: pass the tuple through unchanged.
    All,
    /// 1-based attribute indices, in the order they should be emitted.
    Indices(Vec<usize>),
}

impl Projection {
    /// Parse `*` or a comma list of 1-based attribute indices.
    pub fn parse(text: &str, n_attrs: u32) -> Result<Self> {
        let text = text.trim();
        if text == "*" {
            return Ok(Projection::All);
        }
        let mut idx = Vec::new();
        for part in text.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(anyhow!("empty attribute index in projection list '{}'", text));
            }
            let i: usize = part
                .parse()
                .map_err(|_| anyhow!("bad attribute index '{}' in projection list", part))?;
            if i == 0 || i > n_attrs as usize {
                return Err(anyhow!(
                    "attribute index {} out of range (relation has {} attributes)",
                    i,
                    n_attrs
                ));
            }
            idx.push(i - 1);
        }
        if idx.is_empty() {
            return Err(anyhow!("projection list '{}' names no attributes", text));
        }
        Ok(Projection::Indices(idx))
    }

    /// Apply the projection to one tuple, returning the selected
    /// attributes joined by commas (or the tuple unchanged for `*`).
    pub fn project(&self, t: &[u8], n_attrs: u32) -> Result<Vec<u8>> {
        match self {
            Projection::All => Ok(t.to_vec()),
            Projection::Indices(idx) => {
                let attrs = crate::tuple::split_attrs(t, n_attrs)?;
                let mut out = Vec::new();
                for (i, &a) in idx.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    out.extend_from_slice(attrs[a]);
                }
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_passes_through() {
        let p = Projection::parse("*", 3).unwrap();
        assert_eq!(p.project(b"1,a,x", 3).unwrap(), b"1,a,x".to_vec());
    }

    #[test]
    fn reorders_and_drops_attributes() {
        let p = Projection::parse("3,1", 3).unwrap();
        assert_eq!(p.project(b"1,a,x", 3).unwrap(), b"x,1".to_vec());
    }

    #[test]
    fn rejects_out_of_range_index() {
        assert!(Projection::parse("4", 3).is_err());
        assert!(Projection::parse("0", 3).is_err());
    }
}
