//! The choice vector.
//!
//! `CV[i] = (att, bit)` says: bit `i` of a tuple's bucket address comes
//! from bit `bit` of `hash(attr[att])`. The vector has fixed length
//! `MAXCHVEC` so that the engine can split up to depth `MAXCHVEC - 1`
//! without ever running out of address bits.

use crate::consts::MAXCHVEC;
use anyhow::{anyhow, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceItem {
    pub att: u32,
    pub bit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceVector {
    pub items: [ChoiceItem; MAXCHVEC],
}

impl ChoiceVector {
    #[inline]
    pub fn get(&self, i: usize) -> ChoiceItem {
        self.items[i]
    }

    /// Parse `att:bit,att:bit,...` (at most `MAXCHVEC` entries). Any
    /// remaining slots are filled by round-robining
    /// `(i mod n_attrs, bit_counter[i mod n_attrs]++)`, so later splits
    /// (which consume higher-index slots) draw fresh bits from
    /// successively later attributes rather than reusing bit 0 forever.
    pub fn parse(text: &str, n_attrs: u32) -> Result<Self> {
        if n_attrs == 0 {
            return Err(anyhow!("n_attrs must be >= 1"));
        }
        let mut items = Vec::with_capacity(MAXCHVEC);
        if !text.trim().is_empty() {
            for entry in text.split(',') {
                let entry = entry.trim();
                if entry.is_empty() {
                    continue;
                }
                let (att_s, bit_s) = entry
                    .split_once(':')
                    .ok_or_else(|| anyhow!("bad choice vector entry '{}' (want att:bit)", entry))?;
                let att: u32 = att_s
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("bad attribute index '{}'", att_s))?;
                let bit: u32 = bit_s
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("bad bit index '{}'", bit_s))?;
                if att >= n_attrs {
                    return Err(anyhow!(
                        "choice vector attribute {} out of range (n_attrs={})",
                        att,
                        n_attrs
                    ));
                }
                if bit >= 32 {
                    return Err(anyhow!("choice vector bit {} out of range (<32)", bit));
                }
                items.push(ChoiceItem { att, bit });
            }
        }
        if items.len() > MAXCHVEC {
            return Err(anyhow!(
                "choice vector has {} entries, max is {}",
                items.len(),
                MAXCHVEC
            ));
        }

        // Fill the remainder deterministically. bit_counter[a] starts at
        // the number of times attribute `a` already appears among the
        // user-supplied entries, so freshly generated picks never repeat
        // a bit already claimed for that attribute by an explicit entry.
        let mut bit_counter = vec![0u32; n_attrs as usize];
        for it in &items {
            bit_counter[it.att as usize] += 1;
        }
        let mut i = items.len();
        while i < MAXCHVEC {
            let att = (i as u32) % n_attrs;
            let bit = bit_counter[att as usize] % 32;
            bit_counter[att as usize] += 1;
            items.push(ChoiceItem { att, bit });
            i += 1;
        }

        let mut arr = [ChoiceItem { att: 0, bit: 0 }; MAXCHVEC];
        arr.copy_from_slice(&items);
        Ok(Self { items: arr })
    }

    /// Render back to the textual `att:bit,...` form (all `MAXCHVEC`
    /// entries, including the round-robin-filled tail).
    pub fn to_text(&self) -> String {
        self.items
            .iter()
            .map(|it| format!("{}:{}", it.att, it.bit))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub(crate) fn write_to(&self, w: &mut impl Write) -> Result<()> {
        for it in &self.items {
            w.write_u32::<LittleEndian>(it.att)?;
            w.write_u32::<LittleEndian>(it.bit)?;
        }
        Ok(())
    }

    pub(crate) fn read_from(r: &mut impl Read) -> Result<Self> {
        let mut items = [ChoiceItem { att: 0, bit: 0 }; MAXCHVEC];
        for it in items.iter_mut() {
            it.att = r.read_u32::<LittleEndian>()?;
            it.bit = r.read_u32::<LittleEndian>()?;
        }
        Ok(Self { items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_explicit_entries_and_fills_tail() {
        let cv = ChoiceVector::parse("0:0,1:0,2:0,0:1,1:1,2:1,0:2,1:2", 3).unwrap();
        assert_eq!(cv.get(0), ChoiceItem { att: 0, bit: 0 });
        assert_eq!(cv.get(7), ChoiceItem { att: 1, bit: 2 });
        // Tail is round-robin starting at index 8: att = 8 % 3 = 2.
        assert_eq!(cv.get(8).att, 2);
        assert_eq!(cv.items.len(), MAXCHVEC);
    }

    #[test]
    fn rejects_out_of_range_attribute() {
        assert!(ChoiceVector::parse("5:0", 3).is_err());
    }

    #[test]
    fn rejects_too_many_entries() {
        let text = (0..MAXCHVEC + 1)
            .map(|i| format!("0:{}", i % 32))
            .collect::<Vec<_>>()
            .join(",");
        assert!(ChoiceVector::parse(&text, 1).is_err());
    }

    #[test]
    fn empty_text_fills_everything_by_round_robin() {
        let cv = ChoiceVector::parse("", 2).unwrap();
        assert_eq!(cv.get(0), ChoiceItem { att: 0, bit: 0 });
        assert_eq!(cv.get(1), ChoiceItem { att: 1, bit: 0 });
        assert_eq!(cv.get(2), ChoiceItem { att: 0, bit: 1 });
    }
}
