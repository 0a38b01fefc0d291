//! Hash-address computation.
//!
//! Composes a tuple's full `MAXCHVEC`-wide bucket-address hash from its
//! per-attribute hashes and the relation's choice vector, and maps a
//! hash down to the bucket currently responsible for it given the
//! linear-hashing directory state `(depth, sp)`.

use crate::bits::{bit_is_set, get_lower, set_bit, Bits};
use crate::choice::ChoiceVector;
use crate::consts::MAXCHVEC;
use crate::hash::hash_any;
use anyhow::Result;

/// Hash every attribute of `t`, then assemble the result bit by bit from
/// the choice vector. Always walks the full `MAXCHVEC` range, not just
/// the bits currently addressed by `(depth, sp)` — a tuple's hash must
/// stay the same across every future split, since splits only ever
/// consume one more low bit of it.
pub fn tuple_hash(attrs: &[&[u8]], cv: &ChoiceVector) -> Bits {
    let attr_hashes: Vec<u32> = attrs.iter().map(|a| hash_any(a)).collect();
    let mut result: Bits = 0;
    for i in 0..MAXCHVEC {
        let item = cv.get(i);
        let h = attr_hashes[item.att as usize];
        if bit_is_set(h, item.bit as usize) {
            result = set_bit(result, i);
        }
    }
    result
}

/// Given a tuple's full hash and the current `(depth, sp)`, which
/// primary bucket currently owns it?
pub fn bucket_of(h: Bits, depth: u32, sp: u32) -> u32 {
    if depth == 0 {
        return 0;
    }
    let p = get_lower(h, depth as usize);
    if p < sp {
        get_lower(h, depth as usize + 1)
    } else {
        p
    }
}

/// Convenience: hash and split `t`'s attributes in one call, returning an
/// error if `t` has the wrong arity.
pub fn tuple_hash_of(t: &[u8], n_attrs: u32, cv: &ChoiceVector) -> Result<Bits> {
    let attrs = crate::tuple::split_attrs(t, n_attrs)?;
    Ok(tuple_hash(&attrs, cv))
}
