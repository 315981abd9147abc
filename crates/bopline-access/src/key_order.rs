//! Key orders: permutations of predicate positions into index key positions.

use std::fmt;

use crate::error::{AccessError, Result};
use crate::keys::{decode_component, encode_key};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyOrder {
    name: String,
    // positions[k] = predicate position stored at key position k
    positions: Vec<usize>,
}

impl KeyOrder {
    pub fn new(name: impl Into<String>, positions: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            positions,
        }
    }

    pub fn spo() -> Self {
        Self::new("SPO", vec![0, 1, 2])
    }

    pub fn pos() -> Self {
        Self::new("POS", vec![1, 2, 0])
    }

    pub fn osp() -> Self {
        Self::new("OSP", vec![2, 0, 1])
    }

    /// The three cyclic triple orders. Every set of bound triple positions is
    /// a key prefix of one of them.
    pub fn triple_orders() -> Vec<KeyOrder> {
        vec![Self::spo(), Self::pos(), Self::osp()]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn key_arity(&self) -> usize {
        self.positions.len()
    }

    /// Key position holding predicate position `pred_pos`.
    pub fn key_position_of(&self, pred_pos: usize) -> Option<usize> {
        self.positions.iter().position(|&p| p == pred_pos)
    }

    /// Number of leading key positions bound in `components`.
    pub fn bound_prefix_len(&self, components: &[Option<u64>]) -> usize {
        self.positions
            .iter()
            .take_while(|&&p| components.get(p).copied().flatten().is_some())
            .count()
    }

    pub fn bound_prefix(&self, components: &[Option<u64>]) -> Vec<u64> {
        self.positions
            .iter()
            .map_while(|&p| components.get(p).copied().flatten())
            .collect()
    }

    /// Encode a tuple given in predicate order.
    pub fn encode_tuple(&self, tuple: &[u64]) -> Result<Vec<u8>> {
        let permuted = self
            .positions
            .iter()
            .map(|&p| tuple.get(p).copied())
            .collect::<Option<Vec<u64>>>()
            .ok_or_else(|| {
                AccessError::KeyDecode(format!(
                    "{}-tuple does not fit key order {}",
                    tuple.len(),
                    self.name
                ))
            })?;
        Ok(encode_key(&permuted))
    }

    /// Decode a key back into predicate order.
    pub fn decode_tuple(&self, key: &[u8]) -> Result<Vec<u64>> {
        let mut tuple = vec![0; self.positions.len()];
        for (k, &p) in self.positions.iter().enumerate() {
            let slot = tuple.get_mut(p).ok_or_else(|| {
                AccessError::KeyDecode(format!("key order {} is not a permutation", self.name))
            })?;
            *slot = decode_component(key, k)?;
        }
        Ok(tuple)
    }
}

impl fmt::Display for KeyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_prefix_follows_permutation() {
        let bound = [None, Some(7), Some(9)];
        assert_eq!(KeyOrder::spo().bound_prefix_len(&bound), 0);
        assert_eq!(KeyOrder::pos().bound_prefix(&bound), vec![7, 9]);
        assert_eq!(KeyOrder::osp().bound_prefix(&bound), vec![9]);
    }

    #[test]
    fn test_tuple_roundtrip_through_permutation() {
        let order = KeyOrder::pos();
        let key = order.encode_tuple(&[1, 2, 3]).unwrap();
        assert_eq!(key, encode_key(&[2, 3, 1]));
        assert_eq!(order.decode_tuple(&key).unwrap(), vec![1, 2, 3]);
        assert_eq!(order.key_position_of(0), Some(2));
    }

    #[test]
    fn test_encode_rejects_short_tuple() {
        assert!(KeyOrder::spo().encode_tuple(&[1, 2]).is_err());
    }
}
