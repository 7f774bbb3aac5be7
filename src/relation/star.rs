//! Star: relations fanning out from one shared key domain
//!
//! A star is the relational shape of a table: one primary key selects a set
//! of values in each member relation.

use super::bimap::{BiMultiMap, ValueSet};
use super::types::Element;
use std::fmt;

#[derive(Clone)]
pub struct Star<K, V> {
    m2ms: Vec<BiMultiMap<K, V>>,
}

/// One key with the value set of every member (possibly empty)
#[derive(Debug, Clone)]
pub struct StarRow<K, V> {
    pub key: K,
    pub values: Vec<ValueSet<V>>,
}

impl<K: PartialEq, V: Element> PartialEq for StarRow<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.values == other.values
    }
}

impl<K: Eq, V: Element> Eq for StarRow<K, V> {}

impl<K: Element + fmt::Debug, V: Element + fmt::Debug> fmt::Debug for Star<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Star").field("m2ms", &self.m2ms).finish()
    }
}

impl<K: Element, V: Element> Star<K, V> {
    pub fn new(m2ms: Vec<BiMultiMap<K, V>>) -> Self {
        Self { m2ms }
    }

    pub fn m2ms(&self) -> &[BiMultiMap<K, V>] {
        &self.m2ms
    }

    pub fn m2ms_mut(&mut self) -> &mut Vec<BiMultiMap<K, V>> {
        &mut self.m2ms
    }

    pub fn len(&self) -> usize {
        self.m2ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m2ms.is_empty()
    }

    /// Union of member keys, first member's order first
    pub fn keys(&self) -> Vec<K> {
        let mut seen: ValueSet<K> = ValueSet::default();
        for m in &self.m2ms {
            seen.extend(m.keys());
        }
        seen.into_iter().collect()
    }

    /// Value set of `key` in each member
    pub fn get(&self, key: &K) -> Vec<ValueSet<V>> {
        self.m2ms.iter().map(|m| m.get(key).to_set()).collect()
    }

    /// Every way of picking one value per member for `key`
    ///
    /// Empty as soon as one member has no value for `key`.
    pub fn combinations(&self, key: &K) -> Vec<Vec<V>> {
        let mut product: Vec<Vec<V>> = vec![Vec::new()];
        for m in &self.m2ms {
            let choices = m.get(key).to_vec();
            let mut next = Vec::with_capacity(product.len() * choices.len());
            for prefix in &product {
                for choice in &choices {
                    let mut row = prefix.clone();
                    row.push(choice.clone());
                    next.push(row);
                }
            }
            product = next;
        }
        if self.m2ms.is_empty() {
            product.clear();
        }
        product
    }

    /// One row per key of the union, lazily
    pub fn rows(&self) -> impl Iterator<Item = StarRow<K, V>> + '_ {
        self.keys().into_iter().map(move |key| {
            let values = self.get(&key);
            StarRow { key, values }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_star() -> Star<&'static str, &'static str> {
        let email = BiMultiMap::from_pairs([("alice", "a@x"), ("bob", "b@x")]);
        let phone = BiMultiMap::from_pairs([("carol", "555"), ("alice", "123"), ("alice", "456")]);
        Star::new(vec![email, phone])
    }

    #[test]
    fn test_keys_in_first_seen_order() {
        assert_eq!(person_star().keys(), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_rows_include_empty_sets() {
        let rows: Vec<_> = person_star().rows().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].key, "bob");
        assert_eq!(rows[1].values[0].len(), 1);
        assert!(rows[1].values[1].is_empty());
        assert!(rows[2].values[0].is_empty());
    }

    #[test]
    fn test_rows_compare_by_content() {
        let rows: Vec<_> = person_star().rows().collect();
        let again: Vec<_> = person_star().rows().collect();
        assert_eq!(rows, again);
        assert_ne!(rows[0], rows[1]);
        assert!(format!("{:?}", person_star()).starts_with("Star"));
    }

    #[test]
    fn test_combinations() {
        let star = person_star();
        assert_eq!(
            star.combinations(&"alice"),
            vec![vec!["a@x", "123"], vec!["a@x", "456"]]
        );
        assert!(star.combinations(&"bob").is_empty());
        assert!(Star::<u8, u8>::new(Vec::new()).combinations(&1).is_empty());
    }

    #[test]
    fn test_star_shares_relations() {
        let star = person_star();
        star.m2ms()[0].add("dave", "d@x");
        // added to the first member, so ahead of keys only the second has
        assert_eq!(star.keys(), vec!["alice", "bob", "dave", "carol"]);
    }
}
