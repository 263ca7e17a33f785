//! Scanned article inventory
//!
//! Tags scanned at the loading dock are resolved to article names and
//! counted. Order of first appearance is kept, since it decides which block
//! each article lands on.

use std::collections::HashMap;

use log::{info, warn};

use crate::writer::ArticleRecord;

/// Resolves a scanned tag to an article name
pub trait ArticleLookup {
    fn lookup(&self, tag: &str) -> Option<String>;
}

impl ArticleLookup for HashMap<String, String> {
    fn lookup(&self, tag: &str) -> Option<String> {
        self.get(tag.trim()).cloned()
    }
}

/// Articles with their scanned quantities, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    records: Vec<ArticleRecord>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more of `name`, returning its new quantity
    pub fn add(&mut self, name: &str) -> u32 {
        if let Some(record) = self.records.iter_mut().find(|r| r.name == name) {
            record.quantity += 1;
            return record.quantity;
        }
        self.records.push(ArticleRecord::new(name, 1));
        1
    }

    /// Resolve a tag and count the article
    ///
    /// Returns the article name, or None for an unknown tag.
    pub fn scan<L: ArticleLookup + ?Sized>(&mut self, tag: &str, lookup: &L) -> Option<String> {
        let tag = tag.trim();
        if tag.is_empty() {
            return None;
        }
        match lookup.lookup(tag) {
            Some(name) => {
                let quantity = self.add(&name);
                info!(
                    "Added: {} (x{}) | Unique: {} | Total items: {}",
                    name,
                    quantity,
                    self.unique_count(),
                    self.total_items()
                );
                Some(name)
            }
            None => {
                warn!("Unknown RFID tag: {}", tag);
                None
            }
        }
    }

    /// Drop an article entirely; later articles move up one block
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.name != name);
        self.records.len() != before
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn quantity(&self, name: &str) -> Option<u32> {
        self.records.iter().find(|r| r.name == name).map(|r| r.quantity)
    }

    pub fn unique_count(&self) -> usize {
        self.records.len()
    }

    pub fn total_items(&self) -> u32 {
        self.records.iter().map(|r| r.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in the order they were first scanned
    pub fn records(&self) -> &[ArticleRecord] {
        &self.records
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a ArticleRecord;
    type IntoIter = std::slice::Iter<'a, ArticleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> HashMap<String, String> {
        [
            ("0210462016561", "Premium Coffee Beans"),
            ("0210462015227", "Premium Coffee Beans"),
            ("0210460765236", "Organic Green Tea"),
            ("0004859272", "Fresh Orange Juice"),
        ]
        .into_iter()
        .map(|(tag, name)| (tag.to_string(), name.to_string()))
        .collect()
    }

    #[test]
    fn test_add_counts_in_order() {
        let mut inventory = Inventory::new();
        assert_eq!(inventory.add("Tea"), 1);
        assert_eq!(inventory.add("Coffee"), 1);
        assert_eq!(inventory.add("Tea"), 2);

        assert_eq!(
            inventory.records(),
            &[ArticleRecord::new("Tea", 2), ArticleRecord::new("Coffee", 1)]
        );
        assert_eq!(inventory.unique_count(), 2);
        assert_eq!(inventory.total_items(), 3);
    }

    #[test]
    fn test_scan_resolves_tags() {
        let catalog = catalog();
        let mut inventory = Inventory::new();

        assert_eq!(
            inventory.scan("0210462016561", &catalog).as_deref(),
            Some("Premium Coffee Beans")
        );
        // Different tag, same article
        inventory.scan(" 0210462015227 \n", &catalog);
        inventory.scan("0004859272", &catalog);

        assert_eq!(inventory.quantity("Premium Coffee Beans"), Some(2));
        assert_eq!(inventory.quantity("Fresh Orange Juice"), Some(1));
        assert_eq!(inventory.records()[1].name, "Fresh Orange Juice");
    }

    #[test]
    fn test_scan_unknown_tag() {
        let mut inventory = Inventory::new();
        assert!(inventory.scan("9999", &catalog()).is_none());
        assert!(inventory.scan("   ", &catalog()).is_none());
        assert!(inventory.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut inventory = Inventory::new();
        inventory.add("A");
        inventory.add("B");
        inventory.add("C");

        assert!(inventory.remove("B"));
        assert!(!inventory.remove("B"));
        let names: Vec<_> = (&inventory).into_iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);

        inventory.clear();
        assert!(inventory.is_empty());
        assert_eq!(inventory.total_items(), 0);
    }
}
