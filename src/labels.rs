//! Static label tables: raw model label → category and friendly display name.

use std::collections::HashMap;

/// Category assigned to labels missing from the table.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Class labels of the CleanEye garbage model, in class-id order.
pub const DEFAULT_CLASS_LABELS: [&str; 6] = ["0", "c", "garbage", "garbage_bag", "waste", "trash"];

const DEFAULT_CATEGORIES: [(&str, &str); 6] = [
    ("0", "General"),
    ("c", "Recyclable"),
    ("garbage", "General"),
    ("garbage_bag", "Recyclable"),
    ("waste", "General"),
    ("trash", "General"),
];

/// Total mapping from raw label to category, plus optional display names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryTable {
    categories: HashMap<String, String>,
    friendly: HashMap<String, String>,
    fallback: String,
}

impl CategoryTable {
    /// Empty table; every label maps to `fallback`.
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            categories: HashMap::new(),
            friendly: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn cleaneye_default() -> Self {
        let mut table = Self::new(UNKNOWN_CATEGORY);
        for (label, category) in DEFAULT_CATEGORIES {
            table.insert_category(label, category);
        }
        table
    }

    pub fn insert_category(&mut self, raw_label: impl Into<String>, category: impl Into<String>) {
        self.categories.insert(raw_label.into(), category.into());
    }

    pub fn insert_friendly(&mut self, raw_label: impl Into<String>, friendly: impl Into<String>) {
        self.friendly.insert(raw_label.into(), friendly.into());
    }

    pub fn set_fallback(&mut self, fallback: impl Into<String>) {
        self.fallback = fallback.into();
    }

    pub fn category_for(&self, raw_label: &str) -> &str {
        self.categories
            .get(raw_label)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Display label; defaults to the raw label.
    pub fn friendly_label<'a>(&'a self, raw_label: &'a str) -> &'a str {
        self.friendly
            .get(raw_label)
            .map(String::as_str)
            .unwrap_or(raw_label)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::cleaneye_default()
    }
}
