use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::{CardStatement, ExpenseRecord, ExtractedRecord};

/// Lower-case and strip diacritics: `"José Núñez"` becomes `"jose nunez"`.
pub fn fold(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Entities with free-text search support.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;
}

impl Searchable for ExtractedRecord {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.plate.as_str(),
            self.owner.as_str(),
            self.tag.as_deref().unwrap_or_default(),
            self.concept.as_str(),
            self.unit_code.as_str(),
            self.date.as_deref().unwrap_or_default(),
            self.source_file_name.as_deref().unwrap_or_default(),
        ]
    }
}

impl Searchable for ExpenseRecord {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.concept.as_str(),
            self.date.as_str(),
            self.category.label(),
            self.source_file_name.as_deref().unwrap_or_default(),
        ]
    }
}

impl Searchable for CardStatement {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.bank.as_str(),
            self.holder.as_str(),
            self.period.as_str(),
            self.due_date.as_str(),
        ]
    }
}

/// Precomputed text stored next to the entity so queries never re-derive it.
pub fn build_search_index<T: Searchable + ?Sized>(entity: &T) -> String {
    let joined = entity
        .search_fields()
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    fold(&joined)
}
