//! Purpose: Product categories and the "all categories" filter sentinel.
//! Exports: `Category`, `CategoryFilter`.
//! Role: Maps between wire values, backend enum constants and human labels.
//! Invariants: Requests always carry the wire value (`roupas`, `calcados`, ...).
//! Invariants: Decoding accepts either the wire value or the backend enum constant.
use crate::core::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "roupas", alias = "CLOTHES")]
    Clothes,
    #[serde(rename = "roupas_intimas", alias = "UNDERWEAR")]
    Underwear,
    #[serde(rename = "calcados", alias = "SHOES")]
    Footwear,
    #[serde(rename = "acessorios", alias = "ACCESSORIES")]
    Accessories,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Clothes,
        Category::Underwear,
        Category::Footwear,
        Category::Accessories,
    ];

    /// Value sent in query strings and request bodies.
    pub fn wire_value(self) -> &'static str {
        match self {
            Category::Clothes => "roupas",
            Category::Underwear => "roupas_intimas",
            Category::Footwear => "calcados",
            Category::Accessories => "acessorios",
        }
    }

    /// Enum constant the backend uses when serializing responses.
    pub fn constant(self) -> &'static str {
        match self {
            Category::Clothes => "CLOTHES",
            Category::Underwear => "UNDERWEAR",
            Category::Footwear => "SHOES",
            Category::Accessories => "ACCESSORIES",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Clothes => "Roupas",
            Category::Underwear => "Roupas íntimas",
            Category::Footwear => "Calçados",
            Category::Accessories => "Acessórios",
        }
    }

    /// Case-insensitive lookup by wire value, enum constant or label.
    pub fn lookup(input: &str) -> Option<Category> {
        let needle = input.trim();
        Category::ALL.into_iter().find(|category| {
            needle.eq_ignore_ascii_case(category.wire_value())
                || needle.eq_ignore_ascii_case(category.constant())
                || needle.to_lowercase() == category.label().to_lowercase()
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Category::lookup(input).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("unknown category: {}", input.trim()))
                .with_hint("Use one of: roupas, roupas_intimas, calcados, acessorios.")
        })
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn category(self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(category) => Some(category),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CategoryFilter::All => "Todas",
            CategoryFilter::Only(category) => category.label(),
        }
    }
}

impl From<Option<Category>> for CategoryFilter {
    fn from(value: Option<Category>) -> Self {
        value.map_or(CategoryFilter::All, CategoryFilter::Only)
    }
}

impl FromStr for CategoryFilter {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case("todas") {
            return Ok(CategoryFilter::All);
        }
        trimmed.parse().map(CategoryFilter::Only)
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, CategoryFilter};
    use crate::core::error::ErrorKind;

    #[test]
    fn lookup_accepts_every_spelling() {
        assert_eq!(Category::lookup("calcados"), Some(Category::Footwear));
        assert_eq!(Category::lookup("SHOES"), Some(Category::Footwear));
        assert_eq!(Category::lookup("Calçados"), Some(Category::Footwear));
        assert_eq!(Category::lookup("  ROUPAS_INTIMAS "), Some(Category::Underwear));
        assert_eq!(Category::lookup("roupas íntimas"), Some(Category::Underwear));
        assert_eq!(Category::lookup("hats"), None);
    }

    #[test]
    fn unknown_category_is_usage_error() {
        let err = "hats".parse::<Category>().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.hint().is_some());
    }

    #[test]
    fn serde_writes_wire_value_and_reads_constants() {
        let encoded = serde_json::to_string(&Category::Accessories).expect("encode");
        assert_eq!(encoded, "\"acessorios\"");
        let decoded: Category = serde_json::from_str("\"UNDERWEAR\"").expect("decode");
        assert_eq!(decoded, Category::Underwear);
        let decoded: Category = serde_json::from_str("\"roupas\"").expect("decode");
        assert_eq!(decoded, Category::Clothes);
    }

    #[test]
    fn filter_parses_sentinel() {
        assert_eq!("todas".parse::<CategoryFilter>().ok(), Some(CategoryFilter::All));
        assert_eq!("ALL".parse::<CategoryFilter>().ok(), Some(CategoryFilter::All));
        assert_eq!(
            "acessorios".parse::<CategoryFilter>().ok(),
            Some(CategoryFilter::Only(Category::Accessories))
        );
        assert_eq!(CategoryFilter::All.category(), None);
    }
}
