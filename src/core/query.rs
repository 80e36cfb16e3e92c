//! Purpose: Derive request endpoints from the current filter selection.
//! Exports: `FilterState`, `SortDirection`, `build_product_query`, `statistics_endpoint`,
//!          `product_endpoint`, `PRODUCTS_PATH`, `DELETED_PRODUCTS_PATH`, `STATISTICS_PATH`.
//! Role: Pure functions; the fetcher compares their output by value to decide refetches.
//! Invariants: Parameter order is fixed: `categoria` (when filtered) then `sort`.
//! Invariants: `sort` is always present on list endpoints and never on statistics.
use crate::core::category::CategoryFilter;

pub const PRODUCTS_PATH: &str = "/produtos";
pub const DELETED_PRODUCTS_PATH: &str = "/produtos/apagados";
pub const STATISTICS_PATH: &str = "/produtos/calcular_total";

const SORT_FIELD: &str = "preco";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_descending(descending: bool) -> Self {
        if descending {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// View-local filter selection; never persisted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FilterState {
    pub category: CategoryFilter,
    pub sort_descending: bool,
    pub show_deleted: bool,
}

impl FilterState {
    pub fn sort(&self) -> SortDirection {
        SortDirection::from_descending(self.sort_descending)
    }
}

pub fn build_product_query(filter: &FilterState) -> String {
    let base = if filter.show_deleted {
        DELETED_PRODUCTS_PATH
    } else {
        PRODUCTS_PATH
    };
    let mut params = Vec::with_capacity(2);
    if let Some(category) = filter.category.category() {
        params.push(format!("categoria={}", category.wire_value()));
    }
    params.push(format!("sort={SORT_FIELD},{}", filter.sort().as_str()));
    format!("{base}?{}", params.join("&"))
}

pub fn statistics_endpoint(category: CategoryFilter) -> String {
    match category.category() {
        Some(category) => format!("{STATISTICS_PATH}?categoria={}", category.wire_value()),
        None => STATISTICS_PATH.to_string(),
    }
}

pub fn product_endpoint(id: u64) -> String {
    format!("{PRODUCTS_PATH}/{id}")
}
