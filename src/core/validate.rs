//! Purpose: Validate the product form before anything is sent to the backend.
//! Exports: `ProductForm`, `FormField`, `ValidationIssue`, `ValidationReport`.
//! Role: Declarative field rules; a valid form converts into a `ProductDraft`.
//! Invariants: Every failing field is reported, not just the first one.
//! Invariants: Price leaves this module as integer minor units.
use crate::core::category::Category;
use crate::core::error::{Error, ErrorKind};
use crate::core::money::{format_price, parse_price};
use crate::core::product::{Product, ProductDraft};
use std::fmt;

pub const NAME_MIN_CHARS: usize = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FormField {
    Name,
    Price,
    Category,
}

impl FormField {
    pub fn as_str(self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::Price => "price",
            FormField::Category => "category",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationIssue {
    pub field: FormField,
    pub code: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issue_for(&self, field: FormField) -> Option<&ValidationIssue> {
        self.issues.iter().find(|issue| issue.field == field)
    }

    fn push(&mut self, field: FormField, code: &'static str, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            field,
            code,
            message: message.into(),
        });
    }

    /// Collapse into an `Error` for callers that only propagate.
    pub fn into_error(self) -> Error {
        let mut err = Error::new(ErrorKind::Validation);
        if let Some(first) = self.issues.first() {
            err = err
                .with_message(first.message.clone())
                .with_field(first.field.as_str());
        }
        if self.issues.len() > 1 {
            let rest = self.issues[1..]
                .iter()
                .map(|issue| format!("{}: {}", issue.field, issue.message))
                .collect::<Vec<_>>()
                .join("; ");
            err = err.with_hint(format!("Also fix {rest}."));
        }
        err
    }
}

/// Raw form values exactly as typed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProductForm {
    pub name: String,
    pub price: String,
    pub category: String,
}

impl ProductForm {
    /// Edit form pre-filled from an existing record.
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: format_price(product.price_minor),
            category: product.category.wire_value().to_string(),
        }
    }

    pub fn validate(&self) -> Result<ProductDraft, ValidationReport> {
        let mut report = ValidationReport::default();

        let name = self.name.trim();
        if name.is_empty() {
            report.push(FormField::Name, "required", "name is required");
        } else if name.chars().count() < NAME_MIN_CHARS {
            report.push(
                FormField::Name,
                "min_length",
                format!("name must be at least {NAME_MIN_CHARS} characters"),
            );
        }

        let price = if self.price.trim().is_empty() {
            report.push(FormField::Price, "required", "price is required");
            None
        } else {
            match parse_price(&self.price) {
                Ok(minor) if minor > 0 => Some(minor),
                Ok(_) => {
                    report.push(FormField::Price, "positive", "price must be greater than 0");
                    None
                }
                Err(err) => {
                    let message = err.message().unwrap_or("invalid price").to_string();
                    report.push(FormField::Price, "invalid", message);
                    None
                }
            }
        };

        let category = if self.category.trim().is_empty() {
            report.push(FormField::Category, "required", "category is required");
            None
        } else {
            let found = Category::lookup(&self.category);
            if found.is_none() {
                report.push(
                    FormField::Category,
                    "unknown",
                    format!("unknown category: {}", self.category.trim()),
                );
            }
            found
        };

        match (price, category) {
            (Some(price_minor), Some(category)) if report.is_ok() => Ok(ProductDraft {
                name: name.to_string(),
                price_minor,
                category,
            }),
            _ => Err(report),
        }
    }
}
