//! Purpose: Public data-access surface over the product REST API.
//! Exports: Transport, read fetcher, mutation runner, typed client and catalog view model.
//! Role: Everything that talks to the network goes through `Transport`.
//! Invariants: Core domain types are re-exported; callers need not reach into `core`.

mod catalog;
mod client;
mod fetch;
mod mutation;
mod transport;

pub use crate::core::category::{Category, CategoryFilter};
pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use crate::core::product::{Page, Product, ProductDraft, Statistics};
pub use crate::core::query::FilterState;
pub use crate::core::validate::{FormField, ProductForm, ValidationIssue, ValidationReport};
pub use catalog::{CatalogView, ListStatus, Slot, SubmitError};
pub use client::CatalogClient;
pub use fetch::{Completion, FetchLoop, FetchTicket, Fetcher, unwrap_paged};
pub use mutation::{Mutation, MutationRequest};
pub use transport::{ApiRequest, ApiResult, HttpTransport, Method, Transport};
