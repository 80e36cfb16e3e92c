//! Purpose: Typed, blocking client for the product REST API.
//! Exports: `CatalogClient`.
//! Role: Thin convenience layer over `Transport` + the query builder for CLI and tests.
//! Invariants: Endpoints come only from `core::query`; no ad-hoc URL building here.
#![allow(clippy::result_large_err)]

use crate::api::fetch::unwrap_paged;
use crate::api::mutation::{Mutation, MutationRequest};
use crate::api::transport::{ApiRequest, ApiResult, Transport};
use crate::core::category::CategoryFilter;
use crate::core::error::{Error, ErrorKind};
use crate::core::product::{Page, Product, ProductDraft, Statistics};
use crate::core::query::{FilterState, build_product_query, product_endpoint, statistics_endpoint};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Clone)]
pub struct CatalogClient<T> {
    transport: T,
}

impl<T: Transport> CatalogClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn list_products(&self, filter: &FilterState) -> ApiResult<Vec<Product>> {
        let value = self.get(&build_product_query(filter))?;
        decode(unwrap_paged(value))
    }

    /// Same listing, keeping the pagination envelope.
    pub fn list_page(&self, filter: &FilterState) -> ApiResult<Page<Product>> {
        let value = self.get(&build_product_query(filter))?;
        decode(value)
    }

    pub fn statistics(&self, category: CategoryFilter) -> ApiResult<Statistics> {
        let value = self.get(&statistics_endpoint(category))?;
        decode(value)
    }

    pub fn product(&self, id: u64) -> ApiResult<Product> {
        let value = self.get(&product_endpoint(id))?;
        decode(value)
    }

    pub fn create(&self, draft: &ProductDraft) -> ApiResult<Product> {
        Mutation::new().mutate(&self.transport, &MutationRequest::create(draft)?)
    }

    pub fn update(&self, id: u64, draft: &ProductDraft) -> ApiResult<Product> {
        Mutation::new().mutate(&self.transport, &MutationRequest::update(id, draft)?)
    }

    /// Soft-delete; returns the server's acknowledgement text.
    pub fn delete(&self, id: u64) -> ApiResult<String> {
        let mut mutation: Mutation<Value> = Mutation::new();
        let value = mutation.mutate(&self.transport, &MutationRequest::delete(id))?;
        Ok(match value {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    fn get(&self, endpoint: &str) -> ApiResult<Value> {
        self.transport.send(&ApiRequest::get(endpoint))
    }
}

fn decode<R: DeserializeOwned>(value: Value) -> ApiResult<R> {
    serde_json::from_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("unexpected response shape")
            .with_source(err)
    })
}
