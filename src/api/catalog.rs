//! Purpose: Catalog screen state: filter selection, product list, statistics and writes.
//! Exports: `CatalogView`, `Slot`, `ListStatus`, `SubmitError`.
//! Role: Composes the query builder, two fetchers and the mutation runner on one thread.
//! Invariants: Filter changes refetch only the endpoints whose value changed.
//! Invariants: List and statistics fetches are independent; one failing never blocks the other.
//! Invariants: Successful writes trigger a full reload; local state is never patched.
#![allow(clippy::result_large_err)]

use crate::api::fetch::{FetchLoop, FetchTicket, Fetcher};
use crate::api::mutation::{Mutation, MutationRequest};
use crate::api::transport::{ApiResult, Transport};
use crate::core::category::CategoryFilter;
use crate::core::error::Error;
use crate::core::product::{Product, Statistics};
use crate::core::query::{FilterState, build_product_query, statistics_endpoint};
use crate::core::validate::{ProductForm, ValidationReport};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Slot {
    List,
    Statistics,
}

#[derive(Debug, PartialEq)]
pub enum ListStatus<'a> {
    Loading,
    Failed(&'a str),
    Empty,
    Ready(&'a [Product]),
}

#[derive(Debug)]
pub enum SubmitError {
    /// The form never left the client.
    Invalid(ValidationReport),
    Request(Error),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Invalid(report) => {
                let fields = report
                    .issues
                    .iter()
                    .map(|issue| format!("{}: {}", issue.field, issue.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "invalid form ({fields})")
            }
            SubmitError::Request(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Invalid(_) => None,
            SubmitError::Request(err) => Some(err),
        }
    }
}

impl From<SubmitError> for Error {
    fn from(value: SubmitError) -> Self {
        match value {
            SubmitError::Invalid(report) => report.into_error(),
            SubmitError::Request(err) => err,
        }
    }
}

pub struct CatalogView {
    filter: FilterState,
    products: Fetcher<Vec<Product>>,
    statistics: Fetcher<Statistics>,
    fetch_loop: FetchLoop<Slot>,
    writes: Mutation<Product>,
    deletes: Mutation<Value>,
    reloads: u64,
}

impl CatalogView {
    /// Build the view and start the initial fetches for `filter`.
    pub fn open(transport: Arc<dyn Transport>, filter: FilterState) -> Self {
        let mut view = Self {
            filter,
            products: Fetcher::new(),
            statistics: Fetcher::new(),
            fetch_loop: FetchLoop::new(transport),
            writes: Mutation::new(),
            deletes: Mutation::new(),
            reloads: 0,
        };
        view.sync();
        view
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn products(&self) -> &Fetcher<Vec<Product>> {
        &self.products
    }

    pub fn statistics(&self) -> &Fetcher<Statistics> {
        &self.statistics
    }

    pub fn writes(&self) -> &Mutation<Product> {
        &self.writes
    }

    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    pub fn in_flight(&self) -> usize {
        self.fetch_loop.in_flight()
    }

    pub fn select_category(&mut self, category: CategoryFilter) {
        self.filter.category = category;
        self.sync();
    }

    pub fn toggle_sort(&mut self) {
        self.filter.sort_descending = !self.filter.sort_descending;
        self.sync();
    }

    pub fn toggle_deleted(&mut self) {
        self.filter.show_deleted = !self.filter.show_deleted;
        self.sync();
    }

    fn sync(&mut self) {
        let list_endpoint = build_product_query(&self.filter);
        if let Some(ticket) = self.products.set_endpoint(&list_endpoint) {
            self.dispatch(Slot::List, ticket);
        }
        let stats_endpoint = statistics_endpoint(self.filter.category);
        if let Some(ticket) = self.statistics.set_endpoint(&stats_endpoint) {
            self.dispatch(Slot::Statistics, ticket);
        }
    }

    /// Discard everything on screen and fetch both endpoints again.
    pub fn reload(&mut self) {
        self.reloads += 1;
        tracing::debug!(reloads = self.reloads, "reloading catalog");
        if let Some(ticket) = self.products.refresh() {
            self.dispatch(Slot::List, ticket);
        }
        if let Some(ticket) = self.statistics.refresh() {
            self.dispatch(Slot::Statistics, ticket);
        }
    }

    fn dispatch(&mut self, slot: Slot, ticket: FetchTicket) {
        self.fetch_loop.dispatch(slot, ticket);
    }

    /// Apply completions that already arrived; returns how many were committed.
    pub fn pump(&mut self) -> usize {
        let mut committed = 0;
        while let Some(done) = self.fetch_loop.poll() {
            if self.apply(done.key, &done.ticket, done.result) {
                committed += 1;
            }
        }
        committed
    }

    /// Block until every dispatched request has finished.
    pub fn settle(&mut self) -> usize {
        let mut committed = 0;
        while let Some(done) = self.fetch_loop.wait() {
            if self.apply(done.key, &done.ticket, done.result) {
                committed += 1;
            }
        }
        committed
    }

    fn apply(&mut self, slot: Slot, ticket: &FetchTicket, result: ApiResult<Value>) -> bool {
        match slot {
            Slot::List => self.products.complete(ticket, result),
            Slot::Statistics => self.statistics.complete(ticket, result),
        }
    }

    pub fn status(&self) -> ListStatus<'_> {
        if self.products.loading() {
            return ListStatus::Loading;
        }
        if let Some(error) = self.products.error() {
            return ListStatus::Failed(error);
        }
        let items = self.products.data();
        if items.is_empty() {
            ListStatus::Empty
        } else {
            ListStatus::Ready(items)
        }
    }

    /// Validate and send the form; `editing` selects update over create.
    pub fn submit(
        &mut self,
        form: &ProductForm,
        editing: Option<&Product>,
    ) -> Result<Product, SubmitError> {
        let draft = form.validate().map_err(SubmitError::Invalid)?;
        let request = match editing {
            Some(product) => MutationRequest::update(product.id, &draft),
            None => MutationRequest::create(&draft),
        }
        .map_err(SubmitError::Request)?;
        let transport = Arc::clone(self.fetch_loop.transport());
        let saved = self
            .writes
            .mutate(transport.as_ref(), &request)
            .map_err(SubmitError::Request)?;
        self.reload();
        Ok(saved)
    }

    /// Soft-delete a product, then reload.
    pub fn remove(&mut self, id: u64) -> ApiResult<String> {
        let transport = Arc::clone(self.fetch_loop.transport());
        let ack = self
            .deletes
            .mutate(transport.as_ref(), &MutationRequest::delete(id))?;
        self.reload();
        Ok(match ack {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }
}
