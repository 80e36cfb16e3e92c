//! Purpose: Write side of the data layer: explicit create/update/delete invocations.
//! Exports: `Mutation`, `MutationRequest`.
//! Role: Tracks `{data, loading, error}` of the most recent write; never auto-triggers.
//! Invariants: One request per invocation; no retry.
//! Invariants: Callers reload their read state after a success instead of patching it.
#![allow(clippy::result_large_err)]

use crate::api::fetch::error_text;
use crate::api::transport::{ApiRequest, ApiResult, Method, Transport};
use crate::core::error::{Error, ErrorKind};
use crate::core::product::ProductDraft;
use crate::core::query::{PRODUCTS_PATH, product_endpoint};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct MutationRequest {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
}

impl MutationRequest {
    pub fn create(draft: &ProductDraft) -> ApiResult<Self> {
        Ok(Self {
            method: Method::Post,
            endpoint: PRODUCTS_PATH.to_string(),
            body: Some(encode_draft(draft)?),
        })
    }

    pub fn update(id: u64, draft: &ProductDraft) -> ApiResult<Self> {
        Ok(Self {
            method: Method::Put,
            endpoint: product_endpoint(id),
            body: Some(encode_draft(draft)?),
        })
    }

    pub fn delete(id: u64) -> Self {
        Self {
            method: Method::Delete,
            endpoint: product_endpoint(id),
            body: None,
        }
    }

    pub fn to_api_request(&self) -> ApiRequest {
        ApiRequest {
            method: self.method,
            endpoint: self.endpoint.clone(),
            body: self.body.clone(),
        }
    }
}

fn encode_draft(draft: &ProductDraft) -> ApiResult<Value> {
    serde_json::to_value(draft).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode product")
            .with_source(err)
    })
}

#[derive(Debug)]
pub struct Mutation<R> {
    data: Option<R>,
    loading: bool,
    error: Option<String>,
}

impl<R> Default for Mutation<R> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

impl<R: DeserializeOwned + Clone> Mutation<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> Option<&R> {
        self.data.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn mutate(&mut self, transport: &dyn Transport, request: &MutationRequest) -> ApiResult<R> {
        self.data = None;
        self.error = None;
        self.loading = true;
        tracing::debug!(method = %request.method, endpoint = %request.endpoint, "mutation started");

        let result = transport
            .send(&request.to_api_request())
            .and_then(|value| {
                serde_json::from_value::<R>(value).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("unexpected response shape")
                        .with_source(err)
                })
            });

        self.loading = false;
        match result {
            Ok(data) => {
                tracing::info!(method = %request.method, endpoint = %request.endpoint, "mutation succeeded");
                self.data = Some(data.clone());
                Ok(data)
            }
            Err(err) => {
                tracing::warn!(method = %request.method, endpoint = %request.endpoint, error = %err, "mutation failed");
                self.error = Some(error_text(&err));
                Err(err)
            }
        }
    }
}
