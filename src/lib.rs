//! Purpose: Library crate shared by the `prodcat` CLI, the reference server and tests.
//! Exports: `core` (categories, prices, products, query building, form rules, errors), `api`.
//! Role: `core` is pure and I/O-free; `api` owns every network round-trip.
//! Invariants: Endpoint strings are built only by `core::query`.
pub mod api;
pub mod core;
