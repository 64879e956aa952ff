//! Farm inventory library
//!
//! Unit-aware inventory consumption and reconciliation for field activities:
//! unit conversion into per-material base units, stock decrements and
//! reverts with tool depreciation cycles, assignment costing, and
//! reconciliation of returned materials into real consumption. Batch
//! operations run inside a single database transaction.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod migrator;
pub mod services;

pub use errors::ServiceError;
pub use services::{
    activity_materials::ActivityMaterialService, materials::MaterialService,
};
