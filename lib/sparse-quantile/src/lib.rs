//! A sparse, mergeable quantile sketch with relative-error logarithmic bucketing.
//!
//! This crate provides the computational core of a metrics pipeline's distribution summaries: a
//! [`Sketch`] ingests a stream of numeric observations and answers approximate rank/quantile
//! queries (p50, p99, and so on) in bounded memory. Observations are mapped to logarithmic
//! buckets whose boundaries grow by a multiplicative factor (gamma), which bounds the relative
//! error of every reported quantile.
//!
//! Partial sketches computed on different shards or time windows can be merged without
//! re-scanning raw data, and bulk insertion reuses pooled key buffers so steady-state ingestion
//! stays allocation-cheap.
#![deny(warnings)]
#![deny(missing_docs)]

mod common;

mod params;
pub use self::params::*;

mod pool;

mod sketch;
pub use self::sketch::Sketch;

mod store;
pub use self::store::Bin;

mod summary;
pub use self::summary::Summary;
