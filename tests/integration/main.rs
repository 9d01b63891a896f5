//! End-to-end tests over the public crate API.
//!
//! `prediction_flow` drives raw records through normalization, prediction
//! and backtesting; `service_flow` exercises the persistent store, a model
//! artifact on disk and the HTTP router together.

mod prediction_flow;
mod service_flow;
