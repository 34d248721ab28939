//! adaptest-core: IRT response model, ability estimation and adaptive sessions.
//!
//! This crate holds the numeric kernel (three-parameter logistic model and a
//! Newton maximum-likelihood estimator), the domain types built around it,
//! the data-access traits that storage backends implement, and the adaptive
//! session service, simulation and reporting on top.

pub mod config;
pub mod error;
pub mod estimator;
pub mod irt;
pub mod model;
pub mod parser;
pub mod report;
pub mod session;
pub mod simulation;
pub mod statistics;
pub mod traits;
