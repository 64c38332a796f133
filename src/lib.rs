//! `geocore`: an in-memory spatial data service backed by a concurrent
//! R-tree index and a CSV snapshot reconciled on a fixed interval.

pub mod config;
pub mod coord;
pub mod core;
pub mod csv_io;
pub mod error;
pub mod generator;
pub mod http;
pub mod index;
pub mod logging;
pub mod model;
pub mod query;
pub mod reconciler;
pub mod staging;
pub mod workerpool;

pub use core::GeoCore;
pub use error::{GeoError, GeoResult};
