//! Domain models for the Warehouse Order Management Platform

mod lot;
mod order;
mod preparation;
mod review;

pub use lot::*;
pub use order::*;
pub use preparation::*;
pub use review::*;
