//! HTTP handlers for the Warehouse Order Management Platform

mod health;
mod lot;
mod order;
mod preparation;
mod review;

pub use health::*;
pub use lot::*;
pub use order::*;
pub use preparation::*;
pub use review::*;
