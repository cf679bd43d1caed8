//! Business logic services for the Warehouse Order Management Platform

pub mod lot;
pub mod order;
pub mod preparation;
pub mod reservation;
pub mod review;
pub mod stock;

pub use lot::LotService;
pub use order::OrderService;
pub use preparation::PreparationService;
pub use review::ReviewService;
