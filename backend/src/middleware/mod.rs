//! HTTP middleware for the Warehouse Order Management Platform

mod context;

pub use context::{context_middleware, CallerContext, CurrentUser};
