//! HTTP surface of leadgen-gw
//!
//! `/health` is served directly; everything under `/api/` goes through the
//! [`Dispatcher`](crate::router::Dispatcher).

pub mod dispatch;
pub mod health;

pub use dispatch::api_fallback;
pub use health::health_routes;
