//! HTTP surface read by the dashboard front end.

pub mod routes;

pub use routes::{AppState, router};
