//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the plugin core and an
//! external system. Implementations live in `src/adapters/`.

pub mod http;

pub use http::HttpClient;
