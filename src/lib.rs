//! Async client for the Portico groupware HTTP API.
//!
//! The backend encodes rows as positional arrays keyed by numeric column
//! IDs. This crate maps those back to named fields ([`http::columns`]),
//! builds verb-appropriate requests ([`http::request`]), unwraps single and
//! batched response envelopes ([`http::response`]), and funnels everything
//! through a [`http::Gateway`] that de-duplicates concurrent identical GETs
//! and can pause mutating traffic into a single batch flush.

pub mod config;
pub mod http;

pub use config::ApiConfig;
pub use http::{ApiData, ApiError, Gateway, Module, RequestDescriptor, Verb};
