//! Client for the Libris book cataloging service.
//!
//! [`api::LibrisApi`] is the entry point: one method per backend operation,
//! all funnelled through [`http::HttpClient`], which attaches the session token
//! from an injected [`session::SessionStore`].

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod model;
pub mod ownership;
pub mod session;

pub use api::LibrisApi;
pub use error::{ApiError, ApiResult, SessionError};
pub use session::{MemorySessionStore, Session, SessionStore};
