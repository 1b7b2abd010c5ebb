//! Static file server with an AI proxy endpoint.
//!
//! Serves a single-page app from a web root and forwards `POST` requests on the
//! proxy path to the Gemini `generateContent` API.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod proxy;
pub mod server;
