//! Request handler module
//!
//! Responsible for request routing dispatch: static files from the web root,
//! and prompt requests handed to the proxy forwarder.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
