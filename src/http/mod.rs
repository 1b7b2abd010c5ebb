//! HTTP protocol layer module
//!
//! Content-type detection and response builders shared by the static file
//! resolver and the proxy forwarder.

pub mod mime;
pub mod response;

pub use response::{
    build_404_response, build_405_response, build_413_response, build_file_response,
    build_json_response, build_options_response, build_text_response,
};
