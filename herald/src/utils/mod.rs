//! Small shared utilities.

pub mod http_client;

pub use http_client::install_rustls_provider;
