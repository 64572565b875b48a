//! Process bootstrap for the REST-to-gRPC gateway binary: layered
//! configuration, the backend gRPC channel, logging, and the wiring that
//! turns a loaded [`config::AppConfig`] into a running [`app::App`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod app;
pub mod channel;
pub mod config;
pub mod error;
pub mod logging;

pub use app::App;
pub use config::AppConfig;
pub use error::BootstrapError;
