pub mod api;
pub mod config;
pub mod errors;
pub mod flex_text;
pub mod pipeline;
pub mod report;
pub mod setup;
pub mod snapshot;
pub mod targets;
pub mod verifier;
