pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod masking;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod push;
pub mod validation;
