pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod context;
pub mod prompt;
pub mod generate;
pub mod reply;
pub mod cache;
pub mod catalog;
pub mod service;

pub use config::Config;
pub use error::{AdvisorError, Result};
pub use service::{AdvisorService, UploadOutcome, UploadRequest};
