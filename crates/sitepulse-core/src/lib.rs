//! # SitePulse Core
//! Shared configuration, error type, data model and collaborator traits.
//!
//! Every other crate in the workspace depends on this one; it depends on
//! nothing internal.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod validate;

pub use config::SitePulseConfig;
pub use error::{Result, SitePulseError};
pub use traits::{Advisor, PageFetcher, Transport};
