pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod handlers;
pub mod outcome;
pub mod output;
pub mod poll;
pub mod proxy;
pub mod retry;
pub mod runner;
pub mod session;
pub mod timeouts;
pub mod transfer;
pub mod utils;
pub mod workflow;

pub use config::{Config, SiteConfig, TimingConfig};
pub use error::{FailureKind, PilotError};
pub use outcome::Outcome;

pub type Result<T> = std::result::Result<T, PilotError>;
