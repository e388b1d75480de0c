pub mod backend;
pub mod citations;
pub mod config;
pub mod dispatcher;
pub mod models;
pub mod store;

pub use config::AppConfig;
pub use dispatcher::{QueryDispatcher, SkipReason, SubmitOutcome};
