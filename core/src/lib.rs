pub mod db;
pub mod error;
pub mod methods;
pub mod migration;
pub mod models;
pub mod remote;
pub mod repo;
pub mod rules;
pub mod service;
pub mod store;
pub mod sync;

pub use error::BrewError;
pub use methods::{Ratio, calculate_ratio};
pub use migration::migrate_brew_method;
pub use service::{BrewService, RecordOutcome, get_suggestion};
