pub mod error;
pub mod instance;
pub mod keys;
pub mod query;
pub mod registry;
pub mod resources;
pub mod workflow;

pub use error::*;
pub use instance::{DeleteOutcome, EntityCounts, InstanceStore, InstanceSummary, Record};
pub use query::{ListQuery, Page, PageLimits};
pub use registry::InstanceRegistry;
