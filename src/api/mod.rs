pub mod handlers;
pub mod instance_extractor;
pub mod middleware;
pub mod resource_handlers;
pub mod routes;
pub mod workflow_handlers;

pub use handlers::*;
pub use instance_extractor::{InstanceScope, INSTANCE_HEADER};
pub use routes::*;
