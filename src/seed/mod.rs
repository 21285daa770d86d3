pub mod sample;

pub use sample::*;

use crate::store::{InstanceStore, StoreResult};

/// Populate `store` with a fresh sample graph.
pub fn populate(store: &InstanceStore, config: &SampleConfig) -> StoreResult<PopulateReport> {
    SampleGenerator::new(config.clone()).populate(store)
}
