pub mod classifier;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod scorer;
pub mod sheets;
pub mod store;
pub mod writer;
pub mod youtube;
