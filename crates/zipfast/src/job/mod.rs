pub mod model;
pub mod options;
pub mod store;

pub use model::{Job, JobOptions, JobStatus, MediaKind, NewJob};
pub use store::JobStore;
