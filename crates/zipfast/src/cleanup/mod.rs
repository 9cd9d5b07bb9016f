pub mod sweeper;

pub use sweeper::{RetentionSweeper, SweepReport, SweepScheduler};
