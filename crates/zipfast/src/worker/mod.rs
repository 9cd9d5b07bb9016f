pub mod dispatcher;
pub mod pool;
pub mod processor;

pub use dispatcher::{Dispatcher, TickReport};
pub use pool::WorkerPool;
pub use processor::{JobProcessor, ProcessOutcome};
