pub mod error;
pub mod merge;
pub mod model;
pub mod scoring;
pub mod stats;
pub mod study;
pub mod time;

pub use error::Error;
pub use time::Clock;
