pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::{Result, SiltError};
pub use types::{FrameId, PageId, RecordId, SlotId, Timestamp};
