pub mod document;
pub mod error;
pub mod store;
pub mod threshold;

pub use document::QueueEntryDoc;
pub use error::QueueError;
pub use store::QueueStore;
pub use threshold::ThresholdCounter;
