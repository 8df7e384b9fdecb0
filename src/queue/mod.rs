//! Queue Adapter (spec §4.1): a durable FIFO with visibility-timeout
//! semantics, backed by Fjall — the same embedded LSM store used
//! elsewhere in this codebase, restructured around pop/ack/nack instead
//! of fire-and-forget dispatch.

mod envelope;
mod error;
mod store;

pub use envelope::{Envelope, PayloadRef};
pub use error::{QueueError, Result};
pub use store::{FjallQueue, QueueAdapter};
