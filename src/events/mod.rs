mod bus;
mod handlers;
mod types;

pub use bus::{EventBus, EventReceiver, DEFAULT_EVENT_CAPACITY};
pub use handlers::LoggingEventHandler;
pub use types::{EventSequence, TransferDirection, TransferEvent, TransferEventPayload};
