//! Async TCP client for a correlation-addressed event log store.
//!
//! The client speaks a length-prefixed binary protocol: every frame carries
//! a command code, flags, and a 16-byte correlation identifier pairing it
//! with the operation that requested it. On top of that sit range reads,
//! writes, deletes, live subscriptions, and catch-up subscriptions that
//! replay a stream's history before handing off to live push delivery.
//!
//! ```no_run
//! use eventwire::{Connection, ExpectedVersion, ProposedEvent};
//!
//! # #[tokio::main]
//! # async fn main() -> eventwire::Result<()> {
//! let connection = Connection::builder().host("127.0.0.1").connect().await?;
//! let completed = connection
//!     .write_events(
//!         "inventory-1",
//!         ExpectedVersion::Any,
//!         false,
//!         vec![ProposedEvent::json(
//!             "stock-adjusted",
//!             serde_json::json!({"delta": -2}),
//!         )],
//!         None,
//!     )
//!     .await?;
//! println!("write result: {:?}", completed.result);
//! # Ok(())
//! # }
//! ```

pub mod catchup;
pub mod codec;
pub mod command;
pub mod connection;
pub mod correlation;
pub mod credentials;
pub mod error;
pub mod event;
pub mod frame;
pub mod messages;
pub mod results;

pub use catchup::{
    CatchUpConfigError, CatchUpDelegate, CatchUpSettings, CatchUpSubscription, DropReason,
    HandlerError,
};
pub use command::Command;
pub use connection::{
    AllSlice, Connection, ConnectionBuilder, StreamSlice, Subscription, SubscriptionNotification,
};
pub use correlation::CorrelationId;
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use event::{EventData, EventId, ProposedEvent, RecordedEvent, ResolvedEvent};
pub use frame::{Frame, FrameAssembler, FrameError};
pub use results::{
    ExpectedVersion, OperationResult, ReadAllResult, ReadStreamResult, SubscriptionDropReason,
};
