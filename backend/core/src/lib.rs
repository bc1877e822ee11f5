pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use error::NudgeError;
pub use event::InboundMessage;
pub use traits::MessagingGateway;
pub use types::{GroupId, PairKey, UserId};
