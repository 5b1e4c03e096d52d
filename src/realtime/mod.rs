mod broadcaster;
mod connection;
pub mod messages;

pub use broadcaster::{item_room, BroadcastTarget, Broadcaster};
pub use connection::{is_valid_room, ConnectionManager, SendError};
pub use messages::{msg_types, ClientMessage, ServerMessage};
