pub mod model;
pub mod store;

pub use model::{Conversation, Message, NewMessage, Sentiment};
pub use store::ConversationStore;
