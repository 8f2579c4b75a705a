pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{pair_key, Conversation, ConversationSummary, LastMessage, Participant};
pub use message::{next_timestamp, Message, MessageView, ReadReceipt, SenderView};
pub use user::{BlockedUser, Profile, ProfileUpdate, PublicUser, User};
