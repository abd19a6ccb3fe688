pub mod ai;
pub mod commands;
pub mod conversation;
pub mod prompt;
pub mod records;
pub mod reminder;
pub mod routing;
pub mod store;
pub mod webhook;
pub mod whatsapp;

pub use ai::AiService;
pub use conversation::ConversationService;
pub use records::ConversationRecordService;
pub use reminder::ReminderService;
pub use routing::RoutingService;
pub use store::{
    build_store, ConversationStore, DatabaseConversationStore, InMemoryConversationStore,
    RedisConversationStore,
};
pub use webhook::WebhookProcessor;
pub use whatsapp::WhatsAppService;
