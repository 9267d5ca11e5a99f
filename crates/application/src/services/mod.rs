mod chat_service;

pub use chat_service::{
    ChatService, ChatServiceDependencies, ConversationSummary, ConversationView,
    CreateConversationOutcome, CreateConversationRequest, OpenConversationRequest,
    SendMessageRequest,
};
