mod nl_parser;
mod transport;

pub use nl_parser::{
    ChatApi,
    IChatApi,
    INlParser,
    LlmParser,
    MaterializedReminder,
    ParseMessage,
    ParseOutcome,
};
pub use transport::{DeliveryError, INotificationTransport, LogTransport, WebhookTransport};
