pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod task;
pub mod throttle;
pub mod transcript;

// Re-export main types for convenience
pub use client::{CompletionClient, LastExchange};
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, DispatchError, SetupError};
pub use session::ChatSession;
pub use task::TaskKey;
pub use throttle::Throttle;
pub use transcript::{Message, Role, Transcript};
