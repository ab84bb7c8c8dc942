pub mod error;
pub mod message;
pub mod route;
pub mod types;

pub use error::BotScriptError;
pub use message::*;
pub use route::*;
pub use types::*;
