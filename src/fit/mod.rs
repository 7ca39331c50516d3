//! FIT adapter: binary codec, typed messages, reader and writer.

pub mod codec;
pub mod messages;
pub mod profile;
pub mod reader;
pub mod writer;

pub use messages::FitMessages;
pub use reader::{messages_to_krd, FitReader};
pub use writer::{create_fit_messages, encode, FitWriter};
