//! Remote text-generation backends.

mod chat;

pub use chat::ChatCompletionBackend;
