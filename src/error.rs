use thiserror::Error;

/// Every failure is terminal for the run; the category names the failed stage.
#[derive(Debug, Error)]
pub enum DbpushError {
    #[error("config: {message}")]
    Config { message: String },

    #[error("connection: {message}")]
    Connection { message: String },

    #[error("query: {message}")]
    Query { message: String },

    #[error("push: {message}")]
    Push { message: String },
}
