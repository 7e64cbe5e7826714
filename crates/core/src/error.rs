//! Error types for the ThreadClaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all ThreadClaw operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- LLM client errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable kind string, used when a failure is written into a ledger.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Provider(_) => "ProviderError",
            Error::Channel(_) => "ChannelError",
            Error::Tool(e) => e.kind(),
            Error::Config { .. } => "ConfigError",
            Error::Serialization(_) => "SerializationError",
            Error::Internal(_) => "InternalError",
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Operation not supported by {channel}: {operation}")]
    Unsupported { channel: String, operation: String },
}

/// Failures at the tool boundary.
///
/// `NotFound` is the only variant raised before a tool runs. Everything
/// else either comes from the tool itself or from the executor wrapping it.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Malformed arguments for {tool_name}: {reason}")]
    MalformedArguments { tool_name: String, reason: String },
}

impl ToolError {
    /// Stable kind string recorded in the execution ledger.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "ToolNotFoundError",
            ToolError::ExecutionFailed { .. } => "ToolExecutionError",
            ToolError::Timeout { .. } => "ToolTimeoutError",
            ToolError::InvalidArguments(_) => "InvalidArgumentsError",
            ToolError::MalformedArguments { .. } => "MalformedArgumentsError",
        }
    }

    /// Whether this is an execution failure (including the timeout subtype).
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            ToolError::ExecutionFailed { .. } | ToolError::Timeout { .. }
        )
    }
}
