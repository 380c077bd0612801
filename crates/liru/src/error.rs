//! Error types returned by senders and receivers.

/// Result type alias for liru operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything a [`Sender`](crate::Sender) or [`Receiver`](crate::Receiver)
/// can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller passed a structurally invalid value. Raised before any
    /// backend call is made.
    #[error("Invalid argument: {parameter} - {message}")]
    InvalidArgument {
        parameter: &'static str,
        message: String,
    },

    /// A mutating call reached a sender after `release()`.
    #[error("Sender '{name}' has already been released")]
    AlreadyReleased { name: String },

    /// Pulling a frame from a sender failed. The receiver stays usable.
    #[error("Receive error: {operation} on '{sender}' failed: {source:#}")]
    Receive {
        sender: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Publishing failed. The sender that returned it should be released.
    #[error("Registration error: {operation} on '{sender}' failed: {source:#}")]
    Registration {
        sender: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    pub(crate) fn invalid(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter,
            message: message.into(),
        }
    }

    pub(crate) fn receive(
        sender: impl Into<String>,
        operation: &'static str,
        source: anyhow::Error,
    ) -> Self {
        Self::Receive {
            sender: sender.into(),
            operation,
            source,
        }
    }

    pub(crate) fn registration(
        sender: impl Into<String>,
        operation: &'static str,
        source: anyhow::Error,
    ) -> Self {
        Self::Registration {
            sender: sender.into(),
            operation,
            source,
        }
    }

    /// Whether the same call may succeed if retried later (or, for invalid
    /// arguments, with corrected input) on the same object.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. } | Self::Receive { .. })
    }
}

/// Reject names that cannot be published.
pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("name", "Sender name cannot be empty"));
    }
    if name.len() > gpu_interop::MAX_NAME_LEN {
        return Err(Error::invalid(
            "name",
            format!(
                "Sender name is {} bytes, at most {} are allowed",
                name.len(),
                gpu_interop::MAX_NAME_LEN
            ),
        ));
    }
    if name.contains('\0') {
        return Err(Error::invalid("name", "Sender name cannot contain NUL"));
    }
    Ok(())
}

pub(crate) fn check_texture(texture: gl::types::GLuint) -> Result<()> {
    if texture == 0 {
        return Err(Error::invalid("texture", "Invalid texture ID: 0"));
    }
    Ok(())
}
