/// Convenience result type used across hexflip.
pub type HexflipResult<T> = Result<T, HexflipError>;

/// Top-level error taxonomy used by library APIs.
///
/// Structural problems inside a graph (dangling references, undecodable assets) are absorbed by
/// the consuming algorithm and never surface here. Only caller-visible failures do.
#[derive(thiserror::Error, Debug)]
pub enum HexflipError {
    /// Invalid caller-provided data (bad IDs, empty plans, out-of-range sizes).
    #[error("validation error: {0}")]
    Validation(String),

    /// A manifest could not be parsed or had the wrong shape.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Embedded asset data could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HexflipError {
    /// Build a [`HexflipError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`HexflipError::Manifest`] value.
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }

    /// Build a [`HexflipError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`HexflipError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
