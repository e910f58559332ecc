//! Error types for the lightsim library.

use thiserror::Error;

/// Main error type for scene compilation and rendering.
#[derive(Error, Debug)]
pub enum Error {
    /// No GPU adapter matched the requested options
    #[error("No compatible GPU adapter found")]
    NoAdapter,

    /// Adapter refused to create a device
    #[error("Failed to request GPU device: {0}")]
    RequestDevice(String),

    /// Surface creation, configuration or acquisition failed
    #[error("Surface error: {0}")]
    Surface(String),

    /// Scene id is not registered with the scene manager
    #[error("Unknown scene: {0}")]
    UnknownScene(String),

    /// Mesh referenced by name is not present in the resource manager
    #[error("Mesh not loaded: {0}")]
    MissingMesh(String),

    /// Loader could not produce the named mesh
    #[error("Failed to load mesh '{name}': {reason}")]
    MeshLoad { name: String, reason: String },

    /// Mesh geometry violates an invariant (index out of range, bad submesh)
    #[error("Invalid mesh data: {0}")]
    InvalidMesh(String),

    /// Scene descriptor entry is malformed
    #[error("Invalid descriptor entry '{id}': {reason}")]
    InvalidDescriptor { id: String, reason: String },

    /// Renderer was used before `initialize` succeeded
    #[error("Renderer is not initialized")]
    NotInitialized,

    /// GPU to CPU readback failed
    #[error("Readback failed: {0}")]
    Readback(String),

    /// Image encoding failed
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid mesh error.
    pub fn invalid_mesh(msg: impl Into<String>) -> Self {
        Self::InvalidMesh(msg.into())
    }

    /// Create a per-mesh load error.
    pub fn mesh_load(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MeshLoad {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid descriptor entry error.
    pub fn descriptor(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only affects a single asset and the caller may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownScene(_)
                | Self::MissingMesh(_)
                | Self::MeshLoad { .. }
                | Self::InvalidMesh(_)
                | Self::InvalidDescriptor { .. }
        )
    }
}

/// Result type alias for lightsim operations.
pub type Result<T> = std::result::Result<T, Error>;
