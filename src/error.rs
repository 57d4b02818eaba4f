pub type ShotblastResult<T> = Result<T, ShotblastError>;

/// Classifies encoder-process failures so callers can distinguish a missing
/// binary from a bad encode without parsing messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeErrorKind {
    MissingEncoder,
    EncodeFailed,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEncoder => f.write_str("missing-encoder"),
            Self::EncodeFailed => f.write_str("encode-failed"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ShotblastError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("preset '{name}' not found in {category} presets")]
    PresetNotFound { category: &'static str, name: String },

    #[error("capture error for camera '{camera}' at frame {frame}: {message}")]
    Capture {
        camera: String,
        frame: i64,
        message: String,
    },

    #[error("encode error ({kind}): {message}")]
    Encode {
        kind: EncodeErrorKind,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShotblastError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn preset_not_found(category: &'static str, name: impl Into<String>) -> Self {
        Self::PresetNotFound {
            category,
            name: name.into(),
        }
    }

    pub fn capture(camera: impl Into<String>, frame: i64, message: impl Into<String>) -> Self {
        Self::Capture {
            camera: camera.into(),
            frame,
            message: message.into(),
        }
    }

    pub fn missing_encoder(message: impl Into<String>) -> Self {
        Self::Encode {
            kind: EncodeErrorKind::MissingEncoder,
            message: message.into(),
        }
    }

    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self::Encode {
            kind: EncodeErrorKind::EncodeFailed,
            message: message.into(),
        }
    }
}
