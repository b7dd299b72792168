use thiserror::Error;

/// Structured error types for the virtual try-on pipeline.
///
/// # Why structured errors
///
/// Each variant captures context specific to its error domain (image decoding,
/// model inference, pixel processing, pipeline orchestration), providing
/// detailed diagnostic information without requiring callers to parse error
/// strings. The thiserror crate generates Display implementations
/// automatically from format strings, reducing boilerplate while maintaining
/// type safety.
#[derive(Error, Debug)]
pub enum TryOnError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Image decode error: failed to decode {input} image")]
    ImageDecode {
        input: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Image processing error: {operation} failed")]
    ImageProcessing {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Try-on pipeline error: {stage} failed")]
    Pipeline {
        stage: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, TryOnError>;

impl TryOnError {
    /// Wrap any stage failure into the single aggregated pipeline error
    /// surfaced to callers of `TryOnProcessor::process`.
    ///
    /// # Why one aggregated variant
    ///
    /// The pipeline contract is "one complete result or one explicit failure".
    /// Callers see which stage failed plus the original cause, and never have
    /// to distinguish between the many internal error shapes to decide what
    /// to report.
    pub fn pipeline(stage: &str, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Pipeline {
            stage: stage.to_string(),
            source: Box::new(source),
        }
    }
}

/// Convert anyhow errors to configuration errors.
///
/// # Why this conversion exists
///
/// Some dependencies return anyhow::Error which lacks structured error
/// information. Rather than propagating the generic error type throughout the
/// codebase, we convert to our domain-specific error type at boundaries.
impl From<anyhow::Error> for TryOnError {
    fn from(err: anyhow::Error) -> Self {
        TryOnError::Configuration {
            message: err.to_string(),
        }
    }
}

/// Convert image crate errors to image processing errors.
///
/// # Why default operation context
///
/// Code that knows which input it was decoding should construct
/// TryOnError::ImageDecode directly; this fallback covers resize/save paths
/// where only the operation kind matters.
impl From<image::ImageError> for TryOnError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert ONNX Runtime errors to model errors.
impl From<ort::Error> for TryOnError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert ndarray shape errors to model errors.
///
/// # Why model error category
///
/// Shape errors occur during tensor operations which are part of model
/// inference, so they're categorized as model errors rather than a separate
/// tensor error type. This keeps the error hierarchy flat and focused on
/// user-facing error domains.
impl From<ndarray::ShapeError> for TryOnError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}
