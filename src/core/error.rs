//! Error types for cave generation

use thiserror::Error;

/// Main error type for the generation pipeline
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    /// Out-of-range or missing parameter, detected before any work starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Region bounds cannot be generated (non-finite or empty)
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// Noise backend failure (recovered locally, never surfaced to the caller)
    #[error("Noise evaluation failed: {0}")]
    NoiseEvaluation(#[from] NoiseError),

    /// A single feature instance could not compute its geometry
    #[error("Feature carve failed ({feature}): {reason}")]
    FeatureCarve { feature: &'static str, reason: String },

    /// Requested voxel grid exceeds the memory ceiling
    #[error("Buffer allocation failed: {requested} voxels exceeds ceiling of {ceiling}")]
    BufferAllocation { requested: u64, ceiling: u64 },

    /// The terrain sink rejected a write
    #[error("Terrain write failed: {0}")]
    TerrainWrite(#[from] TerrainWriteError),
}

impl GenerationError {
    /// Shorthand for a per-instance feature failure
    pub fn feature(feature: &'static str, reason: impl Into<String>) -> Self {
        Self::FeatureCarve { feature, reason: reason.into() }
    }

    /// Whether this error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidRegion(_) | Self::BufferAllocation { .. }
        )
    }
}

/// Failure inside the primary noise backend
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NoiseError {
    #[error("non-finite input coordinate")]
    NonFiniteInput,

    #[error("coordinate magnitude {0} exceeds the safe sampling range")]
    OutOfRange(f64),

    #[error("backend produced a non-finite value")]
    NonFiniteOutput,
}

/// Failure reported by an external terrain sink
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TerrainWriteError {
    #[error("sink rejected chunk {0}: {1}")]
    Rejected(String, String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TerrainWriteError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(GenerationError::Configuration("x".into()).is_fatal());
        assert!(GenerationError::InvalidRegion("x".into()).is_fatal());
        assert!(GenerationError::BufferAllocation { requested: 10, ceiling: 5 }.is_fatal());
        assert!(!GenerationError::feature("vein", "degenerate").is_fatal());
        assert!(!GenerationError::from(NoiseError::NonFiniteOutput).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = GenerationError::feature("vein", "zero length");
        assert_eq!(err.to_string(), "Feature carve failed (vein): zero length");

        let err = GenerationError::BufferAllocation { requested: 10, ceiling: 5 };
        assert!(err.to_string().contains("10 voxels"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: GenerationError = TerrainWriteError::from(io).into();
        assert!(matches!(err, GenerationError::TerrainWrite(TerrainWriteError::Io(_))));
    }
}
