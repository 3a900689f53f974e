//! Run results returned to the host

use serde::{Deserialize, Serialize};

use crate::connectivity::AnalysisReport;
use crate::features::FeatureCounts;
use crate::voxel::ChunkCoord;

/// Figures written once at the end of a run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub seed: u32,
    pub elapsed_secs: f64,
    /// Voxel operations spent across all stages
    pub voxels_processed: u64,
    /// Region grid plus one chunk payload, in bytes
    pub memory_estimate_bytes: u64,
    pub open_voxels: u64,
    pub total_voxels: u64,
    pub chunks: usize,
    /// Samples served by the fallback noise backend
    pub noise_fallbacks: u64,
}

/// A chunk that did not reach the sink as generated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub coord: ChunkCoord,
    pub error: String,
    /// The uniform rock fallback was written in its place
    pub fallback_filled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// No run-level error and every chunk written as generated
    pub success: bool,
    pub error: Option<String>,
    pub counts: FeatureCounts,
    pub metadata: GenerationMetadata,
    pub analysis: Option<AnalysisReport>,
    pub failed_chunks: Vec<ChunkFailure>,
    pub timed_out: bool,
    /// Times the run handed control back to the host
    pub suspensions: u64,
}

impl GenerationReport {
    /// Report for a run that aborted before any work
    pub fn aborted(seed: u32, error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            metadata: GenerationMetadata { seed, ..Default::default() },
            ..Default::default()
        }
    }
}
