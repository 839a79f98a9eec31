//! Research output: datasets from converged runs, paper drafts, journals.
//!
//! A completed solver run yields one [`Dataset`]. Three datasets are bound
//! into a [`DraftPaper`] whose score is the sum of their qualities, and the
//! draft is submitted to a [`Journal`] whose difficulty sets the reviewer's
//! resolve in the review battle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sampler::Sampler;

/// Worst quality a converged run can produce.
pub const DATASET_QUALITY_MIN: u32 = 60;
/// Best quality a converged run can produce.
pub const DATASET_QUALITY_MAX: u32 = 100;
/// Datasets bound into one paper.
pub const DATASETS_PER_PAPER: usize = 3;

/// What kind of result a dataset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    RansResult,
}

/// Post-processed output of one converged run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub quality: u32,
    pub kind: DatasetKind,
}

/// Pull a dataset out of a converged run.
pub fn extract_dataset(sampler: &mut impl Sampler) -> Dataset {
    let quality = sampler.range_inclusive(DATASET_QUALITY_MIN as i32, DATASET_QUALITY_MAX as i32);
    Dataset {
        quality: quality as u32,
        kind: DatasetKind::RansResult,
    }
}

/// A paper ready for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPaper {
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("a paper needs exactly 3 datasets, got {0}")]
    WrongDatasetCount(usize),
}

/// Bind exactly three datasets into a draft.
pub fn draft_paper(datasets: &[Dataset]) -> Result<DraftPaper, DraftError> {
    if datasets.len() != DATASETS_PER_PAPER {
        return Err(DraftError::WrongDatasetCount(datasets.len()));
    }
    Ok(DraftPaper {
        score: datasets.iter().map(|d| d.quality).sum(),
    })
}

/// Submission venues, hardest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Journal {
    FluidMechanics,
    OceanEngineering,
    OpenAccess,
}

impl Journal {
    pub const ALL: [Journal; 3] = [
        Journal::FluidMechanics,
        Journal::OceanEngineering,
        Journal::OpenAccess,
    ];

    /// Reviewer resolve at the start of the battle.
    pub fn difficulty(self) -> i32 {
        match self {
            Journal::FluidMechanics => 200,
            Journal::OceanEngineering => 150,
            Journal::OpenAccess => 50,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Journal::FluidMechanics => "J. Fluid Mech.",
            Journal::OceanEngineering => "Ocean Eng.",
            Journal::OpenAccess => "Open Access",
        }
    }
}
