//! Save/Load functionality for persisting a lab session
//!
//! Uses bincode for compact binary serialization of the whole session,
//! including the random stream position.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lab::{Lab, LabError};

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of a session
#[derive(Serialize, Deserialize)]
struct SaveData {
    version: u32,
    lab: Lab,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Saved config is invalid: {0}")]
    InvalidConfig(#[source] LabError),
}

/// Save the complete session to a writer
pub fn save_lab<W: Write>(writer: W, lab: &Lab) -> Result<(), SaveError> {
    #[derive(Serialize)]
    struct SaveDataRef<'a> {
        version: u32,
        lab: &'a Lab,
    }

    bincode::serialize_into(
        writer,
        &SaveDataRef {
            version: SAVE_VERSION,
            lab,
        },
    )?;
    Ok(())
}

/// Load a session from a reader
pub fn load_lab<R: Read>(reader: R) -> Result<Lab, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    save_data
        .lab
        .config()
        .validate()
        .map_err(SaveError::InvalidConfig)?;
    Ok(save_data.lab)
}

impl Lab {
    /// Save session state to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        save_lab(writer, self)
    }

    /// Load session state from a reader
    pub fn load<R: Read>(reader: R) -> Result<Lab, SaveError> {
        load_lab(reader)
    }
}
