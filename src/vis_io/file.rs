// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Datasets on disk.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::{MemoryVisSet, VisIterator, VisMetadata, VisReadError, VisRow, VisWriteError};

lazy_static::lazy_static! {
    pub(crate) static ref VIS_FILE_EXTENSIONS: String = VisFileType::iter().join(", ");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum VisFileType {
    #[strum(serialize = "json")]
    Json,

    #[strum(serialize = "yaml")]
    Yaml,
}

impl VisFileType {
    pub fn from_path(path: &Path) -> Option<VisFileType> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| match e.as_str() {
                "yml" => Some(VisFileType::Yaml),
                e => e.parse().ok(),
            })
    }
}

fn ext_string(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("<no extension>")
        .to_string()
}

/// The on-disk layout of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisDatasetFile {
    pub metadata: VisMetadata,
    pub rows: Vec<VisRow>,
}

pub fn read_vis_dataset(path: &Path) -> Result<MemoryVisSet, VisReadError> {
    if !path.exists() {
        return Err(VisReadError::DoesNotExist(path.to_path_buf()));
    }
    let file_type = VisFileType::from_path(path).ok_or_else(|| VisReadError::UnsupportedExt {
        ext: ext_string(path),
    })?;

    debug!("Reading {file_type} dataset {}", path.display());
    let reader = BufReader::new(File::open(path)?);
    let parse_err = |reason: String| VisReadError::Parse {
        path: path.to_path_buf(),
        reason,
    };
    let file: VisDatasetFile = match file_type {
        VisFileType::Json => serde_json::from_reader(reader).map_err(|e| parse_err(e.to_string()))?,
        VisFileType::Yaml => serde_yaml::from_reader(reader).map_err(|e| parse_err(e.to_string()))?,
    };
    let vis_set = MemoryVisSet::new(file.metadata, file.rows)?;
    info!(
        "Read {} rows ({} antennas, {} spws) from {}",
        vis_set.rows().len(),
        vis_set.metadata().num_antennas(),
        vis_set.metadata().num_spws(),
        path.display()
    );
    Ok(vis_set)
}

pub fn write_vis_dataset(path: &Path, vis_set: &MemoryVisSet) -> Result<(), VisWriteError> {
    let file_type = VisFileType::from_path(path).ok_or_else(|| VisWriteError::UnsupportedExt {
        ext: ext_string(path),
    })?;
    let file = VisDatasetFile {
        metadata: vis_set.metadata().clone(),
        rows: vis_set.rows().to_vec(),
    };

    debug!("Writing {file_type} dataset {}", path.display());
    let writer = BufWriter::new(File::create(path)?);
    match file_type {
        VisFileType::Json => serde_json::to_writer(writer, &file)?,
        VisFileType::Yaml => serde_yaml::to_writer(writer, &file)?,
    }
    info!("Wrote {} rows to {}", file.rows.len(), path.display());
    Ok(())
}
