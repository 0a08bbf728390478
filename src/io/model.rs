//! Read/write forecast model JSON files.
//!
//! Model JSON is the portable representation of a forecast run:
//! - smoothing parameters, initial and final component state
//! - optimizer diagnostics
//! - the forecast itself (unrounded), for re-plotting without refitting

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FittedModel, ForecastPoint, ForecastResult};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub model: FittedModel,
    pub forecast: Vec<ForecastPoint>,
}

impl ModelFile {
    pub fn into_result(self) -> ForecastResult {
        ForecastResult {
            points: self.forecast,
            model: self.model,
        }
    }
}

/// Write a model JSON file (temp file + rename, like the CSV outputs).
pub fn write_model_json(path: &Path, result: &ForecastResult) -> Result<(), AppError> {
    let doc = ModelFile {
        tool: "vacancy".to_string(),
        model: result.model.clone(),
        forecast: result.points.clone(),
    };

    super::write_replacing(path, |file| {
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, &doc)?;
        out.flush()?;
        Ok::<(), io::Error>(())
    })
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let doc: ModelFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;
    Ok(doc)
}
