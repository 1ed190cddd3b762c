use std::path::PathBuf;

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{model::PredictionResult, recommendation::RecommendationRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub image_filename: String,
    pub prediction: PredictionResult,
    pub recommendation: RecommendationRecord,
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("cannot access prediction log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize prediction log: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("prediction log {path} holds JSON that is not an array")]
    NotAnArray { path: PathBuf },
}

/// Keeps every prediction in a single JSON array file.
///
/// Each write rewrites the whole array. Writers in this process are serialized
/// and the new array is committed with a rename, so readers never observe a
/// partially written file. Array elements are carried as raw JSON, so entries
/// written in another shape survive every rewrite.
pub struct PredictionLogger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PredictionLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PredictionLogger {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn log(
        &self,
        image_filename: &str,
        prediction: &PredictionResult,
        recommendation: &RecommendationRecord,
    ) -> Result<LogEntry, LogError> {
        let entry = LogEntry {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            image_filename: image_filename.to_string(),
            prediction: prediction.clone(),
            recommendation: recommendation.clone(),
        };

        let value = serde_json::to_value(&entry)?;

        let _guard = self.write_lock.lock().await;

        let mut logs = self.read_array().await?;
        logs.push(value);
        self.write_array(&logs).await?;

        tracing::debug!(
            path = %self.path.display(),
            total = logs.len(),
            "prediction logged"
        );
        Ok(entry)
    }

    /// Entries in the current schema. Elements of another shape are skipped.
    pub async fn entries(&self) -> Result<Vec<LogEntry>, LogError> {
        let logs = self.read_array().await?;
        Ok(logs
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect())
    }

    pub async fn count(&self) -> Result<usize, LogError> {
        Ok(self.read_array().await?.len())
    }

    async fn read_array(&self) -> Result<Vec<Value>, LogError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LogError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_slice::<Value>(&contents) {
            Ok(Value::Array(logs)) => Ok(logs),
            Ok(_) => Err(LogError::NotAnArray {
                path: self.path.clone(),
            }),
            Err(err) => {
                // unreadable JSON is replaced on the next write
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "prediction log is not valid JSON, starting a new one"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn write_array(&self, logs: &[Value]) -> Result<(), LogError> {
        let contents = serde_json::to_vec_pretty(logs)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let io_err = |source| LogError::Io {
            path: self.path.clone(),
            source,
        };

        tokio::fs::write(&tmp_path, &contents).await.map_err(io_err)?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}
