//! Session report persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use triage_core::types::Transcript;

use crate::SDKResult;

/// Everything produced for one finished conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub conversation_history: Transcript,
    pub clinical_summary: String,
    pub medical_report: String,
    /// Knowledge text that informed the report, if any was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_knowledge: Option<String>,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
}

impl SessionReport {
    /// File name used for this session's report
    pub fn file_name(session_id: &str) -> String {
        format!("medical_report_{}.json", session_id)
    }

    /// Write the report as pretty JSON into `dir`, creating it if needed.
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> SDKResult<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(Self::file_name(&self.session_id));
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        info!(session_id = %self.session_id, path = %path.display(), "saved session report");
        Ok(path)
    }

    /// Read a report written by [`SessionReport::save_to_dir`].
    pub fn load(path: impl AsRef<Path>) -> SDKResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use triage_core::types::Turn;

    fn report() -> SessionReport {
        SessionReport {
            session_id: "S1".into(),
            conversation_history: Transcript::from(vec![
                Turn::patient("headache"),
                Turn::assistant("Where does it hurt?"),
            ]),
            clinical_summary: "Patient reports a headache.".into(),
            medical_report: "Preliminary report".into(),
            retrieved_knowledge: None,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("reports");

        let report = report();
        let path = report.save_to_dir(&out).unwrap();
        assert_eq!(path, out.join("medical_report_S1.json"));

        let loaded = SessionReport::load(&path).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_json_keys() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["session_id"], "S1");
        assert_eq!(json["conversation_history"][0]["role"], "patient");
        assert_eq!(json["clinical_summary"], "Patient reports a headache.");
        assert_eq!(json["medical_report"], "Preliminary report");
        assert!(json.get("retrieved_knowledge").is_none());
    }
}
