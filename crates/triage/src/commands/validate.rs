//! Clinician validation of a saved report.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Editor;
use std::path::Path;

use triage_sdk::{SessionReport, Triage, TriageConfig};

/// Execute validate command.
pub async fn execute(path: &Path, edit: bool, config: &TriageConfig) -> Result<()> {
    let report = read_report(path)?;

    let report = if edit {
        Editor::new()
            .extension(".md")
            .edit(&report)
            .context("Failed to open editor")?
            .unwrap_or(report)
    } else {
        report
    };

    let triage = Triage::new(config.clone()).context("Failed to initialize triage")?;
    let bar = super::spinner("Storing validated report...")?;
    let result = triage.validate_and_store(&report).await;
    bar.finish_and_clear();

    match result? {
        Some(snapshot) => {
            println!("{} Validated report stored", "✓".green());
            println!("  Documents before: {}", snapshot.before);
            println!("  Documents after: {}", snapshot.after);
        }
        None => println!("{} Report is empty, nothing stored", "!".yellow()),
    }
    Ok(())
}

/// Report text from a saved session report or a plain-text file.
pub(crate) fn read_report(path: &Path) -> Result<String> {
    if path.extension().is_some_and(|ext| ext == "json") {
        let report = SessionReport::load(path)
            .with_context(|| format!("Failed to load session report {}", path.display()))?;
        return Ok(report.medical_report);
    }

    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use triage_core::types::{Transcript, Turn};

    #[test]
    fn test_read_report_from_session_json() {
        let dir = tempdir().unwrap();
        let report = SessionReport {
            session_id: "S9".into(),
            conversation_history: Transcript::from(vec![Turn::patient("rash")]),
            clinical_summary: "Rash".into(),
            medical_report: "Possible dermatitis".into(),
            retrieved_knowledge: None,
            generated_at: chrono::Utc::now(),
        };
        let path = report.save_to_dir(dir.path()).unwrap();

        assert_eq!(read_report(&path).unwrap(), "Possible dermatitis");
    }

    #[test]
    fn test_read_report_from_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "Disease: Flu | Symptoms: fever").unwrap();
        assert_eq!(read_report(&path).unwrap(), "Disease: Flu | Symptoms: fever");
    }
}
