//! Interactive symptom conversation.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Confirm, Editor, Input};

use triage_core::types::Transcript;
use triage_sdk::{Triage, TriageConfig};

/// Execute chat command.
pub async fn execute(
    session: Option<String>,
    no_validate: bool,
    config: &TriageConfig,
) -> Result<()> {
    let triage = Triage::new(config.clone()).context("Failed to initialize triage")?;
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::debug!(session_id = %session_id, "starting conversation");

    println!("{}", "Symptom Triage".cyan().bold());
    println!("  Session: {}", session_id.dimmed());
    println!(
        "  Type {} when you are done.",
        config.conversation.stop_words.join(" / ").bold()
    );
    println!();

    loop {
        let utterance: String = Input::new()
            .with_prompt("You")
            .interact_text()
            .context("Failed to read input")?;

        let bar = super::spinner("Thinking...")?;
        let result = triage.chat(&session_id, &utterance).await;
        bar.finish_and_clear();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_session_closed() => {
                println!("{} This session has already ended.", "!".yellow());
                return Ok(());
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                eprintln!("  {}", "Nothing was recorded, please try again.".dimmed());
                continue;
            }
        };

        println!("{} {}", "Assistant:".cyan().bold(), outcome.reply);

        if let Some(transcript) = outcome.transcript {
            return finish(&triage, &session_id, transcript, no_validate, config).await;
        }
    }
}

/// Assess the finished conversation, save the report and offer validation.
async fn finish(
    triage: &Triage,
    session_id: &str,
    transcript: Transcript,
    no_validate: bool,
    config: &TriageConfig,
) -> Result<()> {
    println!();
    let bar = super::spinner("Preparing your report...")?;
    let result = triage.assess(session_id, &transcript).await;
    bar.finish_and_clear();
    let report = result.context("Failed to generate report")?;

    println!("{}", "Clinical Summary".cyan().bold());
    println!("{}", report.clinical_summary);
    println!();
    println!("{}", "Medical Report".cyan().bold());
    println!("{}", report.medical_report);
    println!();

    let path = report.save_to_dir(&config.reports.output_dir)?;
    println!("{} Report saved to {}", "✓".green(), path.display());

    if no_validate {
        return Ok(());
    }

    let validate = Confirm::new()
        .with_prompt("Validate this report as a clinician?")
        .default(false)
        .interact()?;
    if !validate {
        return Ok(());
    }

    let edited = Editor::new()
        .extension(".md")
        .edit(&report.medical_report)
        .context("Failed to open editor")?
        .unwrap_or_else(|| report.medical_report.clone());

    let bar = super::spinner("Storing validated report...")?;
    let result = triage.validate_and_store(&edited).await;
    bar.finish_and_clear();

    match result? {
        Some(snapshot) => println!(
            "{} Knowledge base updated ({} → {} documents)",
            "✓".green(),
            snapshot.before,
            snapshot.after
        ),
        None => println!("{} Empty report, nothing stored", "!".yellow()),
    }
    Ok(())
}
