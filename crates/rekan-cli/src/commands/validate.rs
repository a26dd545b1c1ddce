//! The `rekan validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let banks = rekan_core::parser::load_banks(&bank_path)?;

    let mut total_warnings = 0;

    for bank in &banks {
        let title = bank
            .title
            .as_deref()
            .map(|t| format!(" \"{t}\""))
            .unwrap_or_default();
        println!(
            "Bank: {}{title} ({} questions)",
            bank.exam,
            bank.questions.len()
        );

        let warnings = rekan_core::parser::validate_question_bank(bank);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if banks.is_empty() {
        println!("No question banks found.");
    } else if total_warnings == 0 {
        println!("All question banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
