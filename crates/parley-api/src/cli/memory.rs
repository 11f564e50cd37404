//! Thread memory CLI commands: show, list.

use anyhow::{Context, Result};
use console::style;

use parley_core::memory::store::MemoryStore;

use crate::state::AppState;

/// Print the stored memory of one thread.
///
/// # Examples
///
/// ```bash
/// parley memory show 0193a1b2-7c4e-7000-8000-000000000000
/// ```
pub async fn show_memory(state: &AppState, thread: &str, json: bool) -> Result<()> {
    let memory = state
        .memory
        .read(thread)
        .await
        .with_context(|| format!("failed to read memory of thread '{thread}'"))?;

    if json {
        let value = serde_json::json!({
            "thread_id": thread,
            "path": state.memory.context_path(thread)?,
            "memory": memory,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match memory {
        Some(text) => {
            println!();
            println!("  {}", style(format!("── {thread} ──")).dim());
            println!();
            println!("{}", text.trim());
            println!();
        }
        None => {
            println!();
            println!(
                "  {} No memory stored for thread {}",
                style("i").blue().bold(),
                style(thread).cyan()
            );
            println!();
        }
    }
    Ok(())
}

/// List threads that have stored memory.
pub async fn list_threads(state: &AppState, json: bool) -> Result<()> {
    let threads = state
        .memory
        .threads()
        .await
        .context("failed to list memory threads")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&threads)?);
        return Ok(());
    }

    if threads.is_empty() {
        println!();
        println!(
            "  {} No threads yet. Start one with {}",
            style("i").blue().bold(),
            style("parley respond --flow <flow> \"...\"").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    for thread in &threads {
        println!("  {}", style(thread).cyan());
    }
    println!();
    println!("  {} {} thread(s)", style("·").dim(), threads.len());
    println!();
    Ok(())
}
