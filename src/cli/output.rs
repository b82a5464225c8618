//! CLI output formatting

use crate::core::ExecutionStats;
use console::Emoji;
use serde_json::Value;
use std::collections::HashMap;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");

/// Print a run's result as a human-readable summary
pub fn print_run(
    success: bool,
    result: &Value,
    context: &HashMap<String, Value>,
    stats: &ExecutionStats,
) {
    if success {
        println!("{}{}", CHECK, style("Pipeline succeeded").green().bold());
    } else {
        println!("{}{}", CROSS, style("Pipeline failed").red().bold());
        if let Some(error) = &stats.error {
            println!("  {} ({})", style(&error.message).red(), error.code);
        }
    }

    println!(
        "  {} step(s) in {} ms",
        stats.steps_executed,
        stats.duration_ms.unwrap_or(0)
    );
    for (step_type, count) in &stats.steps_by_type {
        println!("    {}: {}", style(step_type).dim(), count);
    }

    println!("  {}", style("Result:").bold());
    println!("    {}", pretty(result));

    if !context.is_empty() {
        println!("  {}", style("Context:").bold());
        let mut names: Vec<&String> = context.keys().collect();
        names.sort();
        for name in names {
            println!("    {} = {}", style(name).cyan(), pretty(&context[name]));
        }
    }
}

/// Print validation errors, one per line
pub fn print_validation_errors(errors: &[String]) {
    println!(
        "{}{}",
        CROSS,
        style(format!("{} validation error(s)", errors.len()))
            .red()
            .bold()
    );
    for error in errors {
        println!("  {} {}", style("-").dim(), error);
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}
