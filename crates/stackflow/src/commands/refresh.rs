use crate::context::CliContext;
use crate::sink::ConsoleSink;
use colored::Colorize;
use stackflow_cloud::{EXIT_OK, EXIT_OPERATION_FAILED};

/// Returns the process exit status
pub async fn handle(ctx: &CliContext) -> anyhow::Result<i32> {
    ctx.print_header();
    let mut stack = ctx.select().await?;

    println!();
    println!("{}", "Starting refresh".cyan());
    let mut sink = ConsoleSink;
    let result = tokio::select! {
        result = stack.refresh(&mut sink) => result.map_err(|e| e.to_string()),
        _ = tokio::signal::ctrl_c() => Err("Operation cancelled".to_string()),
    };

    match result {
        Ok(_) => {
            println!("{}", "Refresh succeeded!".green().bold());
            Ok(EXIT_OK)
        }
        Err(e) => {
            println!("{}", format!("Failed to refresh stack: {}", e).red().bold());
            Ok(EXIT_OPERATION_FAILED)
        }
    }
}
