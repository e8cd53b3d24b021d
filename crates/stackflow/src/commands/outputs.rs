use crate::context::CliContext;
use colored::Colorize;

pub async fn handle(ctx: &CliContext, json: bool) -> anyhow::Result<()> {
    let stack = ctx.select().await?;
    let outputs = stack.outputs().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outputs.to_json())?);
        return Ok(());
    }

    if outputs.is_empty() {
        println!("{}", "No outputs. Run `stackflow up` first".yellow());
        return Ok(());
    }

    println!("Outputs of {}:", stack.name().cyan());
    for (name, value) in outputs.iter() {
        println!("  {}: {}", name.bold(), value);
    }
    Ok(())
}
