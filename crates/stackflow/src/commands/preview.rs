use crate::context::CliContext;
use colored::Colorize;
use stackflow_cloud::ActionType;

pub async fn handle(ctx: &CliContext) -> anyhow::Result<()> {
    ctx.print_header();
    let stack = ctx.select().await?;

    println!();
    println!("Previewing update ({})", stack.name().cyan());
    let preview = stack.preview().await?;

    for action in &preview.plan.actions {
        let line = format!("{} {}", action.resource_type, action.resource_id);
        match action.action_type {
            ActionType::Create => println!("  {} {}", "+".green(), line),
            ActionType::Update => println!("  {} {}", "~".yellow(), line),
            ActionType::Delete => println!("  {} {}", "-".red(), line),
            ActionType::NoOp => println!("    {}", line.dimmed()),
        }
    }

    println!();
    if preview.plan.has_changes {
        println!("Resources: {}", preview.summary());
    } else {
        println!("{}", "No changes".green());
    }
    Ok(())
}
