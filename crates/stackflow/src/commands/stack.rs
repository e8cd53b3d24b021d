use crate::StackCommands;
use crate::context::CliContext;
use colored::Colorize;

pub async fn handle(ctx: &CliContext, cmd: StackCommands) -> anyhow::Result<()> {
    let workspace = ctx.workspace();
    match cmd {
        StackCommands::Ls => {
            let stacks = workspace.list_stacks().await?;
            if stacks.is_empty() {
                println!("{}", "No stacks yet".yellow());
            }
            for name in stacks {
                if name == ctx.stack {
                    println!("{} {}", "*".green(), name.cyan());
                } else {
                    println!("  {}", name);
                }
            }
        }
        StackCommands::Rm { name, force } => {
            workspace.remove_stack(&name, force).await?;
            println!("{} {}", "✓ Removed stack".green(), name.cyan());
        }
    }
    Ok(())
}
