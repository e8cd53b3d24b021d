use crate::context::CliContext;
use crate::sink::ConsoleSink;
use colored::Colorize;

pub async fn handle(ctx: &CliContext, yes: bool) -> anyhow::Result<()> {
    ctx.print_header();
    let mut stack = ctx.select().await?;

    if !yes {
        println!();
        println!(
            "{}",
            format!("Warning: every resource of stack '{}' will be deleted.", stack.name()).yellow()
        );
        println!("Pass --yes to proceed");
        return Ok(());
    }

    println!();
    let mut sink = ConsoleSink;
    let result = stack.destroy(&mut sink).await?;
    println!(
        "{}",
        format!(
            "Destroy succeeded! ({} resource(s) deleted)",
            result.summary.change_count("delete")
        )
        .green()
        .bold()
    );
    Ok(())
}
