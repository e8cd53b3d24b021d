use crate::ConfigCommands;
use crate::context::CliContext;
use colored::Colorize;
use stackflow_cloud::ConfigValue;

pub async fn handle(ctx: &CliContext, cmd: ConfigCommands) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::List => {
            let stack = ctx.select().await?;
            let config = stack.get_all_config().await?;
            if config.is_empty() {
                println!("{}", "No configuration set".yellow());
            }
            for (key, value) in config.iter() {
                println!("{} = {}", key.cyan(), value);
            }
        }
        ConfigCommands::Get { key } => {
            let stack = ctx.select().await?;
            match stack.get_config(&key).await? {
                Some(value) => println!("{}", value.value),
                None => anyhow::bail!("Configuration key '{}' is not set", key),
            }
        }
        ConfigCommands::Set { key, value, secret } => {
            let mut stack = ctx.select_or_create().await?;
            let value = if secret {
                ConfigValue::secret(value)
            } else {
                ConfigValue::plain(value)
            };
            stack.set_config(&key, value).await?;
            println!("{} {}", "✓ Set".green(), key.cyan());
        }
        ConfigCommands::Rm { key } => {
            let mut stack = ctx.select().await?;
            if stack.remove_config(&key).await? {
                println!("{} {}", "✓ Removed".green(), key.cyan());
            } else {
                println!("{} is not set", key.cyan());
            }
        }
    }
    Ok(())
}
