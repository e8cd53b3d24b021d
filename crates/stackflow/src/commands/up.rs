use crate::context::CliContext;
use crate::program::{self, BUCKET_NAME_OUTPUT};
use crate::sink::ConsoleSink;
use colored::Colorize;
use stackflow_cloud::{
    deploy, parse_assignment, qualify_key, ConfigValue, DeployError, DeployRequest, EXIT_OK,
};

/// Build the deploy request
///
/// A project file's configuration is written on every run, after which the
/// `-c` overrides apply. Without a project file the built-in defaults only
/// fill in keys the stack does not have yet.
fn build_request(ctx: &CliContext, overrides: &[String]) -> anyhow::Result<DeployRequest> {
    let mut request = DeployRequest::new(ctx.stack.clone());
    let from_file = ctx.project.path.is_some();
    for (key, value) in ctx.stack_config()?.iter() {
        request = if from_file {
            request.with_config(key.clone(), value.clone())
        } else {
            request.with_default(key.clone(), value.clone())
        };
    }
    for assignment in overrides {
        let (key, value) = parse_assignment(assignment)?;
        qualify_key(ctx.project_name(), &key)
            .map_err(|e| anyhow::anyhow!("Invalid --config {}: {}", assignment, e))?;
        request = request.with_config(key, ConfigValue::plain(value));
    }
    Ok(request)
}

/// Returns the process exit status
pub async fn handle(ctx: &CliContext, overrides: &[String]) -> anyhow::Result<i32> {
    ctx.print_header();
    println!();

    let request = build_request(ctx, overrides)?;
    let workspace = ctx.workspace();
    let mut sink = ConsoleSink;

    let result = tokio::select! {
        result = deploy(&workspace, &request, program::bucket_program(), &mut sink) => result,
        _ = tokio::signal::ctrl_c() => Err(DeployError::Cancelled),
    };

    match result {
        Ok(report) => {
            match report.update.outputs.get_string(BUCKET_NAME_OUTPUT) {
                Some(name) => println!("Bucket name: {}", name.cyan().bold()),
                None => println!("{}", "Bucket name: (not exported)".yellow()),
            }
            Ok(EXIT_OK)
        }
        Err(e) => {
            println!("{}", e.to_string().red().bold());
            Ok(e.exit_code())
        }
    }
}
