//! The stack program: one S3 bucket whose name is exported

use stackflow_cloud::{Program, ResourceConfig};
use stackflow_cloud_aws::{NAMESPACE, S3_BUCKET};

/// Logical name of the bucket
pub const BUCKET_ID: &str = "demo";

/// Output carrying the physical bucket name
pub const BUCKET_NAME_OUTPUT: &str = "bucketName";

/// Declares the bucket, tagged with its project and stack
///
/// `<project>:forceDestroy=true` lets destroy delete a non-empty bucket.
pub fn bucket_program() -> Program {
    Program::new(|ctx| {
        let force_destroy = ctx
            .config("forceDestroy")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let inputs = serde_json::json!({
            "tags": {
                "stackflow:project": ctx.project(),
                "stackflow:stack": ctx.stack(),
            },
            "forceDestroy": force_destroy,
        });

        let bucket = ctx.register(ResourceConfig::new(S3_BUCKET, BUCKET_ID, NAMESPACE, inputs))?;
        ctx.export(BUCKET_NAME_OUTPUT, bucket.attribute("bucket"));
        Ok(())
    })
}
