//! Stackflow stack engine
//!
//! This crate manages named deployment stacks: their configuration, the
//! recorded state of their resources and the outputs of their programs.
//! Concrete resources are created through providers plugged in per
//! configuration namespace.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  stackflow CLI                   │
//! │            (stackflow up / refresh)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   orchestrator::deploy  →  Workspace      │   │
//! │  │   Stack { config, refresh, up, destroy }  │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │   Program    │  │ StateBackend │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │  trait CloudProvider
//! ┌───────▼───────┐
//! │      aws      │
//! │   provider    │
//! └───────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud::{deploy, DeployRequest, ConfigValue, StateManager, Workspace};
//!
//! let workspace = Workspace::new("bucket-daemon", Arc::new(StateManager::new(".stackflow")), registry);
//! let request = DeployRequest::new("dev").with_config("aws:region", ConfigValue::plain("us-east-1"));
//! let report = deploy(&workspace, &request, program, &mut WriterSink::stdout()).await?;
//! println!("{}", report.update.outputs.get_string("bucketName").unwrap_or_default());
//! ```

pub mod action;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod program;
pub mod progress;
pub mod provider;
pub mod stack;
pub mod state;
pub mod workspace;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use config::{parse_assignment, qualify_key, ConfigMap, ConfigValue, ProviderConfig};
pub use error::{CloudError, Result};
pub use orchestrator::{
    deploy, AcquiredVia, DeployError, DeployReport, DeployRequest, EXIT_ACQUISITION_FAILED,
    EXIT_OK, EXIT_OPERATION_FAILED,
};
pub use output::{OutputValue, Outputs};
pub use program::{Context, Export, Program, ProgramResult, ResourceRef};
pub use progress::{BufferSink, FanoutSink, NullSink, ProgressSink, TracingSink, WriterSink};
pub use provider::{
    AuthStatus, CloudProvider, ProviderFactory, ProviderRegistry, ResourceConfig, ResourceSet,
};
pub use stack::{DestroyResult, PreviewResult, RefreshResult, Stack, StackPhase, UpResult};
pub use state::{
    MemoryBackend, OperationKind, ProviderState, ResourceState, ResourceStatus, StackId,
    StackState, StateBackend, StateLock, StateManager, UpdateSummary,
};
pub use workspace::{AcquireError, Acquisition, Workspace};
