pub mod config;
pub mod destroy;
pub mod outputs;
pub mod preview;
pub mod refresh;
pub mod stack;
pub mod up;
