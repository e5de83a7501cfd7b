//! Process launchers
//!
//! - `LocalLauncher` - direct host process execution with piped output
//! - `deliver_signal` - termination signals for a launched process

pub mod local;
pub mod r#trait;

pub use local::{build_argv, deliver_signal, LocalLauncher, StopSignal};
pub use r#trait::{LaunchRequest, LaunchedProcess, Launcher};
