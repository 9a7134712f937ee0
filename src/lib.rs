//! callweave: incremental call graphs for Java projects

pub mod config;
pub mod output;
pub mod progress;
pub mod session;

pub use config::{CallweaveConfig, ConfigError, OutputFormat, load_config};
pub use output::{RenderSink, render_dot, render_json, render_pairs};
pub use progress::BarProgress;
pub use session::Session;
