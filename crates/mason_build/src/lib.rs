//! Build-step orchestration for the markup compiler.
//!
//! A [`BuildContext`] lives for one build invocation. The host calls
//! [`BuildContext::generate`] before compiling a scope's sources and
//! [`BuildContext::finalize`] after. Finalize post-processes through the
//! session left behind by generate, or recovers when there is none. Any
//! failure rolls back the step's outputs before it is reported.

#![warn(missing_docs)]

pub mod context;
pub mod failure;
pub mod recovery;
pub mod report;
pub mod rollback;

pub use context::BuildContext;
pub use failure::{StepFailure, StepResult, SuppressedError};
pub use report::{FinalizeMode, FinalizeReport};
pub use rollback::rollback_outputs;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set, e.g.
/// `RUST_LOG=mason_build=debug,mason=info`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
