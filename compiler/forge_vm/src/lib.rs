//! Reference backend and interpreter for the Forge type construction engine.
//!
//! [`VmBackend`] implements `forge_emit::TargetBackend`. It buffers each
//! defined type until commit, verifies every body, then publishes the type's
//! record to the shared metadata registry and its code to a [`CodeStore`].
//! [`Vm`] executes the committed code.
//!
//! # Architecture
//!
//! - `backend`: slots, pending types, commit
//! - `verify`: stack-depth and constructor-chain checks run at commit
//! - `code`: committed bodies, keyed by member handle
//! - `interp`: the stack-machine interpreter
//! - `value`: runtime values and shared objects
//! - `config`: settings read from `FORGE_*` environment variables
//!
//! # Crate Dependencies
//!
//! Depends on `forge_meta`, `forge_ir` and `forge_emit`. Nothing in the
//! engine depends on this crate; hosts with their own code format bring their
//! own backend instead.
//!
//! # Tracing
//!
//! Enable with `RUST_LOG=forge_vm=debug` after calling [`init_tracing`].
//! Set `FORGE_DUMP_IL=1` to log each committed body's listing at debug level.

mod backend;
mod code;
mod config;
mod error;
mod interp;
mod value;
mod verify;

use std::sync::Once;

pub use backend::{VmBackend, VmField, VmMember, VmParam, VmProperty};
pub use code::{CodeStore, CompiledBody, MemberKey};
pub use config::{VmConfig, ENV_DUMP_IL, ENV_MAX_CALL_DEPTH, ENV_VERIFY};
pub use error::{VerifyError, VmError};
pub use interp::{NativeFn, Vm};
pub use value::{ObjectRef, Value};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
