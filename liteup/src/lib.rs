//! liteup - bring sandboxed Linux containers online.
//!
//! Drives the multi-step bring-up of a container inside a VM (runtime
//! component, host service, disk image, VM, container) through external VM
//! and container services, and deduplicates concurrent requests for the same
//! target.
//!
//! ## Example
//!
//! ```ignore
//! let manager = Manager::builder(clients).build();
//! manager.spawn_signal_listener(signal_rx);
//!
//! let registry =
//!     RestartRegistry::new(manager.clone(), TaskRunner::current(), RestartOptions::default());
//! let handle = registry.restart(RestartRequest::new("owner1", "vm1", "c1", "user1"));
//! match handle.await {
//!     Some(Ok(())) => println!("container is up"),
//!     Some(Err(e)) => eprintln!("bring-up failed: {e}"),
//!     None => eprintln!("bring-up aborted"),
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod options;
pub mod pipeline;
pub mod restart;
pub mod runner;
pub mod service;
pub mod types;
pub mod util;

pub use errors::{ConfigError, ErrorCode, RegistryError, ServiceCallError, VmError, VmResult};
pub use manager::{InstallProgressObserver, Manager, ManagerBuilder, ShutdownCallback};
pub use options::{LiteupOptions, LoggingOptions, ManagerOptions, RestartOptions};
pub use restart::{
    RestartCallback, RestartHandle, RestartInfo, RestartObserver, RestartRegistry,
    RestartRequest, RestartState,
};
pub use runner::TaskRunner;
pub use service::ServiceClients;
pub use types::{ContainerKey, OwnerId, RestartId, RestartKey, VmKey};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over [`LoggingOptions::default_filter`]. With
/// a log directory set, events go to a daily-rotated `liteup.log` there
/// through a non-blocking writer; the returned guard must be held for the
/// lifetime of the process or buffered events are lost.
pub fn init_logging(options: &LoggingOptions) -> Result<Option<WorkerGuard>, ConfigError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.default_filter))
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    match &options.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "liteup.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .try_init()
                .map_err(|e| ConfigError::Logging(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_ansi(options.ansi)
                .try_init()
                .map_err(|e| ConfigError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}
