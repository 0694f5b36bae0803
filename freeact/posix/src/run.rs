//! Host run loop.
//!
//! Active objects run on their own threads once started, so the main thread
//! only has to bring up the tick source and then idle until asked to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::info;

use crate::fault::install_fault_hook;
use crate::timer::{start_ticker, stop_ticker};
use crate::PosixError;

static RUNNING: AtomicBool = AtomicBool::new(false);
static CTRLC_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Configuration for [`run`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Start the tick source thread
    pub tick_source: bool,
    /// Install the aborting fault hook
    pub fault_hook: bool,
    /// Stop on Ctrl-C
    pub handle_ctrlc: bool,
    /// Called once per idle period on the main thread
    pub idle_callback: Option<fn()>,
    pub idle_period: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_source: true,
            fault_hook: true,
            handle_ctrlc: true,
            idle_callback: None,
            idle_period: Duration::from_millis(10),
        }
    }
}

impl RunConfig {
    /// Creates a new run configuration builder.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug, Clone, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Enables or disables the tick source thread.
    pub fn tick_source(mut self, enabled: bool) -> Self {
        self.config.tick_source = enabled;
        self
    }

    /// Enables or disables installing the aborting fault hook.
    pub fn fault_hook(mut self, enabled: bool) -> Self {
        self.config.fault_hook = enabled;
        self
    }

    /// Enables or disables stopping on Ctrl-C.
    pub fn handle_ctrlc(mut self, enabled: bool) -> Self {
        self.config.handle_ctrlc = enabled;
        self
    }

    /// Sets the idle callback function.
    pub fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    /// Sets how often the idle callback runs.
    pub fn idle_period(mut self, period: Duration) -> Self {
        self.config.idle_period = period;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RunConfig {
        self.config
    }
}

/// Ask a running [`run`] loop to return
pub fn shutdown() {
    RUNNING.store(false, Ordering::SeqCst);
}

pub fn is_running() -> bool {
    RUNNING.load(Ordering::SeqCst)
}

/// Run until [`shutdown`] is called or, if enabled, Ctrl-C is pressed.
///
/// Active objects should be started before calling this.
pub fn run(config: RunConfig) -> Result<(), PosixError> {
    if config.fault_hook {
        install_fault_hook();
    }
    if config.handle_ctrlc && !CTRLC_INSTALLED.swap(true, Ordering::SeqCst) {
        ctrlc::set_handler(shutdown)?;
    }

    RUNNING.store(true, Ordering::SeqCst);
    if config.tick_source {
        if let Err(err) = start_ticker() {
            RUNNING.store(false, Ordering::SeqCst);
            return Err(err);
        }
    }
    info!("running, idle period {:?}", config.idle_period);

    while RUNNING.load(Ordering::SeqCst) {
        if let Some(idle) = config.idle_callback {
            idle();
        }
        thread::sleep(config.idle_period);
    }

    if config.tick_source {
        stop_ticker();
    }
    info!("stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn builder_overrides_defaults() {
        fn idle() {}

        let config = RunConfig::builder()
            .tick_source(false)
            .fault_hook(false)
            .idle_callback(idle)
            .idle_period(Duration::from_millis(2))
            .build();

        assert!(!config.tick_source);
        assert!(!config.fault_hook);
        assert!(config.handle_ctrlc);
        assert!(config.idle_callback.is_some());
        assert_eq!(config.idle_period, Duration::from_millis(2));
    }

    #[test]
    fn idle_callback_runs_until_shutdown() {
        static IDLE_CALLS: AtomicUsize = AtomicUsize::new(0);

        fn idle() {
            if IDLE_CALLS.fetch_add(1, Ordering::SeqCst) + 1 == 5 {
                shutdown();
            }
        }

        let config = RunConfig::builder()
            .tick_source(false)
            .fault_hook(false)
            .handle_ctrlc(false)
            .idle_callback(idle)
            .idle_period(Duration::from_millis(1))
            .build();

        run(config).unwrap();
        assert_eq!(IDLE_CALLS.load(Ordering::SeqCst), 5);
        assert!(!is_running());
    }
}
