//! Reporter trait for dependency injection
//!
//! Core logic reports progress through this trait so that it stays free of
//! any terminal rendering. The CLI supplies a styled implementation; tests
//! use [`NullReporter`].

use kpdev_schema::ImportedPlugin;

pub trait Reporter: Send + Sync {
    /// Start a live phase (e.g. "Bundling").
    fn live_phase(&self, title: &str);

    /// Close the current live phase with a status word.
    fn live_phase_update(&self, status: &str, success: bool);

    /// Indicates a new section has started (e.g. "Deploying").
    fn section(&self, title: &str);

    /// A deployment to `target` has started.
    fn deploying(&self, target: &str);

    /// A deployment to `target` finished successfully.
    fn deployed(&self, target: &str, plugin: &ImportedPlugin);

    /// A deployment to `target` failed with `reason`.
    fn deploy_failed(&self, target: &str, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);

    /// Final tally of a batch.
    fn summary(&self, succeeded: usize, failed: usize, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn live_phase(&self, title: &str) {
        (**self).live_phase(title);
    }
    fn live_phase_update(&self, status: &str, success: bool) {
        (**self).live_phase_update(status, success);
    }
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn deploying(&self, target: &str) {
        (**self).deploying(target);
    }
    fn deployed(&self, target: &str, plugin: &ImportedPlugin) {
        (**self).deployed(target, plugin);
    }
    fn deploy_failed(&self, target: &str, reason: &str) {
        (**self).deploy_failed(target, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
    fn summary(&self, succeeded: usize, failed: usize, elapsed_secs: f64) {
        (**self).summary(succeeded, failed, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn live_phase(&self, _: &str) {}
    fn live_phase_update(&self, _: &str, _: bool) {}
    fn section(&self, _: &str) {}
    fn deploying(&self, _: &str) {}
    fn deployed(&self, _: &str, _: &ImportedPlugin) {}
    fn deploy_failed(&self, _: &str, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn summary(&self, _: usize, _: usize, _: f64) {}
}
