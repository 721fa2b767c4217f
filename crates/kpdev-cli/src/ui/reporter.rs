//! Terminal implementation of [`Reporter`].

use std::io::{IsTerminal, Stdout, Write};
use std::sync::{Mutex, MutexGuard};

use crossterm::style::Stylize;
use kpdev_core::Reporter;
use kpdev_schema::ImportedPlugin;

use super::buffer::OutputBuffer;
use super::theme::Theme;

struct State<W: Write> {
    buffer: OutputBuffer<W>,
    phase: Option<String>,
}

/// Styled console output.
///
/// One mutex guards the buffer so concurrent deploy tasks emit whole lines.
pub struct ConsoleReporter<W: Write + Send = Stdout> {
    state: Mutex<State<W>>,
    theme: Theme,
    quiet: bool,
    interactive: bool,
}

impl<W: Write + Send> std::fmt::Debug for ConsoleReporter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleReporter")
            .field("quiet", &self.quiet)
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}

impl ConsoleReporter {
    /// Reporter on stdout; phases redraw in place when stdout is a terminal.
    pub fn stdout(quiet: bool) -> Self {
        let interactive = std::io::stdout().is_terminal();
        Self::with_writer(std::io::stdout(), quiet, interactive)
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn with_writer(out: W, quiet: bool, interactive: bool) -> Self {
        Self {
            state: Mutex::new(State {
                buffer: OutputBuffer::new(out),
                phase: None,
            }),
            theme: Theme::default(),
            quiet,
            interactive,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<W>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Print `line` under the lock. Quiet mode drops everything but errors.
    fn emit(&self, line: &str, essential: bool) {
        if self.quiet && !essential {
            return;
        }
        let mut state = self.lock();
        state.buffer.write_line(line, self.theme.colors.secondary);
        state.buffer.flush();
    }

    fn target_cell(&self, target: &str) -> String {
        format!("{target: <width$}", width = self.theme.layout.target_width)
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn live_phase(&self, title: &str) {
        let mut state = self.lock();
        state.phase = Some(title.to_string());
        if self.quiet {
            return;
        }
        let line = format!(
            "  {} {}",
            self.theme.icons.active.with(self.theme.colors.active),
            title
        );
        if self.interactive {
            state.buffer.write(&format!("{line}..."));
        } else {
            state.buffer.write_line(&line, self.theme.colors.secondary);
        }
        state.buffer.flush();
    }

    fn live_phase_update(&self, status: &str, success: bool) {
        let mut state = self.lock();
        let title = state.phase.take().unwrap_or_default();
        if self.quiet && success {
            return;
        }
        if self.interactive && !self.quiet {
            state.buffer.rewind_line();
        }
        let (icon, color) = if success {
            (self.theme.icons.success, self.theme.colors.success)
        } else {
            (self.theme.icons.error, self.theme.colors.error)
        };
        let line = format!(
            "  {} {} {}",
            icon.with(color),
            title,
            status.with(self.theme.colors.secondary)
        );
        state.buffer.write_line(&line, self.theme.colors.secondary);
        state.buffer.flush();
    }

    fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        let mut state = self.lock();
        state.buffer.write_line("", self.theme.colors.header);
        state
            .buffer
            .write_line(&title.dark_grey().to_string(), self.theme.colors.header);
        state.buffer.flush();
    }

    fn deploying(&self, target: &str) {
        let line = format!(
            "  {} {} {}",
            self.theme.icons.pending.with(self.theme.colors.active),
            self.target_cell(target).with(self.theme.colors.target),
            "uploading".with(self.theme.colors.secondary)
        );
        self.emit(&line, false);
    }

    fn deployed(&self, target: &str, plugin: &ImportedPlugin) {
        let version = format!(
            "{: <width$}",
            plugin.version.to_string(),
            width = self.theme.layout.version_width
        );
        let line = format!(
            "  {} {} {} {}",
            self.theme.icons.success.with(self.theme.colors.success),
            self.target_cell(target).with(self.theme.colors.target),
            version.with(self.theme.colors.version),
            plugin.id.as_str().with(self.theme.colors.secondary)
        );
        self.emit(&line, false);
    }

    fn deploy_failed(&self, target: &str, reason: &str) {
        let line = format!(
            "  {} {} {}",
            self.theme.icons.error.with(self.theme.colors.error),
            self.target_cell(target).with(self.theme.colors.target),
            reason.with(self.theme.colors.error)
        );
        self.emit(&line, true);
    }

    fn info(&self, msg: &str) {
        let line = format!(
            "  {} {}",
            self.theme.icons.info.with(self.theme.colors.secondary),
            msg
        );
        self.emit(&line, false);
    }

    fn success(&self, msg: &str) {
        let line = format!(
            "  {} {}",
            self.theme.icons.success.with(self.theme.colors.success),
            msg
        );
        self.emit(&line, false);
    }

    fn warning(&self, msg: &str) {
        let line = format!(
            "  {} {}",
            self.theme.icons.warning.with(self.theme.colors.warning),
            msg.with(self.theme.colors.warning)
        );
        self.emit(&line, false);
    }

    fn error(&self, msg: &str) {
        let line = format!(
            "  {} {}",
            self.theme.icons.error.with(self.theme.colors.error),
            msg.with(self.theme.colors.error)
        );
        self.emit(&line, true);
    }

    fn summary(&self, succeeded: usize, failed: usize, elapsed_secs: f64) {
        let tally = if failed == 0 {
            format!("{succeeded} deployed").green().to_string()
        } else {
            format!("{succeeded} deployed, {failed} failed")
                .yellow()
                .to_string()
        };
        let line = format!(
            "  {} {}",
            tally,
            format!("in {elapsed_secs:.1}s").with(self.theme.colors.secondary)
        );
        let mut state = self.lock();
        state.buffer.write_line("", self.theme.colors.secondary);
        state.buffer.write_line(&line, self.theme.colors.secondary);
        state.buffer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpdev_schema::RemoteVersion;

    fn output(reporter: &ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8_lossy(reporter.lock().buffer.get_ref()).to_string()
    }

    fn plugin() -> ImportedPlugin {
        ImportedPlugin {
            id: "dpkcjmaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
            version: RemoteVersion::Text("1.2.0".to_string()),
        }
    }

    #[test]
    fn test_deployed_row_contains_target_version_and_id() {
        let reporter = ConsoleReporter::with_writer(Vec::new(), false, false);
        reporter.deployed("prod-a", &plugin());
        let out = output(&reporter);
        assert!(out.contains("prod-a"));
        assert!(out.contains("1.2.0"));
        assert!(out.contains("dpkcjmaaaaaaaaaaaaaaaaaaaaaaaaaa"));
    }

    #[test]
    fn test_quiet_keeps_errors_only() {
        let reporter = ConsoleReporter::with_writer(Vec::new(), true, false);
        reporter.info("hidden info");
        reporter.deployed("prod-a", &plugin());
        reporter.deploy_failed("prod-b", "401 unauthorized");
        let out = output(&reporter);
        assert!(!out.contains("hidden info"));
        assert!(!out.contains("prod-a"));
        assert!(out.contains("prod-b"));
        assert!(out.contains("401 unauthorized"));
    }

    #[test]
    fn test_phase_update_uses_phase_title() {
        let reporter = ConsoleReporter::with_writer(Vec::new(), false, false);
        reporter.live_phase("Signing");
        reporter.live_phase_update("done", true);
        let out = output(&reporter);
        assert_eq!(out.matches("Signing").count(), 2);
        assert!(out.contains("done"));
    }

    #[test]
    fn test_summary_counts() {
        let reporter = ConsoleReporter::with_writer(Vec::new(), false, false);
        reporter.summary(2, 1, 0.5);
        let out = output(&reporter);
        assert!(out.contains("2 deployed, 1 failed"));
        assert!(out.contains("0.5s"));
    }
}
