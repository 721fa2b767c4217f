//! UI Module - terminal output
//!
//! ```text
//! ┌─────────────┐
//! │   Commands  │  (build, deploy, keys, verify)
//! └──────┬──────┘
//!        │ reports through kpdev_core::Reporter
//!        ▼
//! ┌─────────────────┐
//! │ ConsoleReporter │  one lock, whole lines
//! └──────┬──────────┘
//!        │ writes via
//!        ▼
//! ┌─────────────┐
//! │ OutputBuffer│  queued crossterm commands
//! └──────┬──────┘
//!        │ styles with
//!        ▼
//! ┌─────────────┐
//! │    Theme    │  colors, icons, widths
//! └─────────────┘
//! ```

pub mod buffer;
pub mod reporter;
pub mod theme;

pub use reporter::ConsoleReporter;
pub use theme::Theme;
