pub mod build;
pub mod error;

pub use build::{BuildOptions, build_package, load_build_config};
pub use error::BuildError;
