pub mod build;
pub mod completions;
pub mod deploy;
pub mod keys;
pub mod verify;
