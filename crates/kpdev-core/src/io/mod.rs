//! IO modules - side effects (network)

pub mod deploy;
