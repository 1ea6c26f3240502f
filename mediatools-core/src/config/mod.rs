//! Configuration module for mediatools.
//!
//! Manages provisioner settings loaded from JSON.

mod settings;

pub use settings::{ProvisionerConfig, APP_DIR_NAME, BIN_DIR_NAME};
