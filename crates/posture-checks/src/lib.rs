//! Posture Checks - Check registry, evaluation rules, and check loader
//!
//! This crate provides:
//! - `Rule`: Declarative mapping from probe evidence to a verdict
//! - `CheckRegistry`: Ordered index of all available checks
//! - The built-in Linux catalogue
//! - A loader for user-supplied YAML check definitions

pub mod builtin;
pub mod loader;
pub mod registry;
pub mod rule;
pub mod yaml_check;

pub use registry::CheckRegistry;
pub use rule::{Alternative, Expect, Mode, Rule, WhenMissing};
pub use yaml_check::{RuleCheck, YamlCheckDefinition};
