//! Typed experiment schema.
//!
//! Field sets are closed: anything not listed in [`TOP_LEVEL_FIELDS`],
//! [`PROFILE_FIELDS`] or [`LOGGING_FIELDS`] is rejected by validation.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Enumerated config values with a fixed set of spellings.
pub trait ConfigEnum: Sized + Copy + 'static {
    /// Every accepted spelling, in declaration order.
    const VARIANTS: &'static [&'static str];

    fn from_name(name: &str) -> Option<Self>;

    fn as_str(&self) -> &'static str;
}

macro_rules! config_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl ConfigEnum for $name {
            const VARIANTS: &'static [&'static str] = &[$($text),+];

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

config_enum! {
    /// Model family under attack.
    pub enum ModelType { Sdim => "sdim" }
}

config_enum! {
    /// Supported datasets. Each needs a matching profile block.
    pub enum Dataset {
        Cifar10 => "cifar10",
        Cifar100 => "cifar100",
        TinyImagenet => "tiny_imagenet",
    }
}

config_enum! {
    /// Adversarial attack algorithm.
    pub enum Attack {
        Fgsm => "fgsm",
        Pgd => "pgd",
        Cw => "cw",
    }
}

config_enum! {
    pub enum Device {
        Cuda => "cuda",
        Cpu => "cpu",
    }
}

config_enum! {
    /// Log handler installed by the consuming pipeline.
    pub enum LogHandler {
        Console => "console",
        File => "file",
    }
}

config_enum! {
    pub enum LogLevel {
        Trace => "trace",
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

/// Every key allowed at the document root besides the profile blocks.
pub const TOP_LEVEL_FIELDS: &[&str] = &[
    "model_type",
    "dataset",
    "data_dir",
    "classifier_name",
    "mi_units",
    "attack",
    "targeted",
    "sample_likelihood",
    "n_batch_train",
    "n_batch_test",
    "seed",
    "n_gpu",
    "device",
    "log_dir",
    "percentile",
    "image_size",
    "image_channel",
    "logging",
];

/// Top-level fields that fall back to a default when absent or null.
pub const OPTIONAL_FIELDS: &[&str] = &["log_dir", "percentile", "image_size", "image_channel"];

pub const PROFILE_FIELDS: &[&str] = &["n_classes", "rep_size", "margin"];

pub const LOGGING_FIELDS: &[&str] = &["handlers", "level", "run_dir", "filename"];

/// Logging fields that are `${name}` templates.
pub const TEMPLATE_FIELDS: &[&str] = &["run_dir", "filename"];

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_PERCENTILE: f64 = 0.01;
pub const DEFAULT_IMAGE_SIZE: u32 = 32;
pub const DEFAULT_IMAGE_CHANNEL: u32 = 3;
pub const DEFAULT_LOG_FILENAME: &str = "${attack}.log";

/// Top-level experiment parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentConfig {
    pub model_type: ModelType,
    pub dataset: Dataset,
    pub data_dir: PathBuf,
    pub classifier_name: String,
    /// Output size of the 1x1 conv net used for mutual-information estimation.
    pub mi_units: u32,
    pub attack: Attack,
    pub targeted: bool,
    pub sample_likelihood: bool,
    pub n_batch_train: u32,
    pub n_batch_test: u32,
    pub seed: i64,
    pub n_gpu: u32,
    pub device: Device,
    /// Directory holding pretrained checkpoints.
    pub log_dir: PathBuf,
    /// Percentile of in-distribution likelihoods used as rejection threshold.
    pub percentile: f64,
    pub image_size: u32,
    pub image_channel: u32,
}

/// Dataset-specific parameters, selected by [`ExperimentConfig::dataset`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DatasetProfile {
    pub n_classes: u32,
    /// Size of the global representation produced by the encoder.
    pub rep_size: u32,
    pub margin: f64,
}

/// Log handler setup and run-directory layout.
///
/// Before resolution `run_dir` and `filename` hold templates; in a
/// [`crate::ResolvedConfig`] they hold the substituted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingRunSpec {
    pub handlers: Vec<LogHandler>,
    pub level: LogLevel,
    pub run_dir: String,
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_names_roundtrip() {
        for name in Dataset::VARIANTS {
            let ds = Dataset::from_name(name).expect("known dataset");
            assert_eq!(ds.as_str(), *name);
        }
        assert_eq!(Attack::from_name("pgd"), Some(Attack::Pgd));
        assert_eq!(Attack::from_name("PGD"), None);
        assert_eq!(Device::from_name("tpu"), None);
        assert_eq!(ModelType::VARIANTS, &["sdim"]);
    }

    #[test]
    fn test_enum_serde_uses_config_spelling() {
        let json = serde_json::to_string(&Dataset::TinyImagenet).unwrap();
        assert_eq!(json, "\"tiny_imagenet\"");
        let attack: Attack = serde_json::from_str("\"cw\"").unwrap();
        assert_eq!(attack, Attack::Cw);
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn test_every_profile_key_is_a_dataset() {
        for name in Dataset::VARIANTS {
            assert!(!TOP_LEVEL_FIELDS.contains(name));
        }
    }

    #[test]
    fn test_optional_fields_are_top_level() {
        for name in OPTIONAL_FIELDS {
            assert!(TOP_LEVEL_FIELDS.contains(name), "{name}");
        }
    }
}
