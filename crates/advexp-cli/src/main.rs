//! advexp - resolve adversarial-attack experiment configurations
//!
//! ## Commands
//!
//! - `resolve`: print the fully resolved, flattened configuration
//! - `validate`: check a document and overrides, print a one-line summary
//! - `digest`: print the fingerprint of the resolved configuration
//! - `show-default`: print the built-in default document
//!
//! Overrides are positional: `advexp resolve attack=pgd dataset=cifar100`.

use std::path::PathBuf;

use advexp_config::{ConfigLoader, DocumentFormat, ResolvedConfig, DEFAULT_DOCUMENT};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "advexp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve adversarial-attack experiment configurations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// Output encoding
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        output: OutputFormat,
    },

    /// Validate a configuration without printing it
    Validate {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the SHA-256 fingerprint of the resolved configuration
    Digest {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the built-in default document
    ShowDefault,
}

#[derive(Args)]
struct SourceArgs {
    /// Configuration document (default: built-in document)
    #[arg(short, long, env = "ADVEXP_CONFIG")]
    config: Option<PathBuf>,

    /// Document format (default: from file extension)
    #[arg(short, long)]
    format: Option<DocumentFormat>,

    /// Overrides: key=value, nested.key=value, +key=value, ++key=value, ~key
    #[arg(value_name = "OVERRIDE")]
    overrides: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    advexp_config::init_tracing(cli.json_logs, level);

    match cli.command {
        Commands::Resolve { source, output } => cmd_resolve(&source, output),
        Commands::Validate { source } => cmd_validate(&source),
        Commands::Digest { source } => cmd_digest(&source),
        Commands::ShowDefault => {
            print!("{}", DEFAULT_DOCUMENT);
            Ok(())
        }
    }
}

fn build_loader(source: &SourceArgs) -> Result<ConfigLoader> {
    let mut loader = match &source.config {
        Some(path) => ConfigLoader::from_path(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => ConfigLoader::embedded_default(),
    };
    if let Some(format) = source.format {
        loader = loader.with_format(format);
    }
    debug!(
        source = %loader.source_name(),
        overrides = source.overrides.len(),
        "building loader"
    );
    Ok(loader.with_overrides(source.overrides.iter().cloned()))
}

fn resolve_source(source: &SourceArgs) -> Result<ResolvedConfig> {
    let loader = build_loader(source)?;
    loader
        .resolve()
        .with_context(|| format!("Invalid configuration ({})", loader.source_name()))
}

fn cmd_resolve(source: &SourceArgs, output: OutputFormat) -> Result<()> {
    let config = resolve_source(source)?;
    println!("{}", render(&config, output)?);
    Ok(())
}

fn render(config: &ResolvedConfig, output: OutputFormat) -> Result<String> {
    let flat = config.to_flat_map()?;
    let text = match output {
        OutputFormat::Json => serde_json::to_string_pretty(&flat)?,
        OutputFormat::Yaml => serde_yaml::to_string(&flat)?.trim_end().to_string(),
    };
    Ok(text)
}

fn cmd_validate(source: &SourceArgs) -> Result<()> {
    let config = resolve_source(source)?;
    println!("{}", summary_line(&config));
    Ok(())
}

fn summary_line(config: &ResolvedConfig) -> String {
    let e = &config.experiment;
    format!(
        "OK: {} on {} ({} classes), run dir {}, device {}",
        e.attack,
        e.dataset,
        config.profile.n_classes,
        config.logging.run_dir,
        config.effective_device()
    )
}

fn cmd_digest(source: &SourceArgs) -> Result<()> {
    let config = resolve_source(source)?;
    println!("{}", config.fingerprint()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn source(overrides: &[&str]) -> SourceArgs {
        SourceArgs {
            config: None,
            format: None,
            overrides: overrides.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve_with_overrides() {
        let cli = Cli::try_parse_from([
            "advexp",
            "resolve",
            "--output",
            "json",
            "attack=pgd",
            "dataset=cifar100",
        ])
        .expect("parse");
        match cli.command {
            Commands::Resolve { source, output } => {
                assert!(output == OutputFormat::Json);
                assert_eq!(source.overrides, vec!["attack=pgd", "dataset=cifar100"]);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_parse_format_flag() {
        let cli = Cli::try_parse_from(["advexp", "validate", "--format", "toml", "-c", "x.conf"])
            .expect("parse");
        match cli.command {
            Commands::Validate { source } => {
                assert_eq!(source.format, Some(DocumentFormat::Toml));
                assert_eq!(source.config, Some(PathBuf::from("x.conf")));
            }
            _ => panic!("expected validate"),
        }
        assert!(Cli::try_parse_from(["advexp", "validate", "--format", "ini"]).is_err());
    }

    #[test]
    fn test_render_json_is_flat() {
        let config = resolve_source(&source(&["attack=pgd", "dataset=cifar100"])).unwrap();
        let text = render(&config, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["logging.run_dir"], "attack_logs/pgd/cifar100");
        assert_eq!(value["n_classes"], 100);
    }

    #[test]
    fn test_render_yaml() {
        let config = resolve_source(&source(&[])).unwrap();
        let text = render(&config, OutputFormat::Yaml).unwrap();
        assert!(text.contains("logging.run_dir: attack_logs/fgsm/cifar10"));
    }

    #[test]
    fn test_summary_line() {
        let config = resolve_source(&source(&["n_gpu=0"])).unwrap();
        let line = summary_line(&config);
        assert!(line.starts_with("OK: fgsm on cifar10 (10 classes)"));
        assert!(line.ends_with("device cpu"));
    }

    #[test]
    fn test_invalid_override_surfaces_field() {
        let err = resolve_source(&source(&["dataset=imagenet"])).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("dataset"));
        assert!(msg.contains("imagenet"));
    }
}
