use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use fwgen_compiler::components::builtin_registry;
use fwgen_compiler::config::CONFIG_FILE;
use fwgen_compiler::substitutions;
use fwgen_compiler::{compile, validate, writer, CodegenConfig, ComponentKind, ComponentRegistry};
use fwgen_diagnostics::ValidationReport;
use fwgen_value::Document;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fwgen")]
#[command(version = "0.2.0")]
#[command(about = "Firmware configuration compiler", long_about = None)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Set a substitution variable, overriding the document (repeatable)
    #[arg(
        short = 's',
        long = "substitution",
        global = true,
        num_args = 2,
        value_names = ["KEY", "VALUE"],
        action = clap::ArgAction::Append
    )]
    substitution: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration without writing anything
    Validate {
        /// Input YAML file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate and generate the firmware sources
    Compile {
        /// Input YAML file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory (default: from fwgen.json, else ./build)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Output diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the validated configuration with every default filled in
    Config {
        /// Input YAML file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// List the known component kinds, or show one in detail
    Components {
        /// Kind name such as `uart` or `sensor.ltr501`
        #[arg(value_name = "KIND")]
        kind: Option<String>,
    },

    /// Write a default fwgen.json
    Init {
        /// Project directory (default: current directory)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let registry = builtin_registry().context("built-in component catalog is inconsistent")?;
    let overrides: Vec<(String, String)> = cli
        .substitution
        .chunks_exact(2)
        .filter_map(|pair| match pair {
            [key, value] => Some((key.clone(), value.clone())),
            _ => None,
        })
        .collect();

    match cli.command {
        Commands::Validate { input, json } => {
            let config = project_config(&input)?;
            let document = load(&input, &overrides)?;
            let report = validate(&document, &registry);
            if report.has_errors() {
                return fail(&report, json || config.json_diagnostics);
            }
            if !json {
                println!("{} {} is valid", "✓".green(), input.display());
            }
            Ok(())
        }

        Commands::Compile {
            input,
            output,
            json,
        } => {
            let mut config = project_config(&input)?;
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            let json = json || config.json_diagnostics;

            let document = load(&input, &overrides)?;
            let compilation = match compile(&document, &registry) {
                Ok(compilation) => compilation,
                Err(report) => return fail(&report, json),
            };

            let changed = writer::write(&compilation.output, &config)?;
            if !json {
                for path in &changed {
                    println!("   {} {}", "wrote".green(), path.display());
                }
                println!(
                    "{} {} instance(s), {} statement(s), {} librar{}",
                    "✓".green(),
                    compilation.order.len(),
                    compilation.output.statements().len(),
                    compilation.output.libraries().len(),
                    if compilation.output.libraries().len() == 1 {
                        "y"
                    } else {
                        "ies"
                    }
                );
            }
            Ok(())
        }

        Commands::Config { input } => {
            project_config(&input)?;
            let document = load(&input, &overrides)?;
            let compilation = match compile(&document, &registry) {
                Ok(compilation) => compilation,
                Err(report) => return fail(&report, false),
            };
            let validated = compilation.session.to_document(&registry);
            print!("{}", serde_yaml::to_string(&validated)?);
            Ok(())
        }

        Commands::Components { kind } => match kind {
            Some(name) => {
                let Some(kind) = registry.get(&name) else {
                    anyhow::bail!("unknown component kind '{}'", name);
                };
                print_kind(kind);
                Ok(())
            }
            None => {
                print_catalog(&registry);
                Ok(())
            }
        },

        Commands::Init { path } => {
            let dir = path.unwrap_or_else(|| PathBuf::from("."));
            let target = dir.join(CONFIG_FILE);
            if target.exists() {
                anyhow::bail!("{} already exists", target.display());
            }
            std::fs::create_dir_all(&dir)?;
            CodegenConfig::default().save(&target)?;
            println!("{} created {}", "✓".green(), target.display());
            Ok(())
        }
    }
}

fn load(input: &Path, overrides: &[(String, String)]) -> Result<Document> {
    log::info!("loading {}", input.display());
    let mut document =
        Document::load(input).with_context(|| format!("cannot load {}", input.display()))?;
    substitutions::add_overrides(&mut document, overrides);
    Ok(document)
}

/// fwgen.json next to the input, or in any parent directory
fn project_config(input: &Path) -> Result<CodegenConfig> {
    let dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let config = CodegenConfig::from_dir(dir)?;
    if !config.color {
        colored::control::set_override(false);
    }
    Ok(config)
}

fn fail(report: &ValidationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        report.print_all();
        report.print_summary();
    }
    Err(anyhow::anyhow!(
        "configuration is invalid ({} error(s))",
        report.error_count()
    ))
}

fn print_catalog(registry: &ComponentRegistry) {
    println!("{}", "Components".bold());
    for kind in registry.kinds().filter(|k| k.platform().is_none()) {
        println!("  {}{}", kind.name, flags(kind));
    }
    for domain in registry.domains() {
        println!("{}", format!("{}:", domain).bold());
        for platform in registry.platforms(domain) {
            let name = format!("{}.{}", domain, platform);
            let suffix = registry.get(&name).map(flags).unwrap_or_default();
            println!("  {}{}", platform, suffix);
        }
    }
}

fn flags(kind: &ComponentKind) -> String {
    let mut parts = Vec::new();
    if kind.core {
        parts.push("core".to_string());
    }
    if kind.multi_conf && kind.platform().is_none() {
        parts.push("multi".to_string());
    }
    if !kind.depends_on.is_empty() {
        parts.push(format!("depends on {}", kind.depends_on.join(", ")));
    }
    if !kind.auto_load.is_empty() {
        parts.push(format!("loads {}", kind.auto_load.join(", ")));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join("; ")).dimmed().to_string()
    }
}

fn print_kind(kind: &ComponentKind) {
    println!("{}{}", kind.name.bold(), flags(kind));
    if !kind.code_owners.is_empty() {
        println!("  code owners: {}", kind.code_owners.join(", "));
    }
    println!("  schema: {}", kind.schema.describe());
}
