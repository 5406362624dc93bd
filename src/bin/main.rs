//! rpki-forge CLI
//!
//! Conjures demo RPKI repositories, decodes signed objects to JSON and
//! manages the repository configuration.

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use std::path::PathBuf;
use rpki_forge::{
    infra::config::{ConfigManager, ExportFormat},
    pipelines::{
        conjure::{ConjureOptions, ConjureWorkflow},
        perceive::{PerceiveOptions, PerceiveWorkflow},
        verify::VerifyWorkflow,
    },
    ContentTypeRegistry, DigestAlgorithm, ResourceCertificate, Resources,
    RouteOriginAttestation,
};

#[derive(Parser)]
#[command(name = "rpki-forge")]
#[command(about = "Build and inspect RPKI signed objects and repositories")]
#[command(long_about = "
rpki-forge - RPKI signed object engine

EXAMPLES:
    # Build a demo repository (TA, CA, ROA, Ghostbusters record)
    rpki-forge conjure --output-dir target/demo

    # Decode every signed object of a publication point
    rpki-forge perceive target/demo/repo/rpki.example.net/rpki/TA/CA/*

    # Check a ROA signature and its EE certificate
    rpki-forge verify object.roa --issuer CA.cer

ENVIRONMENT VARIABLES:
    RUST_LOG        Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a complete demo repository with a trust anchor and one CA
    Conjure {
        /// Directory receiving repo/ and tals/
        #[arg(short, long, value_name = "DIR", default_value = "target/demo")]
        output_dir: PathBuf,

        /// IP resources of the CA, comma separated prefixes or ranges
        #[arg(long, value_name = "BLOCKS")]
        ca_ip: Option<String>,

        /// AS resources of the CA, comma separated numbers or ranges
        #[arg(long, value_name = "BLOCKS")]
        ca_as: Option<String>,

        /// Origin AS of the demo ROA
        #[arg(long, value_name = "ASN")]
        roa_asid: Option<u32>,

        /// ROA prefix, `prefix[-maxlen]`; may be repeated
        #[arg(long = "roa-prefix", value_name = "PREFIX")]
        roa_prefixes: Vec<String>,

        /// Ghostbusters full name
        #[arg(long, value_name = "NAME")]
        gbr_name: Option<String>,

        /// Ghostbusters organisation
        #[arg(long, value_name = "ORG")]
        gbr_org: Option<String>,

        /// Ghostbusters email
        #[arg(long, value_name = "EMAIL")]
        gbr_email: Option<String>,

        /// Digest of the ROA and Ghostbusters envelopes
        #[arg(long, value_enum, default_value = "sha256")]
        hash: HashAlgorithmArg,
    },

    /// Decode signed objects and print them as JSON
    Perceive {
        /// Signed object files; the extension selects the content type
        #[arg(value_name = "FILES", required = true)]
        paths: Vec<PathBuf>,

        /// Write JSON to this file instead of stdout
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,

        /// Include envelope details (digest, signing time, signer)
        #[arg(long)]
        signed_data: bool,

        /// Leave out the decoded payload
        #[arg(long)]
        no_econtent: bool,
    },

    /// Verify the signature of a signed object
    Verify {
        /// Signed object to verify
        #[arg(value_name = "SIGNED_FILE")]
        file: PathBuf,

        /// DER certificate of the issuing CA, to check the EE certificate
        #[arg(short, long, value_name = "CERT")]
        issuer: Option<PathBuf>,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import configuration
    Import {
        /// Configuration file to import
        file: PathBuf,
        /// Import format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },
}

#[derive(ValueEnum, Clone)]
enum HashAlgorithmArg {
    Sha256,
    Sha384,
    Sha512,
}

impl From<HashAlgorithmArg> for DigestAlgorithm {
    fn from(arg: HashAlgorithmArg) -> Self {
        match arg {
            HashAlgorithmArg::Sha256 => DigestAlgorithm::Sha256,
            HashAlgorithmArg::Sha384 => DigestAlgorithm::Sha384,
            HashAlgorithmArg::Sha512 => DigestAlgorithm::Sha512,
        }
    }
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
        }
    }
}

/// Parameters for the conjure command
struct ConjureCommandArgs {
    output_dir: PathBuf,
    ca_ip: Option<String>,
    ca_as: Option<String>,
    roa_asid: Option<u32>,
    roa_prefixes: Vec<String>,
    gbr_name: Option<String>,
    gbr_org: Option<String>,
    gbr_email: Option<String>,
    hash: HashAlgorithmArg,
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };

    match cli.command {
        Commands::Conjure {
            output_dir,
            ca_ip,
            ca_as,
            roa_asid,
            roa_prefixes,
            gbr_name,
            gbr_org,
            gbr_email,
            hash,
        } => {
            let args = ConjureCommandArgs {
                output_dir,
                ca_ip,
                ca_as,
                roa_asid,
                roa_prefixes,
                gbr_name,
                gbr_org,
                gbr_email,
                hash,
            };
            handle_conjure_command(&config_manager, args)?;
        }

        Commands::Perceive {
            paths,
            output,
            signed_data,
            no_econtent,
        } => {
            let options = PerceiveOptions {
                signed_data,
                no_econtent,
            };
            handle_perceive_command(paths, output, options)?;
        }

        Commands::Verify { file, issuer } => {
            handle_verify_command(file, issuer)?;
        }

        Commands::Config(config_cmd) => {
            handle_config_command(&config_manager, config_cmd)?;
        }
    }

    Ok(())
}

fn handle_conjure_command(config_manager: &ConfigManager, args: ConjureCommandArgs) -> Result<()> {
    let config = config_manager.load_or_default().into_diagnostic()?;
    let mut options = ConjureOptions::demo().into_diagnostic()?;

    if args.ca_ip.is_some() || args.ca_as.is_some() {
        options.ca_resources = Resources::parse(
            args.ca_ip.as_deref().unwrap_or(""),
            args.ca_as.as_deref().unwrap_or(""),
        )
        .into_diagnostic()
        .wrap_err("Invalid CA resources")?;
    }

    if args.roa_asid.is_some() || !args.roa_prefixes.is_empty() {
        let prefixes = if args.roa_prefixes.is_empty() {
            options.roa.prefixes.clone()
        } else {
            args.roa_prefixes
                .iter()
                .map(|p| p.parse())
                .collect::<Result<Vec<_>, _>>()
                .into_diagnostic()
                .wrap_err("Invalid ROA prefix")?
        };
        options.roa = RouteOriginAttestation::new(
            args.roa_asid.unwrap_or(options.roa.as_id),
            prefixes,
        )
        .into_diagnostic()?;
    }

    if let Some(name) = args.gbr_name {
        options.gbr.full_name = name;
    }
    if let Some(org) = args.gbr_org {
        options.gbr.org = Some(org);
    }
    if let Some(email) = args.gbr_email {
        options.gbr.email = Some(email);
    }
    options.digest = args.hash.into();

    let summary = ConjureWorkflow::new(config)
        .run(&args.output_dir, &options)
        .into_diagnostic()
        .wrap_err("Failed to conjure repository")?;

    println!(
        "✅ Wrote {} repository files under {}",
        summary.files.len(),
        args.output_dir.display()
    );
    if let Some(tal) = summary.tal {
        println!("   Trust anchor locator: {}", tal.display());
    }
    Ok(())
}

fn handle_perceive_command(
    paths: Vec<PathBuf>,
    output: Option<PathBuf>,
    options: PerceiveOptions,
) -> Result<()> {
    let registry = ContentTypeRegistry::global();
    let workflow = PerceiveWorkflow::new(registry, options);

    let mut objects = Vec::new();
    for path in &paths {
        match workflow.perceive_file(path) {
            Ok(Some(json)) => objects.push(json),
            Ok(None) => {}
            Err(e) => log::error!("{}: {e}", path.display()),
        }
    }

    let content = serde_json::to_string_pretty(&objects).into_diagnostic()?;
    if let Some(output_path) = output {
        std::fs::write(&output_path, content).into_diagnostic()?;
        println!(
            "✅ Decoded {} objects to: {}",
            objects.len(),
            output_path.display()
        );
    } else {
        println!("{content}");
    }
    Ok(())
}

fn handle_verify_command(file: PathBuf, issuer: Option<PathBuf>) -> Result<()> {
    let bytes = std::fs::read(&file)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    let issuer = issuer
        .map(|path| {
            std::fs::read(&path)
                .into_diagnostic()
                .and_then(|der| ResourceCertificate::from_der(der).into_diagnostic())
                .wrap_err_with(|| format!("Failed to load issuer certificate {}", path.display()))
        })
        .transpose()?;

    let report = VerifyWorkflow::new(ContentTypeRegistry::global())
        .run(&bytes, issuer.as_ref())
        .into_diagnostic()?;

    println!("🔍 {}", file.display());
    println!("  Message digest:  {}", mark(report.digest_ok));
    println!("  Content type:    {}", mark(report.attrs_ok));
    println!("  Signature:       {}", mark(report.signature_ok));
    match report.ee_cert_ok {
        Some(ok) => println!("  EE certificate:  {}", mark(ok)),
        None => println!("  EE certificate:  not checked (no --issuer)"),
    }

    if !report.success() {
        eprintln!("❌ Verification failed");
        std::process::exit(1);
    }
    println!("✅ Signature valid");
    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "FAILED"
    }
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => match config_manager.load() {
            Ok(config) => {
                println!("📋 Current Configuration:");
                println!("  Base URI: {}", config.base_uri);
                println!("  Trust anchor: {}", config.trust_anchor_name);
                println!("  CA: {}", config.ca_name);
                println!("  Certificate validity: {} days", config.cert_validity_days);
                println!("  CRL next update: {} days", config.crl_days);
                println!("  Manifest next update: {} days", config.manifest_days);
                println!("  RSA key size: {}", config.key_bits);
                println!("  Digest algorithm: {}", config.digest_algorithm);
                println!(
                    "  Configuration file: {}",
                    config_manager.config_path().display()
                );
            }
            Err(_) => {
                println!("📋 No configuration file found. Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            let _config = config_manager.load_or_create_default().into_diagnostic()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
            println!("   Edit the file to customize settings, or use 'config set' commands.");
        }

        ConfigCommands::Set { key, value } => {
            config_manager
                .update_value(&key, &value)
                .into_diagnostic()?;
            println!("✅ Configuration updated: {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager
                .export_config(format.into())
                .into_diagnostic()?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }

        ConfigCommands::Import { file, format } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            config_manager
                .import_config(&content, format.into())
                .into_diagnostic()?;
            println!("✅ Configuration imported from: {}", file.display());
        }
    }

    Ok(())
}
