//! Cert Proof CLI
//!
//! Hashes documents, builds field commitments for issuers, and verifies
//! certificates against their anchored metadata.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cert_proof::{
    certificate::{extract_fields, CertificateMetadata, IssuerRegistry, PdfInfo},
    config::VerifierConfig,
    core::Hash,
    proof::{
        verify::{DocumentCheck, FieldDiagnostic},
        CertificateVerificationService, CommitmentTree, FieldCommitmentInput, PairOrdering, Salt,
        SubmittedFields, VerificationReport,
    },
    VERSION,
};

/// Certificate verification toolkit.
#[derive(Parser, Debug)]
#[command(name = "cert-proof", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the SHA-256 of a document.
    Hash(HashArgs),
    /// Build a commitment root and per-field proofs.
    Commit(CommitArgs),
    /// Verify a certificate against its anchored metadata.
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct HashArgs {
    /// Document to hash.
    file: PathBuf,
    /// Compare against this hash and exit non-zero on mismatch.
    #[arg(long)]
    expected: Option<String>,
}

#[derive(Args, Debug)]
struct CommitArgs {
    /// Field as name=value. Order is leaf order.
    #[arg(long = "field", value_parser = parse_field, required = true)]
    fields: Vec<(String, String)>,
    /// Salt prefixed to every leaf message.
    #[arg(long)]
    salt: Option<String>,
    /// Pair ordering (sorted | positional).
    #[arg(long)]
    ordering: Option<PairOrdering>,
    /// Include this document's hash in the output.
    #[arg(long)]
    document: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Metadata JSON, bare or as a ledger asset response.
    #[arg(long)]
    metadata: PathBuf,
    /// Certificate PDF to hash.
    #[arg(long)]
    document: Option<PathBuf>,
    /// Decoded PDF info dictionary as JSON.
    #[arg(long)]
    pdf_info: Option<PathBuf>,
    /// Field value as name=value. Overrides extracted values.
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,
    /// Salt. Overrides an extracted salt.
    #[arg(long)]
    salt: Option<String>,
    /// Issuer registry JSON. Defaults to the built-in table.
    #[arg(long)]
    registry: Option<PathBuf>,
    /// Pair ordering (sorted | positional).
    #[arg(long)]
    ordering: Option<PairOrdering>,
    /// Date for issuer validity checks (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    today: Option<NaiveDate>,
    /// Give up after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let cli = Cli::parse();
    debug!("cert-proof v{}", VERSION);

    let config = VerifierConfig::from_env().context("invalid environment configuration")?;

    match cli.command {
        Commands::Hash(args) => run_hash(&config, args),
        Commands::Commit(args) => run_commit(&config, args),
        Commands::Verify(args) => run_verify(config, args).await,
    }
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty field name in {:?}", raw));
    }
    Ok((name.to_string(), value.to_string()))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

// =============================================================================
// HASH
// =============================================================================

fn run_hash(config: &VerifierConfig, args: HashArgs) -> Result<ExitCode> {
    let hash = config
        .document_hasher()
        .hash_file(&args.file)
        .with_context(|| format!("failed to hash {}", args.file.display()))?;

    println!("{}", hash);

    match args.expected {
        Some(expected) => {
            let expected: Hash = expected.parse().context("invalid --expected hash")?;
            if hash == expected {
                info!("Document hash matches");
                Ok(ExitCode::SUCCESS)
            } else {
                info!("Document hash mismatch, expected {}", expected);
                Ok(ExitCode::FAILURE)
            }
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

// =============================================================================
// COMMIT
// =============================================================================

fn run_commit(config: &VerifierConfig, args: CommitArgs) -> Result<ExitCode> {
    let ordering = args.ordering.unwrap_or(config.pair_ordering);
    let salt = args.salt.as_deref().and_then(Salt::parse);

    let mut seen = BTreeSet::new();
    for (name, _) in &args.fields {
        if !seen.insert(name.as_str()) {
            bail!("field {:?} given more than once", name);
        }
    }

    let leaves: Vec<Hash> = args
        .fields
        .iter()
        .map(|(name, value)| {
            FieldCommitmentInput::new(name.as_str(), value.as_str())
                .with_salt(salt.clone())
                .commitment()
        })
        .collect();

    let tree = CommitmentTree::build(&leaves, ordering).context("no fields to commit")?;

    let mut proofs = Map::new();
    for (index, (name, _)) in args.fields.iter().enumerate() {
        let proof = tree
            .proof(index)
            .with_context(|| format!("no proof for leaf {}", index))?;
        proofs.insert(format!("{}Proof", name), serde_json::to_value(proof.to_wire())?);
    }

    let mut output = Map::new();
    if let Some(path) = &args.document {
        let hash = config
            .document_hasher()
            .hash_file(path)
            .with_context(|| format!("failed to hash {}", path.display()))?;
        output.insert("hash".to_string(), json!(hash));
    }
    output.insert("rootHash".to_string(), json!(tree.root()));
    output.insert("proofs".to_string(), Value::Object(proofs));

    info!(
        "Committed {} fields under {:?} ordering (salted: {})",
        tree.leaf_count(),
        ordering,
        salt.is_some()
    );
    println!("{}", serde_json::to_string_pretty(&Value::Object(output))?);

    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// VERIFY
// =============================================================================

async fn run_verify(mut config: VerifierConfig, args: VerifyArgs) -> Result<ExitCode> {
    if let Some(ordering) = args.ordering {
        config.pair_ordering = ordering;
    }

    let metadata = CertificateMetadata::from_any_json(&read_text(&args.metadata)?)
        .with_context(|| format!("invalid metadata in {}", args.metadata.display()))?;

    let registry = match &args.registry {
        Some(path) => IssuerRegistry::from_json(&read_text(path)?)
            .with_context(|| format!("invalid issuer registry in {}", path.display()))?,
        None => IssuerRegistry::builtin(),
    };

    let mut submitted = match &args.pdf_info {
        Some(path) => {
            let pdf: PdfInfo = serde_json::from_str(&read_text(path)?)
                .with_context(|| format!("invalid PDF info in {}", path.display()))?;
            SubmittedFields::from_extracted(&extract_fields(&pdf))
        }
        None => SubmittedFields::new(),
    };
    for (name, value) in args.fields {
        submitted = submitted.with_value(name, value);
    }
    submitted = submitted.with_salt(args.salt.as_deref().and_then(Salt::parse));

    let document = match &args.document {
        Some(path) => Some(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => None,
    };

    let today = args
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let service = CertificateVerificationService::new(config);
    let verification =
        service.verify_certificate_concurrent(&registry, &metadata, &submitted, document, today);

    let report = match args.timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), verification)
            .await
            .with_context(|| format!("verification timed out after {}s", secs))??,
        None => verification.await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.is_verified() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &VerificationReport) {
    println!("Certificate {}", report.nft_id.as_deref().unwrap_or("<no id>"));

    let document = match &report.document {
        None => "not submitted".to_string(),
        Some(DocumentCheck::Evaluated(outcome)) if outcome.matched => "verified".to_string(),
        Some(DocumentCheck::Evaluated(outcome)) if outcome.identity_plausible => {
            "NOT verified (identifier matches, content differs)".to_string()
        }
        Some(DocumentCheck::Evaluated(_)) => "NOT verified".to_string(),
        Some(DocumentCheck::Failed { reason }) => format!("error: {}", reason),
    };
    println!("  document: {}", document);

    for (name, outcome) in &report.fields {
        let status = match &outcome.diagnostic {
            None if outcome.matched => "verified".to_string(),
            None => "NOT verified".to_string(),
            Some(FieldDiagnostic::MissingValue) => "no value supplied".to_string(),
            Some(FieldDiagnostic::MissingProof) => "no proof in metadata".to_string(),
            Some(FieldDiagnostic::InvalidProofFormat(detail))
            | Some(FieldDiagnostic::Encoding(detail))
            | Some(FieldDiagnostic::Failed(detail)) => format!("error: {}", detail),
        };
        println!("  {}: {}", name, status);
    }

    println!("  issuer: {}", report.issuer.message);
    println!(
        "Result: {}",
        if report.is_verified() { "VERIFIED" } else { "NOT VERIFIED" }
    );
}
