//! Two-party signing from the command line
//!
//! Workflows, documents and signer identities live under a data directory
//! (default `cosign_data/`). Identities are generated on first use and
//! written as PEM so later invocations sign with the same keys.
//!
//! Usage:
//!   cosign create <input.pdf> <fields.json> [--data-dir DIR] [--config FILE]
//!   cosign sign <workflow-id> <A|B> [--value name=value]... [--lock name]...
//!   cosign show <workflow-id>
//!   cosign list
//!   cosign download <workflow-id> <output.pdf>
//!   cosign verify <workflow-id>

use pdf_cosign::config::{CosignConfig, IdentityConfig, PemPaths};
use pdf_cosign::identity::{self_signed, IdentityProvider};
use pdf_cosign::workflow::{
    write_atomic, FieldSpec, FsDocumentStore, FsWorkflowRepository, SignerRole, Workflow,
    WorkflowId, WorkflowService,
};
use pdf_cosign::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

struct CliArgs {
    command: String,
    positional: Vec<String>,
    data_dir: PathBuf,
    config: Option<PathBuf>,
    values: BTreeMap<String, String>,
    locks: BTreeSet<String>,
}

impl CliArgs {
    fn from_args() -> std::result::Result<Self, String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut command = None;
        let mut positional = Vec::new();
        let mut data_dir = PathBuf::from("cosign_data");
        let mut config = None;
        let mut values = BTreeMap::new();
        let mut locks = BTreeSet::new();

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--data-dir" => {
                    data_dir = PathBuf::from(iter.next().ok_or("--data-dir needs a path")?);
                },
                "--config" => {
                    config = Some(PathBuf::from(iter.next().ok_or("--config needs a path")?));
                },
                "--value" => {
                    let pair = iter.next().ok_or("--value needs name=value")?;
                    let (name, value) = pair
                        .split_once('=')
                        .ok_or_else(|| format!("expected name=value, got '{}'", pair))?;
                    values.insert(name.to_string(), value.to_string());
                },
                "--lock" => {
                    locks.insert(iter.next().ok_or("--lock needs a field name")?);
                },
                "--help" | "-h" => {
                    command = Some("help".to_string());
                },
                _ if command.is_none() => command = Some(arg),
                _ => positional.push(arg),
            }
        }

        Ok(Self {
            command: command.unwrap_or_else(|| "help".to_string()),
            positional,
            data_dir,
            config,
            values,
            locks,
        })
    }

    fn arg(&self, index: usize, what: &str) -> Result<&str> {
        self.positional
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidArgument(format!("missing argument: {}", what)))
    }

    fn workflow_id(&self) -> Result<WorkflowId> {
        let raw = self.arg(0, "workflow id")?;
        raw.parse()
            .map_err(|e| Error::InvalidArgument(format!("bad workflow id '{}': {}", raw, e)))
    }
}

fn print_usage() {
    println!("Usage:");
    println!("  cosign create <input.pdf> <fields.json> [--data-dir DIR] [--config FILE]");
    println!("  cosign sign <workflow-id> <A|B> [--value name=value]... [--lock name]...");
    println!("  cosign show <workflow-id>");
    println!("  cosign list");
    println!("  cosign download <workflow-id> <output.pdf>");
    println!("  cosign verify <workflow-id>");
}

/// Point every role without configured PEM paths at files under
/// `<data-dir>/identities`, generating them if they are missing.
fn ensure_identities(identity: &mut IdentityConfig, data_dir: &Path) -> Result<()> {
    let dir = data_dir.join("identities");
    std::fs::create_dir_all(&dir)?;

    for role in SignerRole::ALL {
        if identity.persisted.contains_key(&role) {
            continue;
        }
        let stem = format!("signer_{}", role.to_string().to_ascii_lowercase());
        let paths = PemPaths {
            certificate: dir.join(format!("{}.crt.pem", stem)),
            private_key: dir.join(format!("{}.key.pem", stem)),
        };
        if !paths.certificate.exists() || !paths.private_key.exists() {
            let credentials = self_signed(
                role.display_name(),
                &identity.organization,
                identity.key_bits,
                identity.validity_days,
            )?;
            let (cert_pem, key_pem) = credentials.to_pem()?;
            write_atomic(&paths.certificate, cert_pem.as_bytes())?;
            write_atomic(&paths.private_key, key_pem.as_bytes())?;
            println!("Generated identity for signer {} in {}", role, dir.display());
        }
        identity.persisted.insert(role, paths);
    }
    Ok(())
}

fn build_service(args: &CliArgs) -> Result<WorkflowService> {
    let mut config = match &args.config {
        Some(path) => CosignConfig::from_file(path)?,
        None => CosignConfig::default(),
    };
    ensure_identities(&mut config.identity, &args.data_dir)?;

    let identities = Arc::new(IdentityProvider::from_config(&config.identity)?);
    let documents = Arc::new(FsDocumentStore::new(args.data_dir.join("documents"))?);
    let workflows = Arc::new(FsWorkflowRepository::new(args.data_dir.join("workflows"))?);
    Ok(WorkflowService::from_config(&config, identities, documents, workflows))
}

fn print_workflow(workflow: &Workflow) {
    println!("Workflow:  {}", workflow.id);
    println!("File:      {}", workflow.filename);
    println!("Status:    {}", workflow.status);
    println!("Created:   {}", workflow.created_at.to_rfc3339());
    println!("Updated:   {}", workflow.updated_at.to_rfc3339());
    println!("Fields:");
    for field in &workflow.fields {
        println!(
            "  {:<20} {:<9} signer {}  page {}  value {}",
            field.name,
            format!("{:?}", field.kind),
            field.role,
            field.page,
            field.value.as_deref().unwrap_or("-")
        );
    }
    if !workflow.signatures.is_empty() {
        println!("Signatures:");
        for signature in &workflow.signatures {
            println!(
                "  {} by {} at {}",
                signature.role,
                signature.signer_name,
                signature.signing_time.to_rfc3339()
            );
        }
    }
}

fn run(args: &CliArgs) -> Result<()> {
    match args.command.as_str() {
        "create" => {
            let input = args.arg(0, "input pdf")?;
            let fields_path = args.arg(1, "fields json")?;
            let document = std::fs::read(input)?;
            let fields: Vec<FieldSpec> =
                serde_json::from_slice(&std::fs::read(fields_path)?).map_err(|e| {
                    Error::InvalidArgument(format!("bad field list {}: {}", fields_path, e))
                })?;

            let service = build_service(args)?;
            let filename = Path::new(input)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| input.to_string());
            let workflow = service.create_workflow(&filename, &document, fields)?;
            print_workflow(&workflow);
        },
        "sign" => {
            let id = args.workflow_id()?;
            let role: SignerRole = args
                .arg(1, "signer role")?
                .parse()
                .map_err(Error::InvalidArgument)?;
            let service = build_service(args)?;
            let workflow = service.sign_workflow(id, role, &args.values, &args.locks)?;
            print_workflow(&workflow);
        },
        "show" => {
            let service = build_service(args)?;
            print_workflow(&service.get_workflow(args.workflow_id()?)?);
        },
        "list" => {
            let service = build_service(args)?;
            for workflow in service.list_workflows()? {
                println!("{}  {:<18} {}", workflow.id, workflow.status, workflow.filename);
            }
        },
        "download" => {
            let id = args.workflow_id()?;
            let output = args.arg(1, "output pdf")?;
            let service = build_service(args)?;
            let bytes = service.download_document(id)?;
            std::fs::write(output, &bytes)?;
            println!("Wrote {} bytes to {}", bytes.len(), output);
        },
        "verify" => {
            let service = build_service(args)?;
            let results = service.verify_workflow(args.workflow_id()?)?;
            if results.is_empty() {
                println!("No signatures");
            }
            for result in results {
                let info = &result.signature_info;
                println!(
                    "{}: {:?} (signer {}, whole document: {})",
                    info.field_name,
                    result.status,
                    info.certificate_cn.as_deref().unwrap_or("?"),
                    info.covers_whole_document
                );
                for message in &result.messages {
                    println!("    {}", message);
                }
            }
        },
        _ => print_usage(),
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args = match CliArgs::from_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            process::exit(2);
        },
    };

    if let Err(e) = run(&args) {
        eprintln!("Error [{:?}]: {}", e.category(), e);
        process::exit(1);
    }
}
