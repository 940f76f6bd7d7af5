//! ALFA Media Share - CLI
//!
//! Command-line interface for key generation, upload encryption, reads and
//! visibility changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use alfa_media_share::crypto::{fingerprint, EncodedPublicKey};
use alfa_media_share::{
    AssetEncryptionService, AssetFile, AssetManifest, AssetReader, AssetVersionName, CancellationFlag, EncryptedAsset,
    HandleRegistry, OwnerIdentity, ProtocolSalt, ReadOutcome, ServerKeyBundle, SessionContext, ShareConfig,
    Visibility, VisibilityService,
};

#[derive(Parser)]
#[command(name = "alfa-share")]
#[command(author = "Karen Tonoyan")]
#[command(version = alfa_media_share::VERSION)]
#[command(about = "ALFA Media Share - Hybrid-encrypted media with per-recipient key wrapping")]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an identity (agreement + signing key pairs)
    Keygen {
        /// Output path
        #[arg(short, long, default_value = "identity.json")]
        out: PathBuf,
    },

    /// Publish an identity's agreement key as a server key bundle
    Bundle {
        /// Server identity
        #[arg(short, long)]
        identity: PathBuf,

        /// Protocol salt (base64)
        #[arg(short, long)]
        salt: String,

        /// Output path
        #[arg(short, long, default_value = "bundle.json")]
        out: PathBuf,
    },

    /// Encrypt an asset's versions
    Encrypt {
        /// Owner identity
        #[arg(short, long)]
        identity: PathBuf,

        /// Server key bundle
        #[arg(short, long)]
        bundle: PathBuf,

        /// Original rendition
        #[arg(long)]
        original: PathBuf,

        /// Preview rendition
        #[arg(long)]
        preview: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Decrypt one version
    Decrypt {
        /// Owner identity
        #[arg(short, long)]
        identity: PathBuf,

        /// Server key bundle
        #[arg(short, long)]
        bundle: PathBuf,

        /// Asset manifest
        #[arg(short, long)]
        manifest: PathBuf,

        /// Version name (thumbnail, preview, original)
        #[arg(long, default_value = "original", value_parser = parse_version_name)]
        version: AssetVersionName,

        /// Encrypted body
        body: PathBuf,

        /// Output path
        output: PathBuf,

        /// Read as the server, using this server identity
        #[arg(long)]
        as_server: Option<PathBuf>,
    },

    /// Change collection visibility and write the request body
    Grant {
        /// Owner identity
        #[arg(short, long)]
        identity: PathBuf,

        /// Server key bundle
        #[arg(short, long)]
        bundle: PathBuf,

        /// Target visibility (private, confidential, public)
        #[arg(long, value_parser = parse_visibility)]
        visibility: Visibility,

        /// Ask the server to delete versions left without wraps
        #[arg(long)]
        delete_orphaned: bool,

        /// Output path
        #[arg(short, long, default_value = "visibility.json")]
        out: PathBuf,

        /// Asset manifests
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
    },
}

fn parse_version_name(s: &str) -> Result<AssetVersionName, String> {
    match s.to_ascii_lowercase().as_str() {
        "thumbnail" => Ok(AssetVersionName::Thumbnail),
        "preview" => Ok(AssetVersionName::Preview),
        "original" => Ok(AssetVersionName::Original),
        other => Err(format!("unknown version '{}'", other)),
    }
}

fn parse_visibility(s: &str) -> Result<Visibility, String> {
    match s.to_ascii_lowercase().as_str() {
        "private" => Ok(Visibility::Private),
        "confidential" => Ok(Visibility::Confidential),
        "public" => Ok(Visibility::Public),
        other => Err(format!("unknown visibility '{}'", other)),
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ShareConfig> {
    let config = match path {
        Some(path) => ShareConfig::load(path)?,
        None => ShareConfig::default(),
    };
    Ok(config.apply_env()?)
}

fn open_session(identity: &Path, bundle: &Path, config: &ShareConfig) -> anyhow::Result<Arc<SessionContext>> {
    let identity = OwnerIdentity::load(identity)
        .with_context(|| format!("loading identity {}", identity.display()))?;
    let bundle = ServerKeyBundle::load(bundle).with_context(|| format!("loading bundle {}", bundle.display()))?;
    let (agreement, signing) = identity.key_pairs()?;
    Ok(Arc::new(SessionContext::open(agreement, signing, &bundle, config)?))
}

fn read_manifest(path: &Path) -> anyhow::Result<AssetManifest> {
    let data = std::fs::read(path).with_context(|| format!("reading manifest {}", path.display()))?;
    Ok(serde_json::from_slice(&data)?)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Keygen { out } => {
            println!("🔑 Generating identity...");
            let identity = OwnerIdentity::generate();
            identity.save(&out)?;
            println!("✅ Identity written to: {}", out.display());
            println!("   Agreement key: {}", fingerprint(&identity.agreement_public_key));
            println!("   Signing key:   {}", fingerprint(&identity.public_signature));
        }

        Commands::Bundle { identity, salt, out } => {
            let identity = OwnerIdentity::load(&identity)?;
            let salt = ProtocolSalt::from_base64(&salt)?;
            let bundle = ServerKeyBundle {
                public_key: EncodedPublicKey::raw(&identity.agreement_public_key),
                protocol_salt: salt.to_base64(),
            };
            bundle.import()?;
            std::fs::write(&out, serde_json::to_vec_pretty(&bundle)?)?;
            println!("✅ Server bundle written to: {}", out.display());
        }

        Commands::Encrypt {
            identity,
            bundle,
            original,
            preview,
            out_dir,
        } => {
            println!("🔐 Encrypting: {}", original.display());
            let session = open_session(&identity, &bundle, &config)?;
            let service = AssetEncryptionService::new(session.clone(), &config);

            let mut file = AssetFile::new().version(AssetVersionName::Original, std::fs::read(&original)?);
            if let Some(preview) = preview {
                file = file.version(AssetVersionName::Preview, std::fs::read(&preview)?);
            }

            let asset_id = file.id;
            let report = service.encrypt_asset(file).await;
            for failure in &report.failed {
                println!("⚠️ {}: {}", failure.unit, failure.error);
            }
            if report.succeeded.is_empty() {
                bail!("no version could be encrypted");
            }

            std::fs::create_dir_all(&out_dir)?;
            let asset = EncryptedAsset {
                id: asset_id,
                versions: report.succeeded,
            };
            for version in &asset.versions {
                let path = out_dir.join(format!("{}.{}.enc", asset.id, version.version_name));
                std::fs::write(&path, &version.encrypted_bytes)?;
                println!("   {} -> {} ({} bytes)", version.version_name, path.display(), version.encrypted_bytes.len());
            }

            let manifest_path = out_dir.join(format!("{}.manifest.json", asset.id));
            std::fs::write(&manifest_path, serde_json::to_vec_pretty(&asset.manifest())?)?;
            println!("✅ Manifest written to: {}", manifest_path.display());
        }

        Commands::Decrypt {
            identity,
            bundle,
            manifest,
            version,
            body,
            output,
            as_server,
        } => {
            println!("🔓 Decrypting {} from: {}", version, body.display());
            let session = open_session(&identity, &bundle, &config)?;
            let manifest = read_manifest(&manifest)?;
            let keys = manifest.version(version)?;
            let registry = HandleRegistry::new();

            let reader = match as_server {
                Some(server) => {
                    let (server_agreement, _) = OwnerIdentity::load(&server)?.key_pairs()?;
                    AssetReader::server(session.clone(), server_agreement, registry.clone())
                }
                None => AssetReader::owner(session.clone(), registry.clone()),
            };

            let encrypted = std::fs::read(&body)?;
            match reader.load_version(keys, encrypted, &CancellationFlag::new()).await {
                ReadOutcome::Ready(handle) => {
                    std::fs::write(&output, handle.as_bytes())?;
                    println!("✅ {} bytes written to: {}", handle.len(), output.display());
                    handle.release();
                }
                ReadOutcome::Placeholder(e) => bail!("cannot decrypt {}: {}", version, e),
                ReadOutcome::Cancelled => bail!("read cancelled"),
            }
        }

        Commands::Grant {
            identity,
            bundle,
            visibility,
            delete_orphaned,
            out,
            manifests,
        } => {
            println!("🔄 Changing visibility to {}...", visibility);
            let session = open_session(&identity, &bundle, &config)?;
            let mut loaded = manifests
                .iter()
                .map(|p| read_manifest(p))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let service = VisibilityService::new(session, &config);
            let change = service.change_visibility(&loaded, visibility, delete_orphaned).await;

            std::fs::write(&out, serde_json::to_vec_pretty(&change.dto)?)?;
            let wraps: usize = change
                .dto
                .asset_decryption_details
                .iter()
                .map(|d| d.version_decryption_details.len())
                .sum();
            println!("✅ Request written to: {}", out.display());
            println!("   Assets:  {}", change.dto.asset_decryption_details.len());
            println!("   Wraps:   {}", wraps);

            if change.apply_to(&mut loaded) > 0 {
                for (path, manifest) in manifests.iter().zip(&loaded) {
                    std::fs::write(path, serde_json::to_vec_pretty(manifest)?)?;
                }
                println!("   Manifests updated: {}", manifests.len());
            }

            if !change.failed.is_empty() {
                println!("⚠️ {} versions need a retry:", change.failed.len());
                for failure in &change.failed {
                    println!("   - {}: {}", failure.unit, failure.error);
                }
                bail!("{} versions were not granted", change.failed.len());
            }
        }
    }

    Ok(())
}
