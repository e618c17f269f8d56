// src/export/signing.rs
//! Ed25519 signing of product definitions
//!
//! Keys are stored as small TOML files. A signed artifact is a gzipped tar
//! holding the definition file and a `<definition>.sig` JSON record.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use flate2::Compression;
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::Builder;
use tracing::{debug, info};

use super::Signer;
use crate::error::{Error, Result};

const ALGORITHM: &str = "ed25519";

/// Detached signature over a definition file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub algorithm: String,
    /// Base64 signature bytes
    pub signature: String,
    /// Base64 public key
    pub public_key: String,
    #[serde(default)]
    pub key_id: Option<String>,
    pub timestamp: String,
    /// Hex SHA-256 of the signed content
    pub sha256: String,
}

impl SignatureRecord {
    /// Check this record against `content`
    pub fn verify(&self, content: &[u8]) -> Result<()> {
        if self.algorithm != ALGORITHM {
            return Err(Error::SigningError(format!(
                "unsupported algorithm {}",
                self.algorithm
            )));
        }
        if hex::encode(Sha256::digest(content)) != self.sha256 {
            return Err(Error::SigningError("content digest mismatch".to_string()));
        }

        let key_bytes: [u8; 32] = BASE64
            .decode(&self.public_key)
            .map_err(|e| Error::SigningError(format!("invalid public key: {e}")))?
            .try_into()
            .map_err(|_| Error::SigningError("invalid public key length".to_string()))?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| Error::SigningError(format!("invalid public key: {e}")))?;

        let sig_bytes = BASE64
            .decode(&self.signature)
            .map_err(|e| Error::SigningError(format!("invalid signature: {e}")))?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|e| Error::SigningError(format!("invalid signature: {e}")))?;

        key.verify_strict(content, &signature)
            .map_err(|e| Error::SigningError(format!("signature does not verify: {e}")))
    }
}

/// A signing key pair
pub struct SigningKeyPair {
    signing_key: SigningKey,
    key_id: Option<String>,
}

impl SigningKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
            key_id: None,
        }
    }

    /// Set a human-readable key identifier
    pub fn with_key_id(mut self, id: &str) -> Self {
        self.key_id = Some(id.to_string());
        self
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.verifying_key().as_bytes())
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Sign content and describe the signature
    pub fn sign(&self, content: &[u8]) -> SignatureRecord {
        let signature = self.signing_key.sign(content);
        SignatureRecord {
            algorithm: ALGORITHM.to_string(),
            signature: BASE64.encode(signature.to_bytes()),
            public_key: self.public_key_base64(),
            key_id: self.key_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            sha256: hex::encode(Sha256::digest(content)),
        }
    }

    /// Save the key pair to files (private and public)
    pub fn save_to_files(&self, private_path: &Path, public_path: &Path) -> Result<()> {
        let private_data = KeyFile {
            algorithm: ALGORITHM.to_string(),
            key: BASE64.encode(self.signing_key.to_bytes()),
            key_id: self.key_id.clone(),
        };
        write_key_file(private_path, &private_data)?;

        // Set restrictive permissions on private key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(private_path, fs::Permissions::from_mode(0o600))?;
        }

        let public_data = KeyFile {
            algorithm: ALGORITHM.to_string(),
            key: self.public_key_base64(),
            key_id: self.key_id.clone(),
        };
        write_key_file(public_path, &public_data)
    }

    /// Load a key pair from a private key file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::SigningError(format!("Failed to read key file {}: {e}", path.display()))
        })?;
        let key_file: KeyFile = toml::from_str(&content).map_err(|e| {
            Error::SigningError(format!("Failed to parse key file {}: {e}", path.display()))
        })?;

        if key_file.algorithm != ALGORITHM {
            return Err(Error::SigningError(format!(
                "Unsupported key algorithm: {}",
                key_file.algorithm
            )));
        }

        let key_array: [u8; 32] = BASE64
            .decode(&key_file.key)
            .map_err(|e| Error::SigningError(format!("Invalid base64 in key file: {e}")))?
            .try_into()
            .map_err(|_| Error::SigningError("Invalid key length".to_string()))?;

        Ok(Self {
            signing_key: SigningKey::from_bytes(&key_array),
            key_id: key_file.key_id,
        })
    }
}

/// Key file format
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    algorithm: String,
    key: String,
    #[serde(default)]
    key_id: Option<String>,
}

fn write_key_file(path: &Path, key_file: &KeyFile) -> Result<()> {
    let toml = toml::to_string_pretty(key_file)
        .map_err(|e| Error::SigningError(format!("Failed to encode key: {e}")))?;
    fs::write(path, toml).map_err(|e| {
        Error::SigningError(format!("Failed to write key file {}: {e}", path.display()))
    })
}

/// Signer producing gzipped tar artifacts with an Ed25519 signature
pub struct Ed25519Signer {
    keypair: SigningKeyPair,
}

impl Ed25519Signer {
    pub fn new(keypair: SigningKeyPair) -> Self {
        Self { keypair }
    }

    pub fn from_key_file(path: &Path) -> Result<Self> {
        Ok(Self::new(SigningKeyPair::load_from_file(path)?))
    }
}

/// Ed25519 signer whose key file is read on first use
///
/// A missing or malformed key only fails the export that needs it. Load
/// failures are not cached, so a fixed key file is picked up on retry.
pub struct KeyFileSigner {
    key_path: PathBuf,
    loaded: Mutex<Option<Arc<Ed25519Signer>>>,
}

impl KeyFileSigner {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            loaded: Mutex::new(None),
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    fn signer(&self) -> Result<Arc<Ed25519Signer>> {
        let mut loaded = self.loaded.lock();
        if let Some(signer) = loaded.as_ref() {
            return Ok(signer.clone());
        }
        debug!("Loading signing key {}", self.key_path.display());
        let signer = Arc::new(Ed25519Signer::from_key_file(&self.key_path)?);
        *loaded = Some(signer.clone());
        Ok(signer)
    }
}

impl Signer for KeyFileSigner {
    fn sign(&self, xml_file: &Path, output_dir: &Path, artifact_name: &str) -> Result<PathBuf> {
        self.signer()?.sign(xml_file, output_dir, artifact_name)
    }
}

fn append_file(builder: &mut Builder<GzEncoder<File>>, name: &str, content: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(0o644);
    header.set_size(content.len() as u64);
    header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);
    header.set_cksum();
    builder
        .append_data(&mut header, name, content)
        .map_err(|e| Error::SigningError(format!("Failed to write {name}: {e}")))
}

impl Signer for Ed25519Signer {
    fn sign(&self, xml_file: &Path, output_dir: &Path, artifact_name: &str) -> Result<PathBuf> {
        let content = fs::read(xml_file).map_err(|e| {
            Error::SigningError(format!("Failed to read {}: {e}", xml_file.display()))
        })?;
        let file_name = xml_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::SigningError(format!("{} has no file name", xml_file.display()))
            })?;

        let record = self.keypair.sign(&content);
        let record_json = serde_json::to_vec_pretty(&record)
            .map_err(|e| Error::SigningError(format!("Failed to encode signature: {e}")))?;

        fs::create_dir_all(output_dir).map_err(|e| {
            Error::SigningError(format!("Failed to create {}: {e}", output_dir.display()))
        })?;
        let output = output_dir.join(format!("{artifact_name}.{}", super::ARTIFACT_EXTENSION));
        let temp_path = output.with_extension("tmp");

        let file = File::create(&temp_path).map_err(|e| {
            Error::SigningError(format!("Failed to create {}: {e}", temp_path.display()))
        })?;
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
        append_file(&mut builder, &file_name, &content)?;
        append_file(&mut builder, &format!("{file_name}.sig"), &record_json)?;
        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| Error::SigningError(format!("Failed to finish artifact: {e}")))?;

        fs::rename(&temp_path, &output).map_err(|e| {
            Error::SigningError(format!("Failed to move artifact to {}: {e}", output.display()))
        })?;

        info!("Signed {} into {}", xml_file.display(), output.display());
        Ok(output)
    }
}
