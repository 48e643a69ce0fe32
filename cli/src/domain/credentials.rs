//! Single-use SSH credential pair.
//!
//! A fresh RSA key is generated for every deployment. Its public half is
//! embedded in the droplet's cloud-init payload; its private half is used for
//! exactly one SSH session and then dropped. `RsaPrivateKey` zeroizes its
//! material on drop, and nothing here is `Clone`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::RsaPrivateKey;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;

use crate::domain::error::DeployError;

/// Key algorithm name in the OpenSSH wire format.
const SSH_RSA: &str = "ssh-rsa";

/// RSA key pair plus its OpenSSH `authorized_keys` encoding.
pub struct CredentialPair {
    private_key: RsaPrivateKey,
    authorized_key: String,
}

impl CredentialPair {
    /// Modulus size used for deployments.
    pub const DEFAULT_BITS: usize = 2048;
    /// Smallest modulus accepted.
    pub const MIN_BITS: usize = 1024;

    /// Generate a key pair with [`Self::DEFAULT_BITS`].
    ///
    /// CPU-bound; call from a blocking thread inside async code.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Credential`] if key generation or encoding fails.
    pub fn generate() -> Result<Self, DeployError> {
        Self::generate_with_bits(Self::DEFAULT_BITS)
    }

    /// Generate a key pair with a modulus of `bits` bits from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Configuration`] if `bits` is below
    /// [`Self::MIN_BITS`], or [`DeployError::Credential`] if generation or
    /// encoding fails.
    pub fn generate_with_bits(bits: usize) -> Result<Self, DeployError> {
        if bits < Self::MIN_BITS {
            return Err(DeployError::Configuration(format!(
                "key size {bits} is below the {} bit minimum",
                Self::MIN_BITS
            )));
        }
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| DeployError::Credential(e.to_string()))?;
        let authorized_key = encode_authorized_key(&private_key)?;
        Ok(Self {
            private_key,
            authorized_key,
        })
    }

    /// `ssh-rsa <base64>` line for `authorized_keys` / cloud-init.
    #[must_use]
    pub fn authorized_key(&self) -> &str {
        &self.authorized_key
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.private_key.size() * 8
    }

    /// PKCS#1 PEM encoding of the private key (`RSA PRIVATE KEY`), as accepted
    /// by `ssh -i`. The returned buffer is zeroized when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Credential`] if encoding fails.
    pub fn private_key_pem(&self) -> Result<impl std::ops::Deref<Target = String>, DeployError> {
        self.private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| DeployError::Credential(e.to_string()))
    }
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("bits", &self.bits())
            .field("private_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

fn encode_authorized_key(key: &RsaPrivateKey) -> Result<String, DeployError> {
    let mut blob = Vec::new();
    put_string(&mut blob, SSH_RSA.as_bytes())?;
    put_mpint(&mut blob, &key.e().to_bytes_be())?;
    put_mpint(&mut blob, &key.n().to_bytes_be())?;
    Ok(format!("{SSH_RSA} {}", STANDARD.encode(blob)))
}

fn put_string(buf: &mut Vec<u8>, data: &[u8]) -> Result<(), DeployError> {
    let len = u32::try_from(data.len())
        .map_err(|_| DeployError::Credential("key component too large".to_string()))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

/// RFC 4251 mpint: big-endian, no redundant leading zeros, and a zero byte
/// prepended when the high bit is set so the value stays positive.
fn put_mpint(buf: &mut Vec<u8>, be_bytes: &[u8]) -> Result<(), DeployError> {
    let start = be_bytes.iter().position(|&b| b != 0).unwrap_or(be_bytes.len());
    let trimmed = &be_bytes[start..];
    if trimmed.first().is_some_and(|&b| b & 0x80 != 0) {
        let mut padded = Vec::with_capacity(trimmed.len() + 1);
        padded.push(0);
        padded.extend_from_slice(trimmed);
        put_string(buf, &padded)
    } else {
        put_string(buf, trimmed)
    }
}
