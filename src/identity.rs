//! Instance identity
//!
//! A stable digest of the local cryptographic identity, computed once per
//! running instance. Every table carries it as the partition discriminator
//! so that independent instances sharing one database never see each other's
//! rows. It plays no other role.

use crate::Result;
use std::path::Path;

/// Partition key derived from local key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    digest: String,
}

impl InstanceIdentity {
    /// Derive the identity digest from raw key material (e.g. the encoded
    /// public key of the instance)
    pub fn from_key_material(material: &[u8]) -> Self {
        InstanceIdentity {
            digest: blake3::hash(material).to_hex().to_string(),
        }
    }

    /// Derive the identity digest from a key file on disk
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let material = std::fs::read(path)?;
        Ok(Self::from_key_material(&material))
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}
