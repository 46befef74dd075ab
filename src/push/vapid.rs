use base64::{URL_SAFE_NO_PAD, encode_config};
use jwt_simple::prelude::ES256KeyPair;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::store::{StoreError, atomic_write};
use crate::types::push::VapidConfig;

use std::io::ErrorKind;
use std::path::Path;

pub const VAPID_FILE: &str = "vapid.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidCredentials {
    pub public_key: String,
    pub private_key: String,
}

#[derive(Debug, Clone)]
pub(crate) enum VapidConfigStatus {
    Missing,
    Incomplete,
    Ready(VapidConfig),
}

#[derive(Debug, thiserror::Error)]
pub enum VapidError {
    #[error("failed to generate VAPID keys: {0}")]
    Generate(#[from] web_push::WebPushError),
    #[error("failed to persist VAPID keys: {0}")]
    Store(#[from] StoreError),
    #[error("failed to read VAPID keys: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid VAPID key file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Keys passed explicitly on the command line or through the environment.
pub(crate) fn load_vapid_config(config: &config::AppConfig) -> VapidConfigStatus {
    let private_key = config.vapid_private_key.as_ref();
    let public_key = config.vapid_public_key.as_ref();

    match (private_key, public_key) {
        (Some(private_key), Some(public_key)) => VapidConfigStatus::Ready(VapidConfig {
            private_key: private_key.clone(),
            public_key: public_key.clone(),
            subject: config.vapid_subject.clone(),
        }),
        (None, None) => VapidConfigStatus::Missing,
        _ => VapidConfigStatus::Incomplete,
    }
}

/// Resolves the process-wide key pair: explicit configuration wins, otherwise
/// the pair persisted in the data directory is used, generating it on first
/// start. Returns `None` when push must stay disabled.
pub(crate) fn resolve_vapid_config(config: &config::AppConfig) -> Option<VapidConfig> {
    match load_vapid_config(config) {
        VapidConfigStatus::Ready(vapid) => Some(vapid),
        VapidConfigStatus::Incomplete => {
            tracing::warn!("push notifications disabled: incomplete VAPID configuration");
            None
        }
        VapidConfigStatus::Missing => {
            let path = config.data_dir.join(VAPID_FILE);
            match load_or_generate(&path) {
                Ok(credentials) => Some(VapidConfig {
                    private_key: credentials.private_key,
                    public_key: credentials.public_key,
                    subject: config.vapid_subject.clone(),
                }),
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "push notifications disabled");
                    None
                }
            }
        }
    }
}

pub(crate) fn load_or_generate(path: &Path) -> Result<VapidCredentials, VapidError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => return Ok(serde_json::from_str(&contents)?),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let credentials = generate_vapid_credentials()?;
    let contents = serde_json::to_string_pretty(&credentials).map_err(StoreError::from)?;
    atomic_write(path, &contents).map_err(StoreError::from)?;
    tracing::info!(path = %path.display(), "generated new VAPID key pair");
    Ok(credentials)
}

pub fn generate_vapid_credentials() -> Result<VapidCredentials, web_push::WebPushError> {
    let mut rng = OsRng;
    generate_vapid_credentials_with_rng(&mut rng)
}

pub(crate) fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<VapidCredentials, web_push::WebPushError> {
    let key_pair = generate_es256_keypair_with_rng(rng);
    let private_key = encode_config(key_pair.to_bytes(), URL_SAFE_NO_PAD);
    let public_key =
        web_push::VapidSignatureBuilder::from_base64_no_sub(&private_key, URL_SAFE_NO_PAD)?
            .get_public_key();
    let public_key = encode_config(public_key, URL_SAFE_NO_PAD);

    Ok(VapidCredentials {
        public_key,
        private_key,
    })
}

fn generate_es256_keypair_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> ES256KeyPair {
    let mut key_bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut key_bytes);
        if let Ok(key_pair) = ES256KeyPair::from_bytes(&key_bytes) {
            return key_pair;
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::store::create_temp_dir;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generate_vapid_credentials_with_rng__should_be_deterministic_for_seed() {
        // Given
        let mut first_rng = StdRng::from_seed([7u8; 32]);
        let mut second_rng = StdRng::from_seed([7u8; 32]);

        // When
        let first = generate_vapid_credentials_with_rng(&mut first_rng).expect("first");
        let second = generate_vapid_credentials_with_rng(&mut second_rng).expect("second");

        // Then
        assert_eq!(first, second);
        // Uncompressed P-256 point: 65 bytes, 87 base64url characters.
        assert_eq!(first.public_key.len(), 87);
        assert_eq!(first.private_key.len(), 43);
    }

    #[test]
    fn load_or_generate__should_persist_and_reuse_keys() {
        // Given
        let root = create_temp_dir("vapid-persist");
        let path = root.join(VAPID_FILE);

        // When
        let generated = load_or_generate(&path).expect("generate");
        let reloaded = load_or_generate(&path).expect("reload");

        // Then
        assert_eq!(generated, reloaded);
        let stored = std::fs::read_to_string(&path).expect("read vapid.json");
        assert!(stored.contains("\"publicKey\""));
        assert!(stored.contains("\"privateKey\""));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn load_vapid_config__should_report_incomplete_for_partial_keys() {
        let config = config::AppConfig {
            vapid_private_key: Some("private".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            load_vapid_config(&config),
            VapidConfigStatus::Incomplete
        ));
    }

    #[test]
    fn resolve_vapid_config__should_prefer_explicit_keys() {
        // Given
        let root = create_temp_dir("vapid-explicit");
        let config = config::AppConfig {
            data_dir: root.clone(),
            vapid_private_key: Some("private".to_string()),
            vapid_public_key: Some("public".to_string()),
            ..Default::default()
        };

        // When
        let vapid = resolve_vapid_config(&config).expect("vapid");

        // Then
        assert_eq!(vapid.public_key, "public");
        assert!(!root.join(VAPID_FILE).exists());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }
}
