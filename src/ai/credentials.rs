use crate::error::ConfigError;
use keyring::Entry;

const SERVICE_NAME: &str = "pdf-renamer";

/// Credential lookup: environment first, then the OS keychain
pub struct CredentialManager;

impl CredentialManager {
    /// Environment variable holding the key for `provider` (e.g. `OPENAI_API_KEY`)
    pub fn env_var(provider: &str) -> String {
        format!("{}_API_KEY", provider.to_uppercase())
    }

    /// Get an API key from the environment, falling back to the keychain
    pub fn get_api_key(provider: &str) -> Result<String, ConfigError> {
        Self::get_api_key_with(provider, |name| std::env::var(name).ok())
    }

    /// Same as [`Self::get_api_key`] with an injectable environment
    pub fn get_api_key_with<F>(provider: &str, lookup: F) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(&Self::env_var(provider)) {
            let key = key.trim();
            if !key.is_empty() {
                tracing::debug!("[Credentials] Using API key from environment for: {}", provider);
                return Ok(key.to_string());
            }
        }

        match Entry::new(SERVICE_NAME, provider) {
            Ok(entry) => match entry.get_password() {
                Ok(password) if !password.trim().is_empty() => {
                    tracing::debug!("[Credentials] Retrieved API key from keychain for: {}", provider);
                    return Ok(password.trim().to_string());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("[Credentials] No keychain entry for {}: {}", provider, e);
                }
            },
            Err(e) => {
                tracing::debug!("[Credentials] Keychain unavailable: {}", e);
            }
        }

        Err(ConfigError::MissingCredential(provider.to_string()))
    }
}
