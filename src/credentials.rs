// Import necessary crates and modules
use keyring::Entry;
use log::debug;
use serde::{Deserialize, Serialize};

const KEYRING_URL_ENTRY: &str = "URL_GRADEBOOK_API";
const KEYRING_TOKEN_ENTRY: &str = "TOKEN_GRADEBOOK_API";

/// Structure to hold the credentials of the remote gradebook API.
///
/// Fields:
/// - `url_api`: Base URL of the API (e.g. `https://school.example.com/api`).
/// - `token_api`: Bearer token, if the API requires one.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct ApiCredentials {
    pub url_api: String,
    pub token_api: Option<String>,
}

// Enum to represent the source of API credentials.
enum ApiCredentialSource {
    None,                           // No credentials available
    EnvVariables(ApiCredentials),   // Credentials loaded from the environment
    SystemKeyring(ApiCredentials),  // Credentials loaded from the system's keyring
}

impl ApiCredentials {
    pub fn new(url_api: &str) -> Self {
        ApiCredentials {
            url_api: url_api.trim_end_matches('/').to_string(),
            token_api: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token_api = Some(token.to_string());
        self
    }

    // Loads the API credentials from GRADEBOOK_API_URL / GRADEBOOK_API_TOKEN.
    // The token is optional; the URL is not.
    pub fn load_credentials_from_env() -> Result<ApiCredentials, String> {
        // Check if the feature for using env credentials is enabled
        #[cfg(not(feature = "use_env_credentials"))]
        {
            return Err("Feature not enabled".to_string());
        }

        #[cfg(feature = "use_env_credentials")]
        {
            match std::env::var("GRADEBOOK_API_URL") {
                Ok(url) if !url.trim().is_empty() => {
                    log::info!("API credentials loaded from environment -> {}", url);
                    let credentials = ApiCredentials::new(url.trim());
                    Ok(match std::env::var("GRADEBOOK_API_TOKEN") {
                        Ok(token) if !token.is_empty() => credentials.with_token(&token),
                        _ => credentials,
                    })
                }
                _ => Err("Error retrieving URL from environment".to_string()),
            }
        }
    }

    /// Loads API credentials from the system's keyring.
    ///
    /// Returns:
    /// - `Ok(ApiCredentials)`: Credentials if the URL entry exists. A missing token entry is not an error.
    /// - `Err(String)`: Error message if the keyring cannot be accessed or holds no URL.
    pub fn load_credentials_from_system() -> Result<ApiCredentials, String> {
        let app_name = env!("CARGO_PKG_NAME");
        let url = Entry::new(app_name, KEYRING_URL_ENTRY)
            .and_then(|entry| entry.get_password())
            .map_err(|_| "Error retrieving URL from system".to_string())?;

        let credentials = ApiCredentials::new(&url);
        match Entry::new(app_name, KEYRING_TOKEN_ENTRY).and_then(|entry| entry.get_password()) {
            Ok(token) => Ok(credentials.with_token(&token)),
            Err(_) => {
                debug!("No API token stored in the system keyring");
                Ok(credentials)
            }
        }
    }

    /// Stores these credentials in the system's keyring for later sessions.
    pub fn store_credentials_in_system(&self) -> Result<(), String> {
        let app_name = env!("CARGO_PKG_NAME");
        Entry::new(app_name, KEYRING_URL_ENTRY)
            .and_then(|entry| entry.set_password(&self.url_api))
            .map_err(|e| format!("Error saving URL: {}", e))?;
        if let Some(token) = &self.token_api {
            Entry::new(app_name, KEYRING_TOKEN_ENTRY)
                .and_then(|entry| entry.set_password(token))
                .map_err(|e| format!("Error saving token: {}", e))?;
        }
        Ok(())
    }

    /// Tries environment variables first, then the system's keyring.
    fn load_credentials() -> ApiCredentialSource {
        match Self::load_credentials_from_env() {
            Ok(credentials) => ApiCredentialSource::EnvVariables(credentials),
            Err(_) => match Self::load_credentials_from_system() {
                Ok(credentials) => ApiCredentialSource::SystemKeyring(credentials),
                Err(_) => ApiCredentialSource::None,
            },
        }
    }

    /// Returns the configured API credentials, or `None` when the remote tier is not set up.
    pub fn discover() -> Option<ApiCredentials> {
        match Self::load_credentials() {
            ApiCredentialSource::None => None,
            ApiCredentialSource::EnvVariables(credentials)
            | ApiCredentialSource::SystemKeyring(credentials) => Some(credentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_credentials_initialization() {
        let credentials = ApiCredentials::new("https://example.com/api/").with_token("secret-token");

        assert_eq!(credentials.url_api, "https://example.com/api");
        assert_eq!(credentials.token_api.as_deref(), Some("secret-token"));
    }

    #[test]
    #[cfg(not(feature = "use_env_credentials"))]
    fn test_env_loading_requires_feature() {
        assert!(ApiCredentials::load_credentials_from_env().is_err());
    }

    #[test]
    #[cfg(feature = "use_env_credentials")]
    fn test_load_credentials_from_env() {
        use std::env;

        let url_key = "GRADEBOOK_API_URL";
        let token_key = "GRADEBOOK_API_TOKEN";
        let saved_url = env::var(url_key).ok();
        let saved_token = env::var(token_key).ok();

        env::set_var(url_key, "https://example.com");
        env::set_var(token_key, "secret-token");
        let both = ApiCredentials::load_credentials_from_env();

        env::remove_var(token_key);
        let only_url = ApiCredentials::load_credentials_from_env();

        env::remove_var(url_key);
        let none = ApiCredentials::load_credentials_from_env();

        match saved_url {
            Some(value) => env::set_var(url_key, value),
            None => env::remove_var(url_key),
        }
        if let Some(value) = saved_token {
            env::set_var(token_key, value);
        }

        assert_eq!(both.unwrap().token_api.as_deref(), Some("secret-token"));
        assert!(only_url.unwrap().token_api.is_none());
        assert!(none.is_err());
    }
}
