// ABOUTME: Developer token discovery with precedence chain
// ABOUTME: CLI flag → environment variable → config file

use crate::config::Config;
use crate::remote::Credentials;
use crate::{Error, Result};
use std::env;

pub const TOKEN_ENV_VAR: &str = "EVERNOTE_DEVELOPER_TOKEN";

pub fn resolve_token(cli_token: Option<String>, config_token: Option<&str>) -> Result<String> {
    // 1. CLI flag
    if let Some(token) = cli_token.filter(|t| !t.is_empty()) {
        return Ok(token);
    }

    // 2. Environment variable
    if let Ok(token) = env::var(TOKEN_ENV_VAR) {
        if !token.is_empty() {
            return Ok(token);
        }
    }

    // 3. Config file
    if let Some(token) = config_token.filter(|t| !t.trim().is_empty()) {
        return Ok(token.to_string());
    }

    Err(Error::Auth(format!(
        "No developer token found. Provide via --token, {} env var, or developer_token in the config file",
        TOKEN_ENV_VAR
    )))
}

pub fn credentials(config: &Config, cli_token: Option<String>) -> Result<Credentials> {
    Ok(Credentials {
        client_key: config.client_key.clone(),
        client_secret: config.client_secret.clone(),
        developer_token: resolve_token(cli_token, config.developer_token.as_deref())?,
        environment: config.environment(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_token_cli_precedence() {
        let token = resolve_token(Some("cli_token".into()), Some("file_token")).unwrap();
        assert_eq!(token, "cli_token");
    }

    // Both env cases live in one test so parallel tests never race on the variable.
    #[test]
    fn test_resolve_token_env_then_config() {
        env::set_var(TOKEN_ENV_VAR, "env_token");
        let token = resolve_token(None, Some("file_token")).unwrap();
        assert_eq!(token, "env_token");
        env::remove_var(TOKEN_ENV_VAR);

        let token = resolve_token(None, Some("file_token")).unwrap();
        assert_eq!(token, "file_token");

        let err = resolve_token(Some(String::new()), Some("  ")).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
