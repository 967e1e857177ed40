use std::sync::Arc;
use tracing::warn;

use super::{IdentityError, IdentityProvider, VerifiedIdentity};
use crate::config::{AppConfig, ConfigError};

/// Bearer prefix trusted without a provider round trip when the development bypass is on.
pub const DEV_TOKEN_PREFIX: &str = "dev-token:";

/// Token verification in front of the identity provider.
#[derive(Clone)]
pub struct TokenVerifier {
    provider: Arc<dyn IdentityProvider>,
    dev_bypass: bool,
}

impl TokenVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>, config: &AppConfig) -> Result<Self, ConfigError> {
        let dev_bypass = config.security.dev_token_bypass;
        if dev_bypass && !config.is_development() {
            return Err(ConfigError::Misconfigured(format!(
                "development token bypass requested in {} mode",
                config.environment.as_str()
            )));
        }
        if dev_bypass {
            warn!("Development token bypass is ENABLED; '{}' bearer tokens are trusted", DEV_TOKEN_PREFIX);
        }
        Ok(Self { provider, dev_bypass })
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        if let Some(rest) = token.strip_prefix(DEV_TOKEN_PREFIX) {
            if !self.dev_bypass {
                return Err(IdentityError::InvalidToken("development token while bypass is disabled".to_string()));
            }
            return parse_dev_token(rest);
        }
        self.provider.verify_token(token).await
    }

    pub fn dev_bypass_enabled(&self) -> bool {
        self.dev_bypass
    }
}

// dev-token:<identityId>[:<email>]
fn parse_dev_token(rest: &str) -> Result<VerifiedIdentity, IdentityError> {
    let (id, email) = match rest.split_once(':') {
        Some((id, email)) => (id.trim(), email.trim().to_string()),
        None => (rest.trim(), String::new()),
    };
    if id.is_empty() {
        return Err(IdentityError::InvalidToken("development token without identity".to_string()));
    }
    let email = if email.is_empty() { format!("{}@dev.local", id) } else { email };

    Ok(VerifiedIdentity {
        id: id.to_string(),
        email,
        email_verified: true,
        display_name: None,
        phone: None,
        role_claim: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalIdentityProvider;
    use crate::config::Environment;

    fn provider() -> Arc<dyn IdentityProvider> {
        Arc::new(LocalIdentityProvider::new("secret", 60))
    }

    #[test]
    fn bypass_outside_development_is_fatal() {
        let mut config = AppConfig::for_environment(Environment::Production);
        config.security.dev_token_bypass = true;
        assert!(matches!(TokenVerifier::new(provider(), &config), Err(ConfigError::Misconfigured(_))));
    }

    #[tokio::test]
    async fn dev_tokens_only_with_bypass() {
        let mut config = AppConfig::for_environment(Environment::Development);
        let strict = TokenVerifier::new(provider(), &config).unwrap();
        assert!(matches!(strict.verify("dev-token:u1").await, Err(IdentityError::InvalidToken(_))));

        config.security.dev_token_bypass = true;
        let lax = TokenVerifier::new(provider(), &config).unwrap();
        let identity = lax.verify("dev-token:u1:u1@example.com").await.unwrap();
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.email, "u1@example.com");
        assert_eq!(lax.verify("dev-token:u2").await.unwrap().email, "u2@dev.local");
        assert!(lax.verify("dev-token:").await.is_err());
    }
}
