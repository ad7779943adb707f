//! JWT service for token generation and validation
//!
//! Tokens are signed with HS256 when `JWT_SECRET` is set, otherwise with
//! RS256 using the PEM key pair from `JWT_PRIVATE_KEY` / `JWT_PUBLIC_KEY`.
//! Every token carries a random `jti`, which is the blacklist key.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key material used to sign and verify tokens
#[derive(Debug, Clone)]
pub enum SigningKeys {
    Secret(String),
    Rsa {
        private_key: String,
        public_key: String,
    },
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub keys: SigningKeys,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

/// Inline PEM, or a path relative to the working directory or the crate root.
fn read_pem(var: &str) -> Result<String> {
    let value =
        std::env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))?;

    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }

    let contents = std::fs::read_to_string(&value)
        .or_else(|_| {
            let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push(&value);
            std::fs::read_to_string(path)
        })
        .map_err(|e| anyhow::anyhow!("Failed to read {} file: {}", var, e))?;
    Ok(contents.trim().to_string())
}

fn expiry_from_env(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: shared HS256 secret; takes precedence over the RSA keys
    /// - `JWT_PRIVATE_KEY` / `JWT_PUBLIC_KEY`: RS256 keys (PEM or file path)
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let keys = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => SigningKeys::Secret(secret),
            _ => SigningKeys::Rsa {
                private_key: read_pem("JWT_PRIVATE_KEY")?,
                public_key: read_pem("JWT_PUBLIC_KEY")?,
            },
        };

        Ok(JwtConfig {
            keys,
            access_token_expiry: expiry_from_env("JWT_ACCESS_TOKEN_EXPIRY", 900),
            refresh_token_expiry: expiry_from_env("JWT_REFRESH_TOKEN_EXPIRY", 604800),
        })
    }

    /// HS256 configuration with default expiries
    pub fn with_secret(secret: impl Into<String>) -> Self {
        JwtConfig {
            keys: SigningKeys::Secret(secret.into()),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        }
    }
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Unique token id
    pub jti: Uuid,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
    pub token_type: TokenType,
}

/// Access and refresh token issued together
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        let (algorithm, encoding_key, decoding_key) = match &config.keys {
            SigningKeys::Secret(secret) => (
                Algorithm::HS256,
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            SigningKeys::Rsa {
                private_key,
                public_key,
            } => (
                Algorithm::RS256,
                EncodingKey::from_rsa_pem(private_key.as_bytes())?,
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;

        Ok(JwtService {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    fn issue(&self, user_id: Uuid, token_type: TokenType, lifetime: u64) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: now,
            exp: now + lifetime as i64,
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user_id: Uuid) -> Result<String> {
        self.issue(user_id, TokenType::Access, self.config.access_token_expiry)
    }

    /// Generate a refresh token for a user
    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<String> {
        self.issue(user_id, TokenType::Refresh, self.config.refresh_token_expiry)
    }

    pub fn generate_token_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.generate_access_token(user_id)?,
            refresh_token: self.generate_refresh_token(user_id)?,
        })
    }

    /// Validate signature and expiry and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Same as [`Self::validate_token`] but also requires the given token type
    pub fn validate_token_of_type(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let claims = self.validate_token(token)?;
        if claims.token_type != expected {
            anyhow::bail!("Expected a {:?} token", expected);
        }
        Ok(claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serial_test::serial;

    pub(crate) fn test_service() -> JwtService {
        JwtService::new(JwtConfig::with_secret("test-secret-with-enough-entropy")).unwrap()
    }

    #[test]
    fn test_issued_tokens_validate_with_type_and_unique_jti() {
        let jwt = test_service();
        let user_id = Uuid::new_v4();
        let pair = jwt.generate_token_pair(user_id).unwrap();

        let access = jwt
            .validate_token_of_type(&pair.access_token, TokenType::Access)
            .unwrap();
        let refresh = jwt
            .validate_token_of_type(&pair.refresh_token, TokenType::Refresh)
            .unwrap();

        assert_eq!(access.sub, user_id);
        assert_eq!(refresh.sub, user_id);
        assert_ne!(access.jti, refresh.jti);
        assert_eq!(access.exp - access.iat, 900);
        assert_eq!(refresh.exp - refresh.iat, 604800);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let jwt = test_service();
        let access = jwt.generate_access_token(Uuid::new_v4()).unwrap();
        assert!(jwt.validate_token_of_type(&access, TokenType::Refresh).is_err());
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let ours = test_service();
        let theirs = JwtService::new(JwtConfig::with_secret("another-secret")).unwrap();
        let token = theirs.generate_access_token(Uuid::new_v4()).unwrap();

        assert!(ours.validate_token(&token).is_err());
        assert!(ours.validate_token("not.a.token").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let mut config = JwtConfig::with_secret("test-secret-with-enough-entropy");
        config.access_token_expiry = 0;
        let jwt = JwtService::new(config).unwrap();

        // issue one already past the default 60s leeway
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            jti: Uuid::new_v4(),
            iat: now - 3600,
            exp: now - 1800,
            token_type: TokenType::Access,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &jwt.encoding_key).unwrap();

        assert!(jwt.validate_token(&token).is_err());
    }

    #[test]
    #[serial]
    fn test_config_prefers_shared_secret() {
        unsafe {
            std::env::set_var("JWT_SECRET", "from-env");
            std::env::set_var("JWT_ACCESS_TOKEN_EXPIRY", "60");
            std::env::remove_var("JWT_REFRESH_TOKEN_EXPIRY");
        }

        let config = JwtConfig::from_env().unwrap();
        assert!(matches!(config.keys, SigningKeys::Secret(ref s) if s == "from-env"));
        assert_eq!(config.access_token_expiry, 60);
        assert_eq!(config.refresh_token_expiry, 604800);

        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("JWT_ACCESS_TOKEN_EXPIRY");
        }
    }
}
