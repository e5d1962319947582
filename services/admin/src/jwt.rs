//! JWT service for token generation and validation
//!
//! Access and refresh tokens are signed with HS256 using two distinct
//! secrets, so a refresh token never validates as an access token even
//! before its `typ` claim is checked.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::TokenConfig,
    error::{AppError, AppResult},
    models::{Id, User},
};

/// Token type claim
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by every token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserClaims {
    /// Username
    pub sub: String,
    /// User id
    pub uid: Id,
    /// Role id
    pub rid: Id,
    /// Staff flag
    pub isf: bool,
    pub iss: String,
    /// Unique token id
    pub jti: String,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
    pub typ: TokenType,
}

/// Tokens handed out on login and refresh
#[derive(Debug, Clone, Serialize)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
    config: TokenConfig,
}

fn now_secs() -> AppResult<u64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs();
    Ok(now)
}

impl JwtService {
    pub fn new(config: TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Self {
            access: KeyPair::from_secret(&config.access_secret),
            refresh: KeyPair::from_secret(&config.refresh_secret),
            validation,
            config,
        }
    }

    fn keys(&self, typ: TokenType) -> &KeyPair {
        match typ {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    fn ttl(&self, typ: TokenType) -> u64 {
        match typ {
            TokenType::Access => self.config.access_ttl_secs,
            TokenType::Refresh => self.config.refresh_ttl_secs,
        }
    }

    /// Build the claims of a fresh token for `user`
    pub fn claims_for(&self, user: &User, typ: TokenType) -> AppResult<UserClaims> {
        let now = now_secs()?;
        Ok(UserClaims {
            sub: user.username.clone(),
            uid: user.id,
            rid: user.role_id,
            isf: user.is_staff,
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: now + self.ttl(typ),
            typ,
        })
    }

    fn sign(&self, claims: &UserClaims) -> AppResult<String> {
        let token = encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(claims.typ).encoding,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign token: {}", e))?;
        Ok(token)
    }

    /// Issue an access/refresh pair for `user`
    pub fn issue(&self, user: &User) -> AppResult<LoginTokens> {
        let access_token = self.sign(&self.claims_for(user, TokenType::Access)?)?;
        let refresh_token = self.sign(&self.claims_for(user, TokenType::Refresh)?)?;

        Ok(LoginTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_ttl_secs,
        })
    }

    /// Validate a token of type `typ` and return its claims
    ///
    /// Every failure maps to [`AppError::Token`].
    pub fn validate(&self, token: &str, typ: TokenType) -> AppResult<UserClaims> {
        let data = decode::<UserClaims>(token, &self.keys(typ).decoding, &self.validation)
            .map_err(|e| {
                debug!("Rejected {:?} token: {}", typ, e);
                AppError::Token
            })?;

        if data.claims.typ != typ {
            debug!("Rejected token of type {:?}, expected {:?}", data.claims.typ, typ);
            return Err(AppError::Token);
        }
        Ok(data.claims)
    }

    pub fn validate_access(&self, token: &str) -> AppResult<UserClaims> {
        self.validate(token, TokenType::Access)
    }

    pub fn validate_refresh(&self, token: &str) -> AppResult<UserClaims> {
        self.validate(token, TokenType::Refresh)
    }

    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config() -> TokenConfig {
        TokenConfig {
            issuer: "rbac-admin-test".to_string(),
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            access_ttl_secs: 600,
            refresh_ttl_secs: 3600,
        }
    }

    fn user() -> User {
        User {
            id: 12,
            username: "alice".to_string(),
            password_hash: String::new(),
            is_active: true,
            is_staff: true,
            role_id: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_validate() -> AppResult<()> {
        let service = JwtService::new(config());
        let tokens = service.issue(&user())?;
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, 600);

        let claims = service.validate_access(&tokens.access_token)?;
        assert_eq!(claims.sub, "alice");
        assert_eq!((claims.uid, claims.rid, claims.isf), (12, 3, true));
        assert_eq!(claims.iss, "rbac-admin-test");
        assert_eq!(claims.exp - claims.iat, 600);

        let refresh = service.validate_refresh(&tokens.refresh_token)?;
        assert_eq!(refresh.typ, TokenType::Refresh);
        assert_ne!(refresh.jti, claims.jti);
        Ok(())
    }

    #[test]
    fn test_token_types_are_not_interchangeable() -> AppResult<()> {
        let service = JwtService::new(config());
        let tokens = service.issue(&user())?;
        assert!(matches!(
            service.validate_access(&tokens.refresh_token),
            Err(AppError::Token)
        ));
        assert!(matches!(
            service.validate_refresh(&tokens.access_token),
            Err(AppError::Token)
        ));
        Ok(())
    }

    #[test]
    fn test_expired_token_is_rejected() -> AppResult<()> {
        let service = JwtService::new(config());
        let mut claims = service.claims_for(&user(), TokenType::Access)?;
        claims.iat -= 1200;
        claims.nbf -= 1200;
        claims.exp = claims.iat + 600;
        let token = service.sign(&claims)?;

        assert!(matches!(service.validate_access(&token), Err(AppError::Token)));
        Ok(())
    }

    #[test]
    fn test_tampered_or_foreign_tokens_are_rejected() -> AppResult<()> {
        let service = JwtService::new(config());
        let token = service.issue(&user())?.access_token;

        let mut tampered = token.clone();
        tampered.pop();
        assert!(matches!(service.validate_access(&tampered), Err(AppError::Token)));
        assert!(matches!(service.validate_access("garbage"), Err(AppError::Token)));

        let other = JwtService::new(TokenConfig {
            issuer: "someone-else".to_string(),
            ..config()
        });
        let foreign = other.issue(&user())?.access_token;
        assert!(matches!(service.validate_access(&foreign), Err(AppError::Token)));
        Ok(())
    }
}
