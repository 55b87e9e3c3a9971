//! Signed confirm/decline tokens.
//!
//! Each outbound hold offer carries two opaque HS256 tokens, one per action.
//! A token authorizes exactly one transition for one (entry, slot, tenant)
//! triple and nothing else; the handler re-checks live state, so replaying a
//! token is always safe.
//!
//! Expiry is validated against the injected clock rather than the JWT
//! library's system time, keeping the whole engine on a single time source.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use chrono::{DateTime, Utc};

use crate::common::{CoreError, CoreResult, EntryId, SlotId, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenAction {
    Confirm,
    Decline,
}

/// Claims carried by a respond token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RespondClaims {
    pub sub: String, // entry_id as string
    pub entry_id: EntryId,
    pub slot_id: SlotId,
    pub tenant_id: TenantId,
    pub action: TokenAction,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String, // unique token identifier
}

/// The confirm/decline pair rendered into one notification.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub confirm: String,
    pub decline: String,
}

impl TokenPair {
    /// sha-256 hex digest over both tokens; this is what gets persisted on
    /// the notification row.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.confirm.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.decline.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Creates and verifies respond tokens. The signing key is process-owned.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl TokenCodec {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    fn sign(
        &self,
        tenant_id: TenantId,
        entry_id: EntryId,
        slot_id: SlotId,
        action: TokenAction,
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> CoreResult<String> {
        let claims = RespondClaims {
            sub: entry_id.to_string(),
            entry_id,
            slot_id,
            tenant_id,
            action,
            exp: (now + chrono::Duration::seconds(ttl_seconds)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| CoreError::Transient(format!("token signing failed: {}", e)))
    }

    /// Sign the confirm/decline pair for one hold offer.
    pub fn sign_pair(
        &self,
        tenant_id: TenantId,
        entry_id: EntryId,
        slot_id: SlotId,
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> CoreResult<TokenPair> {
        Ok(TokenPair {
            confirm: self.sign(
                tenant_id,
                entry_id,
                slot_id,
                TokenAction::Confirm,
                now,
                ttl_seconds,
            )?,
            decline: self.sign(
                tenant_id,
                entry_id,
                slot_id,
                TokenAction::Decline,
                now,
                ttl_seconds,
            )?,
        })
    }

    /// Verify signature, issuer, action, and expiry (against `now`).
    pub fn verify(
        &self,
        token: &str,
        expected: TokenAction,
        now: DateTime<Utc>,
    ) -> CoreResult<RespondClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;

        let claims = decode::<RespondClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| CoreError::InvalidToken(e.to_string()))?;

        if claims.exp <= now.timestamp() {
            return Err(CoreError::InvalidToken("token expired".into()));
        }
        if claims.action != expected {
            return Err(CoreError::InvalidToken("wrong action for this token".into()));
        }

        Ok(claims)
    }
}
