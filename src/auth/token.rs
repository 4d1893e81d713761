//! Session tokens: an opaque bearer string carrying a user id and an
//! absolute expiry. Nothing is persisted; a token is valid until its
//! embedded expiry passes.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{macros::format_description, Duration, OffsetDateTime, UtcOffset};
use tracing::{debug, warn};

use super::claims::Claims;
use crate::config::{TokenConfig, TokenScheme};
use crate::error::{AppError, AppResult};

/// Zone used for every expiry computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone {
    offset: UtcOffset,
}

impl ReferenceZone {
    pub fn fixed(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Accepts `UTC`, `Z` or an offset such as `+07:00`. Anything else falls
    /// back to the local offset (UTC if that cannot be determined).
    pub fn resolve(raw: Option<&str>) -> Self {
        if let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) {
            if raw.eq_ignore_ascii_case("utc") || raw == "Z" {
                return Self::fixed(UtcOffset::UTC);
            }
            let fmt = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
            match UtcOffset::parse(raw, fmt) {
                Ok(offset) => return Self::fixed(offset),
                Err(e) => warn!(zone = %raw, error = %e, "unknown token zone, using local offset"),
            }
        }
        let offset = UtcOffset::current_local_offset().unwrap_or_else(|_| {
            warn!("local offset unavailable, using UTC");
            UtcOffset::UTC
        });
        Self::fixed(offset)
    }

    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    /// One calendar day from now in this zone, as a unix timestamp.
    pub fn expiry_from_now(&self) -> i64 {
        (self.now() + Duration::days(1)).unix_timestamp()
    }
}

pub trait TokenCodec: Send + Sync {
    /// Mint a token for `user_id` with an explicit expiry.
    fn encode_with_expiry(&self, user_id: i64, expires_at: i64) -> AppResult<String>;

    /// Recover the user id, failing closed on anything malformed or expired.
    fn decode(&self, token: &str) -> AppResult<i64>;

    fn zone(&self) -> ReferenceZone;

    /// Mint a token that expires one calendar day from now.
    fn encode(&self, user_id: i64) -> AppResult<String> {
        self.encode_with_expiry(user_id, self.zone().expiry_from_now())
    }
}

pub fn codec_from_config(cfg: &TokenConfig) -> Arc<dyn TokenCodec> {
    let zone = ReferenceZone::resolve(cfg.timezone.as_deref());
    match cfg.scheme {
        TokenScheme::Signed => Arc::new(SignedCodec::new(&cfg.secret, zone)),
        TokenScheme::Legacy => {
            warn!("legacy token scheme enabled; tokens are obfuscated, not signed");
            Arc::new(LegacyCodec::new(&cfg.secret, zone))
        }
    }
}

/// hex( base64( base64(payload) + secret ) + secret ), payload `"{id}&{exp}"`.
///
/// The secret is a literal suffix, not a key: anyone who knows it can forge
/// tokens. Kept only to honour tokens issued by the previous service.
#[derive(Clone)]
pub struct LegacyCodec {
    secret: String,
    zone: ReferenceZone,
}

impl LegacyCodec {
    pub fn new(secret: &str, zone: ReferenceZone) -> Self {
        Self {
            secret: secret.to_string(),
            zone,
        }
    }

    fn wrap(&self, layer: &str) -> String {
        let mut out = STANDARD.encode(layer);
        out.push_str(&self.secret);
        out
    }

    fn unwrap_layer(&self, layer: &str) -> AppResult<String> {
        let body = layer
            .strip_suffix(self.secret.as_str())
            .ok_or(AppError::InvalidTokenFormat)?;
        let raw = STANDARD
            .decode(body)
            .map_err(|_| AppError::InvalidTokenFormat)?;
        String::from_utf8(raw).map_err(|_| AppError::InvalidTokenFormat)
    }
}

impl TokenCodec for LegacyCodec {
    fn encode_with_expiry(&self, user_id: i64, expires_at: i64) -> AppResult<String> {
        let payload = format!("{user_id}&{expires_at}");
        let token = self.wrap(&self.wrap(&payload));
        debug!(user_id, expires_at, "legacy token minted");
        Ok(hex::encode(token))
    }

    fn decode(&self, token: &str) -> AppResult<i64> {
        let bytes = hex::decode(token.trim()).map_err(|_| AppError::InvalidTokenFormat)?;
        let outer = String::from_utf8(bytes).map_err(|_| AppError::InvalidTokenFormat)?;
        let inner = self.unwrap_layer(&outer)?;
        let payload = self.unwrap_layer(&inner)?;

        let (user_id, expires_at) = payload
            .split_once('&')
            .ok_or(AppError::InvalidTokenFormat)?;
        let expires_at: i64 = expires_at
            .parse()
            .map_err(|_| AppError::InvalidTokenFormat)?;
        if expires_at < self.zone.now().unix_timestamp() {
            return Err(AppError::InvalidTokenFormat);
        }
        user_id.parse().map_err(|_| AppError::InvalidTokenFormat)
    }

    fn zone(&self) -> ReferenceZone {
        self.zone
    }
}

/// HS256 JWT keyed with the shared secret.
#[derive(Clone)]
pub struct SignedCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    zone: ReferenceZone,
}

impl SignedCodec {
    pub fn new(secret: &str, zone: ReferenceZone) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            zone,
        }
    }
}

impl TokenCodec for SignedCodec {
    fn encode_with_expiry(&self, user_id: i64, expires_at: i64) -> AppResult<String> {
        let claims = Claims {
            sub: user_id,
            iat: self.zone.now().unix_timestamp(),
            exp: expires_at,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AppError::internal)?;
        debug!(user_id, expires_at, "signed token minted");
        Ok(token)
    }

    fn decode(&self, token: &str) -> AppResult<i64> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token.trim(), &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            AppError::InvalidTokenFormat
        })?;
        Ok(data.claims.sub)
    }

    fn zone(&self) -> ReferenceZone {
        self.zone
    }
}
