use anyhow::Context;
use serde::Deserialize;

/// Which token construction the service mints and accepts.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenScheme {
    /// HS256 JWT keyed with the shared secret.
    Signed,
    /// Layered base64/hex encoding with the secret appended, kept for tokens
    /// minted by the previous service. Obfuscation only, not authenticated.
    Legacy,
}

impl TokenScheme {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "signed" | "jwt" => Some(Self::Signed),
            "legacy" => Some(Self::Legacy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub scheme: TokenScheme,
    /// Reference zone as a UTC offset, e.g. `+07:00`. `None` means local.
    pub timezone: Option<String>,
}

/// Bucket settings for the S3/MinIO backend.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Lifetime of presigned avatar links.
    pub link_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    Local { dir: String },
    S3(BucketConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub base_url: String,
    pub token: TokenConfig,
    pub storage: StorageConfig,
    /// When set, every `/v1` request must carry `X-API-KEY`.
    pub api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let secret = std::env::var("APP_KEY")?;
        anyhow::ensure!(!secret.is_empty(), "APP_KEY must not be empty");

        let scheme = match std::env::var("TOKEN_SCHEME") {
            Ok(raw) => TokenScheme::parse(&raw)
                .ok_or_else(|| anyhow::anyhow!("unknown TOKEN_SCHEME {raw:?}"))?,
            Err(_) => TokenScheme::Signed,
        };

        let token = TokenConfig {
            secret,
            scheme,
            timezone: std::env::var("TOKEN_TIMEZONE").ok(),
        };

        let storage = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".into())
            .as_str()
        {
            "s3" | "minio" => StorageConfig::S3(BucketConfig {
                endpoint: std::env::var("MINIO_ENDPOINT")?,
                bucket: std::env::var("MINIO_BUCKET")?,
                access_key: std::env::var("MINIO_ACCESS_KEY")?,
                secret_key: std::env::var("MINIO_SECRET_KEY")?,
                region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
                link_ttl_secs: match std::env::var("MINIO_LINK_TTL_SECS") {
                    Ok(raw) => raw
                        .parse()
                        .with_context(|| format!("MINIO_LINK_TTL_SECS {raw:?}"))?,
                    Err(_) => 30 * 60,
                },
            }),
            _ => StorageConfig::Local {
                dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            },
        };

        let api_key_enabled = std::env::var("ENABLE_API_KEY")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        let api_key = if api_key_enabled {
            Some(std::env::var("API_KEY")?)
        } else {
            None
        };

        Ok(Self {
            database_url,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into())
                .trim_end_matches('/')
                .to_string(),
            token,
            storage,
            api_key,
        })
    }
}
