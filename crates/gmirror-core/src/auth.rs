//! サービスアカウント認証
//!
//! 鍵ファイルの秘密鍵で RS256 の JWT を署名し、Google のトークンエンドポイントで
//! アクセストークンと交換する。トークンは期限切れ 5 分前まで使い回す。

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// Drive 全体への読み書き権限
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// サービスアカウント鍵ファイル（JSON）のうち使用するフィールド
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    /// 鍵ファイルを読み込み
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Auth(format!(
                "Failed to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    /// JSON 文字列から鍵をパース
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Auth(format!("Malformed service account key: {}", e)))
    }

    /// トークン交換用の署名済みアサーションを作成
    fn assertion(&self, scope: &str, now: DateTime<Utc>) -> Result<String> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| Error::Auth(format!("Invalid private key: {}", e)))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let claims = Claims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| Error::Auth(format!("Failed to sign assertion: {}", e)))
    }
}

/// `expires_in` 秒後の時刻（範囲外なら不正なレスポンスとして扱う）
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            Error::Auth(format!(
                "Malformed token response: expires_in out of range ({})",
                expires_in
            ))
        })
}

/// キャッシュ済みトークン
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::minutes(5)
    }
}

/// アクセストークンの取得と再取得を受け持つ
pub struct TokenSource {
    key: ServiceAccountKey,
    scope: String,
    http: Client,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(key: ServiceAccountKey, scope: &str, http: Client) -> Self {
        Self {
            key,
            scope: scope.to_string(),
            http,
            cache: Mutex::new(None),
        }
    }

    /// サービスアカウントのメールアドレス
    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// 有効なアクセストークンを返す（必要なら再取得）
    pub fn access_token(&self) -> Result<String> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Auth("Token cache lock poisoned".into()))?;

        if let Some(cached) = cache.as_ref() {
            if !cached.is_expired_at(Utc::now()) {
                return Ok(cached.access_token.clone());
            }
            debug!("Access token for {} expired, refreshing", self.key.client_email);
        }

        let fresh = self.exchange()?;
        let token = fresh.access_token.clone();
        *cache = Some(fresh);

        Ok(token)
    }

    fn exchange(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .map_err(|e| Error::Auth(format!("Token request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(Error::Auth(format!(
                "Credentials for {} rejected ({}): {}",
                self.key.client_email, status, body
            )));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let token: TokenResponse = resp
            .json()
            .map_err(|e| Error::Auth(format!("Malformed token response: {}", e)))?;

        let expires_at = expiry_after(now, token.expires_in)?;
        info!(
            "Obtained access token for {}, expires at {}",
            self.key.client_email,
            expires_at.to_rfc3339()
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        self.key.assertion(&self.scope, now)
    }
}
