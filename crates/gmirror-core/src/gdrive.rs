//! Google Drive API v3 クライアント
//!
//! `DriveApi` の実装。各メソッドは blocking な HTTP リクエスト 1 回に対応する。

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::auth::{ServiceAccountKey, TokenSource, DRIVE_SCOPE};
use crate::drive::{DriveApi, RemoteFile, FOLDER_MIME_TYPE};
use crate::{Error, Result};

const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const OCTET_STREAM: &str = "application/octet-stream";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// API 呼び出しとトークン交換で共有する HTTP クライアント
///
/// リクエスト全体のタイムアウトはなし。接続確立のみ制限する。
pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None::<Duration>)
        .build()
        .map_err(|e| Error::Auth(format!("Failed to build HTTP client: {}", e)))
}

/// 認証済みの Drive クライアント
pub struct DriveClient {
    http: Client,
    tokens: TokenSource,
}

impl DriveClient {
    /// 鍵ファイルから認証済みクライアントを作成
    ///
    /// 鍵が拒否された場合はここで `Error::Auth` になる。
    pub fn authenticate(credentials_path: &Path) -> Result<Self> {
        let key = ServiceAccountKey::from_file(credentials_path)?;
        let http = http_client()?;

        let tokens = TokenSource::new(key, DRIVE_SCOPE, http.clone());
        tokens.access_token()?;

        Ok(Self { http, tokens })
    }

    /// 認証に使ったサービスアカウント
    pub fn client_email(&self) -> &str {
        self.tokens.client_email()
    }

    fn sign(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(req.bearer_auth(self.tokens.access_token()?))
    }
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Deserialize)]
struct DriveErrorBody {
    error: DriveInnerError,
}

#[derive(Deserialize)]
struct DriveInnerError {
    message: String,
}

/// エラーレスポンスから Drive のメッセージを取り出す
fn drive_error_message(body: &str) -> String {
    serde_json::from_str::<DriveErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

fn check(resp: Response, action: &str) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    Err(Error::Transfer(format!(
        "{} failed ({}): {}",
        action,
        status,
        drive_error_message(&body)
    )))
}

/// クエリ文字列内のリテラルをエスケープ
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// `parent_id` 直下でゴミ箱にない `name` を探すクエリ
fn file_query(parent_id: &str, name: &str) -> String {
    format!(
        "'{}' in parents and name = '{}' and trashed = false",
        escape_query_value(parent_id),
        escape_query_value(name)
    )
}

/// multipart/related 形式のアップロード本文
struct MultipartRelated<R> {
    content_type: String,
    len: u64,
    reader: R,
}

fn multipart_related<R: Read>(
    metadata: &serde_json::Value,
    media: R,
    media_len: u64,
) -> MultipartRelated<impl Read> {
    let boundary = format!("gmirror-{}", Uuid::new_v4().simple());
    let head = format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
        b = boundary,
        meta = metadata,
        mime = OCTET_STREAM,
    )
    .into_bytes();
    let tail = format!("\r\n--{}--\r\n", boundary).into_bytes();

    MultipartRelated {
        content_type: format!("multipart/related; boundary={}", boundary),
        len: head.len() as u64 + media_len + tail.len() as u64,
        reader: Cursor::new(head).chain(media).chain(Cursor::new(tail)),
    }
}

impl DriveApi for DriveClient {
    #[instrument(skip(self), level = "debug")]
    fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let mut metadata = json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if let Some(parent) = parent_id {
            metadata["parents"] = json!([parent]);
        }

        let req = self
            .http
            .post(FILES_URL)
            .query(&[("fields", "id")])
            .json(&metadata);
        let resp = check(self.sign(req)?.send()?, "Create folder")?;

        let created: CreatedFile = resp.json()?;
        debug!("Created folder {} ({})", name, created.id);
        Ok(created.id)
    }

    #[instrument(skip(self, media), level = "debug")]
    fn create_file(&self, name: &str, parent_id: &str, media: File) -> Result<String> {
        let media_len = media.metadata()?.len();
        let metadata = json!({
            "name": name,
            "parents": [parent_id],
        });
        let body = multipart_related(&metadata, media, media_len);

        let req = self
            .http
            .post(UPLOAD_URL)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(reqwest::header::CONTENT_TYPE, body.content_type)
            .body(Body::sized(body.reader, body.len));
        let resp = check(self.sign(req)?.send()?, "Create file")?;

        let created: CreatedFile = resp.json()?;
        debug!("Created file {} ({}, {} bytes)", name, created.id, media_len);
        Ok(created.id)
    }

    #[instrument(skip(self, media), level = "debug")]
    fn update_file(&self, file_id: &str, media: File) -> Result<()> {
        let media_len = media.metadata()?.len();
        let url = format!("{}/{}", UPLOAD_URL, file_id);

        let req = self
            .http
            .patch(&url)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, OCTET_STREAM)
            .body(Body::sized(media, media_len));
        check(self.sign(req)?.send()?, "Update file")?;

        debug!("Updated file {} ({} bytes)", file_id, media_len);
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn list_files(&self, parent_id: &str, name: &str) -> Result<Vec<RemoteFile>> {
        let query = file_query(parent_id, name);

        let req = self.http.get(FILES_URL).query(&[
            ("q", query.as_str()),
            ("spaces", "drive"),
            ("fields", "files(id, name)"),
        ]);
        let resp = check(self.sign(req)?.send()?, "List files")?;

        let list: FileList = resp.json()?;
        debug!("Found {} file(s) named {} in {}", list.files.len(), name, parent_id);
        Ok(list.files)
    }
}
