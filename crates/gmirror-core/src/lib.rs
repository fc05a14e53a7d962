pub mod auth;
pub mod config;
pub mod drive;
pub mod error;
pub mod gdrive;
pub mod mirror;
pub mod utils;

#[cfg(test)]
mod fake;

use std::path::Path;

pub use drive::{DriveApi, RemoteFile};
pub use error::{Error, Result};
pub use gdrive::DriveClient;
pub use mirror::{FolderMap, Mirror, MirrorEvent, UploadMode, UploadOutcome};

/// サービスアカウント鍵で認証し、Drive クライアントを作成
pub fn authenticate(credentials_path: &Path) -> Result<DriveClient> {
    DriveClient::authenticate(credentials_path)
}
