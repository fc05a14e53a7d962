use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Result;

/// 既定のサービスアカウント鍵ファイル
pub const DEFAULT_CREDENTIALS_PATH: &str = "drive_connect/client_secrets.json";

/// 既定のアップロード先フォルダ ID
pub const DEFAULT_ROOT_FOLDER_ID: &str = "1-ZPyPcBrTt8cAJNcQJghGJZskMzbWxVh";

/// gmirror 設定
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// サービスアカウント鍵ファイルのパス（環境変数優先）
    pub credentials_path: Option<PathBuf>,
    /// `--parent` 省略時に使うフォルダ ID（環境変数優先）
    pub root_folder_id: Option<String>,
}

impl Config {
    /// 設定ファイルのパスを取得
    pub fn config_path() -> Result<PathBuf> {
        let home = env::var("HOME")
            .map_err(|_| crate::Error::Config("HOME environment variable not set".into()))?;
        Ok(PathBuf::from(home).join(".gmirror").join("config.toml"))
    }

    /// 設定を読み込み
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            crate::Error::Config(format!("Failed to read config file: {}", e))
        })?;

        Self::from_toml(&content)
    }

    /// TOML 文字列から設定をパース
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config file: {}", e)))
    }

    /// 設定を保存
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        // ディレクトリを作成
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                crate::Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::Error::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(&path, content).map_err(|e| {
            crate::Error::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// 鍵ファイルのパスを取得（環境変数 > 設定ファイル > 既定値）
    pub fn credentials_path(&self) -> PathBuf {
        self.resolve_credentials_path(|key| env::var(key).ok())
    }

    /// ルートフォルダ ID を取得（環境変数 > 設定ファイル > 既定値）
    pub fn root_folder_id(&self) -> String {
        self.resolve_root_folder_id(|key| env::var(key).ok())
    }

    fn resolve_credentials_path(&self, var: impl Fn(&str) -> Option<String>) -> PathBuf {
        var("GMIRROR_CREDENTIALS")
            .or_else(|| var("GOOGLE_APPLICATION_CREDENTIALS"))
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.credentials_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH))
    }

    fn resolve_root_folder_id(&self, var: impl Fn(&str) -> Option<String>) -> String {
        var("GMIRROR_ROOT_FOLDER")
            .filter(|v| !v.is_empty())
            .or_else(|| self.root_folder_id.clone())
            .unwrap_or_else(|| DEFAULT_ROOT_FOLDER_ID.to_string())
    }
}
