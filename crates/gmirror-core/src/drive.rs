use std::fs::File;

use serde::Deserialize;

use crate::Result;

/// Drive 上のフォルダを表す MIME タイプ
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// `files.list` が返すファイル
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
}

/// Drive API の共通インターフェース
///
/// 各メソッドは API 呼び出し 1 回にそのまま対応する。
pub trait DriveApi {
    /// フォルダを作成し、その ID を返す（同名フォルダがあっても新規作成）
    fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String>;

    /// `media` の内容でファイルを作成し、その ID を返す
    fn create_file(&self, name: &str, parent_id: &str, media: File) -> Result<String>;

    /// 既存ファイルの内容を置き換える（ID は変わらない）
    fn update_file(&self, file_id: &str, media: File) -> Result<()>;

    /// `parent_id` 直下でゴミ箱に入っていない `name` のファイル一覧
    fn list_files(&self, parent_id: &str, name: &str) -> Result<Vec<RemoteFile>>;
}

impl<T: DriveApi + ?Sized> DriveApi for &T {
    fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        (**self).create_folder(name, parent_id)
    }

    fn create_file(&self, name: &str, parent_id: &str, media: File) -> Result<String> {
        (**self).create_file(name, parent_id, media)
    }

    fn update_file(&self, file_id: &str, media: File) -> Result<()> {
        (**self).update_file(file_id, media)
    }

    fn list_files(&self, parent_id: &str, name: &str) -> Result<Vec<RemoteFile>> {
        (**self).list_files(parent_id, name)
    }
}
