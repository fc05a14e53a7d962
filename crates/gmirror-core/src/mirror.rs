use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{drive::DriveApi, utils, Result};

/// ローカルディレクトリの絶対パス → Drive フォルダ ID
///
/// キーはシンボリックリンクを解決しない絶対パス（`std::path::absolute`）。
pub type FolderMap = HashMap<PathBuf, String>;

/// ファイルごとのアップロード方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// 常に新規作成（同名ファイルがあっても重複して作成される）
    #[default]
    Create,
    /// 同名ファイルがあれば内容を上書き、なければ新規作成
    Update,
}

/// `upload_or_update_file` の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Created(String),
    Updated(String),
}

impl UploadOutcome {
    pub fn id(&self) -> &str {
        match self {
            UploadOutcome::Created(id) | UploadOutcome::Updated(id) => id,
        }
    }
}

/// 進捗通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    FolderCreated { name: String, id: String },
    FileUploaded { name: String, id: String, size: u64 },
    FileUpdated { name: String, id: String, size: u64 },
}

/// ローカルツリーを Drive に複製する
///
/// クライアントは呼び出し側が作成して渡す。
pub struct Mirror<'a, A: DriveApi> {
    api: A,
    mode: UploadMode,
    reporter: Option<Box<dyn FnMut(&MirrorEvent) + 'a>>,
}

impl<'a, A: DriveApi> Mirror<'a, A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            mode: UploadMode::default(),
            reporter: None,
        }
    }

    /// `mirror_tree` で使うアップロード方法を指定
    pub fn with_mode(mut self, mode: UploadMode) -> Self {
        self.mode = mode;
        self
    }

    /// 進捗通知の受け取り先を指定
    pub fn with_reporter(mut self, reporter: impl FnMut(&MirrorEvent) + 'a) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    fn report(&mut self, event: MirrorEvent) {
        if let Some(reporter) = self.reporter.as_mut() {
            reporter(&event);
        }
    }

    /// `parent_id` の下にフォルダを作成
    ///
    /// 同名フォルダの有無は確認しないため、繰り返し呼ぶと同名フォルダが増える。
    pub fn ensure_remote_folder(&mut self, name: &str, parent_id: &str) -> Result<String> {
        let id = self.api.create_folder(name, Some(parent_id))?;
        info!("Created folder '{}' ({}) under {}", name, id, parent_id);

        self.report(MirrorEvent::FolderCreated {
            name: name.to_string(),
            id: id.clone(),
        });

        Ok(id)
    }

    /// ファイルを `folder_id` に新規アップロード
    pub fn upload_file(&mut self, local_path: &Path, name: &str, folder_id: &str) -> Result<String> {
        let media = File::open(local_path)?;
        let size = media.metadata()?.len();

        let id = self.api.create_file(name, folder_id, media)?;
        info!("Uploaded {} as '{}' ({})", local_path.display(), name, id);

        self.report(MirrorEvent::FileUploaded {
            name: name.to_string(),
            id: id.clone(),
            size,
        });

        Ok(id)
    }

    /// `folder_id` 直下の同名ファイルを検索（複数あれば最初の 1 件）
    pub fn find_file(&self, name: &str, folder_id: &str) -> Result<Option<String>> {
        let files = self.api.list_files(folder_id, name)?;
        if files.len() > 1 {
            debug!(
                "{} files named '{}' in {}, using the first",
                files.len(),
                name,
                folder_id
            );
        }

        Ok(files.into_iter().next().map(|f| f.id))
    }

    /// 同名ファイルがあれば上書き、なければ新規アップロード
    pub fn upload_or_update_file(
        &mut self,
        local_path: &Path,
        name: &str,
        folder_id: &str,
    ) -> Result<UploadOutcome> {
        let Some(file_id) = self.find_file(name, folder_id)? else {
            return self
                .upload_file(local_path, name, folder_id)
                .map(UploadOutcome::Created);
        };

        let media = File::open(local_path)?;
        let size = media.metadata()?.len();

        self.api.update_file(&file_id, media)?;
        info!("Updated '{}' ({}) from {}", name, file_id, local_path.display());

        self.report(MirrorEvent::FileUpdated {
            name: name.to_string(),
            id: file_id.clone(),
            size,
        });

        Ok(UploadOutcome::Updated(file_id))
    }

    /// ローカルツリーを深さ優先で辿り、フォルダとファイルを作成
    ///
    /// サブフォルダはすべて `remote_root_id` の直下に、ルートからの相対パス
    /// （`a/b` など）をそのまま名前として作成される。
    pub fn mirror_tree(&mut self, local_root: &Path, remote_root_id: &str) -> Result<FolderMap> {
        let root = std::path::absolute(local_root)?;
        if !fs::metadata(&root)?.is_dir() {
            return Err(crate::Error::InvalidPath(format!(
                "{} is not a directory",
                local_root.display()
            )));
        }

        let mut folders = FolderMap::new();
        folders.insert(root.clone(), remote_root_id.to_string());

        // 各ディレクトリ内ではファイルを先に、名前順で処理する
        let walker = WalkDir::new(&root).min_depth(1).sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        });

        for entry in walker {
            let entry = entry?;
            let path = entry.path();

            let parent = path
                .parent()
                .ok_or_else(|| crate::Error::InvalidPath(path.display().to_string()))?;
            let parent_id = folders
                .get(parent)
                .cloned()
                .ok_or_else(|| crate::Error::InvalidPath(parent.display().to_string()))?;

            if entry.file_type().is_dir() {
                let name = utils::relative_remote_name(path, &root)?;
                let id = self.ensure_remote_folder(&name, remote_root_id)?;
                folders.insert(path.to_path_buf(), id);
            } else if path.is_file() {
                let name = utils::remote_file_name(path)?;
                match self.mode {
                    UploadMode::Create => {
                        self.upload_file(path, &name, &parent_id)?;
                    }
                    UploadMode::Update => {
                        self.upload_or_update_file(path, &name, &parent_id)?;
                    }
                }
            } else {
                debug!("Skipping {} (not a regular file)", path.display());
            }
        }

        Ok(folders)
    }
}
