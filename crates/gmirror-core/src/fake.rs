//! テスト用のインメモリ Drive

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::Read;

use crate::drive::{DriveApi, RemoteFile};
use crate::{Error, Result};

/// 記録される API 呼び出し
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateFolder { name: String, parent: Option<String> },
    CreateFile { name: String, parent: String },
    UpdateFile { id: String },
    ListFiles { parent: String, name: String },
}

#[derive(Debug, Clone)]
struct Object {
    id: String,
    name: String,
    parent: Option<String>,
    content: Option<Vec<u8>>,
    trashed: bool,
}

#[derive(Default)]
pub struct FakeDrive {
    objects: RefCell<Vec<Object>>,
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u32>,
    fail_folders: Cell<bool>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// 以降のフォルダ作成を失敗させる
    pub fn fail_folder_creation(&self) {
        self.fail_folders.set(true);
    }

    /// 呼び出しを記録せずにファイルを置く
    pub fn seed_file(&self, name: &str, parent: &str, content: &[u8]) -> String {
        self.insert(name, Some(parent), Some(content.to_vec()))
    }

    pub fn trash(&self, id: &str) {
        for object in self.objects.borrow_mut().iter_mut() {
            if object.id == id {
                object.trashed = true;
            }
        }
    }

    /// ゴミ箱以外のファイル数（フォルダを除く）
    pub fn file_count(&self) -> usize {
        self.objects
            .borrow()
            .iter()
            .filter(|o| o.content.is_some() && !o.trashed)
            .count()
    }

    pub fn content_of(&self, name: &str, parent: &str) -> Option<Vec<u8>> {
        self.objects
            .borrow()
            .iter()
            .find(|o| o.name == name && o.parent.as_deref() == Some(parent) && !o.trashed)
            .and_then(|o| o.content.clone())
    }

    pub fn content_by_id(&self, id: &str) -> Option<Vec<u8>> {
        self.objects
            .borrow()
            .iter()
            .find(|o| o.id == id)
            .and_then(|o| o.content.clone())
    }

    fn insert(&self, name: &str, parent: Option<&str>, content: Option<Vec<u8>>) -> String {
        let n = self.next_id.get() + 1;
        self.next_id.set(n);

        let id = format!("id-{}", n);
        self.objects.borrow_mut().push(Object {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.map(str::to_string),
            content,
            trashed: false,
        });
        id
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

fn read_all(mut media: File) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    media.read_to_end(&mut buf)?;
    Ok(buf)
}

impl DriveApi for FakeDrive {
    fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        self.record(Call::CreateFolder {
            name: name.to_string(),
            parent: parent_id.map(str::to_string),
        });

        if self.fail_folders.get() {
            return Err(Error::Transfer("Create folder failed (403): forbidden".into()));
        }

        Ok(self.insert(name, parent_id, None))
    }

    fn create_file(&self, name: &str, parent_id: &str, media: File) -> Result<String> {
        self.record(Call::CreateFile {
            name: name.to_string(),
            parent: parent_id.to_string(),
        });

        let content = read_all(media)?;
        Ok(self.insert(name, Some(parent_id), Some(content)))
    }

    fn update_file(&self, file_id: &str, media: File) -> Result<()> {
        self.record(Call::UpdateFile {
            id: file_id.to_string(),
        });

        let content = read_all(media)?;
        let mut objects = self.objects.borrow_mut();
        let object = objects
            .iter_mut()
            .find(|o| o.id == file_id)
            .ok_or_else(|| Error::Transfer(format!("Update file failed (404): {}", file_id)))?;
        object.content = Some(content);
        Ok(())
    }

    fn list_files(&self, parent_id: &str, name: &str) -> Result<Vec<RemoteFile>> {
        self.record(Call::ListFiles {
            parent: parent_id.to_string(),
            name: name.to_string(),
        });

        Ok(self
            .objects
            .borrow()
            .iter()
            .filter(|o| o.name == name && o.parent.as_deref() == Some(parent_id) && !o.trashed)
            .map(|o| RemoteFile {
                id: o.id.clone(),
                name: o.name.clone(),
            })
            .collect())
    }
}
