use std::ffi::OsStr;
use std::path::Path;

use crate::Result;

/// `root` からの相対パスを `/` 区切りの Drive 上の名前に変換
pub fn relative_remote_name(path: &Path, root: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| crate::Error::InvalidPath(format!("{}: {}", path.display(), e)))?;

    let parts = relative
        .components()
        .map(|c| utf8_name(c.as_os_str(), path))
        .collect::<Result<Vec<_>>>()?;

    if parts.is_empty() {
        return Err(crate::Error::InvalidPath(format!(
            "{} is the mirror root",
            path.display()
        )));
    }

    Ok(parts.join("/"))
}

/// パスの末尾要素を Drive 上のファイル名として取得
pub fn remote_file_name(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .ok_or_else(|| crate::Error::InvalidPath(format!("{} has no file name", path.display())))?;
    utf8_name(name, path)
}

/// UTF-8 でない名前はエラー
fn utf8_name(name: &OsStr, path: &Path) -> Result<String> {
    name.to_str().map(str::to_string).ok_or_else(|| {
        crate::Error::InvalidPath(format!("{} is not valid UTF-8", path.display()))
    })
}

/// バイトサイズを人間が読みやすい形式に変換
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let unit_index = (bytes_f64.log10() / 1024_f64.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f64 / 1024_f64.powi(unit_index as i32);

    format!("{:.2} {}", size, UNITS[unit_index])
}
