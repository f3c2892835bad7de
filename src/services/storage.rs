// On-disk blob storage for uploaded files: `{root}/{project_id}/{sanitized name}`.

use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const MAX_STORED_NAME: usize = 255;

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

/// Where a blob landed, relative and absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub stored_name: String,
    pub path: String,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write `bytes` under the project directory, never overwriting an existing blob.
    pub async fn store(&self, project_id: i64, file_name: &str, bytes: &[u8]) -> std::io::Result<StoredBlob> {
        let dir = self.root.join(project_id.to_string());
        fs::create_dir_all(&dir).await?;

        let base = sanitize_file_name(file_name);
        for n in 0u32.. {
            let candidate = numbered_name(&base, n);
            let target = dir.join(&candidate);
            let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&target).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };
            file.write_all(bytes).await?;
            file.flush().await?;

            return Ok(StoredBlob {
                stored_name: candidate,
                path: target.to_string_lossy().into_owned(),
            });
        }
        Err(std::io::Error::new(ErrorKind::Other, "no free file name"))
    }

    pub async fn read(&self, path: &str) -> std::io::Result<Vec<u8>> {
        fs::read(self.checked(path)?).await
    }

    /// Remove a blob; a blob that is already gone is not an error.
    pub async fn remove(&self, path: &str) -> std::io::Result<()> {
        match fs::remove_file(self.checked(path)?).await {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn checked(&self, path: &str) -> std::io::Result<PathBuf> {
        let path = PathBuf::from(path);
        if path.starts_with(&self.root) && !path.components().any(|c| c == std::path::Component::ParentDir) {
            Ok(path)
        } else {
            Err(std::io::Error::new(ErrorKind::PermissionDenied, "path outside storage root"))
        }
    }
}

/// Map every character outside `[A-Za-z0-9._-]` to `_` and cap the length.
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .take(MAX_STORED_NAME)
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        sanitized = "file".to_string();
    }
    sanitized
}

/// `report.pdf` -> `report_1.pdf` for n = 1; n = 0 keeps the name.
fn numbered_name(base: &str, n: u32) -> String {
    if n == 0 {
        return base.to_string();
    }
    let (stem, ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => base.split_at(idx),
        _ => (base, ""),
    };
    let suffix = format!("_{}", n);
    let keep = MAX_STORED_NAME.saturating_sub(suffix.len() + ext.len());
    let stem: String = stem.chars().take(keep).collect();
    format!("{}{}{}", stem, suffix, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("teamhub-storage-{}-{}", tag, uuid::Uuid::new_v4()))
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("my report (v2).pdf"), "my_report__v2_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name("..").as_str(), "file");
        assert_eq!(sanitize_file_name(&"a".repeat(300)).len(), 255);
    }

    #[test]
    fn numbers_before_extension() {
        assert_eq!(numbered_name("report.pdf", 0), "report.pdf");
        assert_eq!(numbered_name("report.pdf", 2), "report_2.pdf");
        assert_eq!(numbered_name("README", 1), "README_1");
        assert_eq!(numbered_name(".env", 1), ".env_1");
    }

    #[tokio::test]
    async fn store_never_overwrites() {
        let root = temp_root("dupes");
        let storage = FileStorage::new(&root);

        let first = storage.store(7, "notes.txt", b"one").await.unwrap();
        let second = storage.store(7, "notes.txt", b"two").await.unwrap();

        assert_eq!(first.stored_name, "notes.txt");
        assert_eq!(second.stored_name, "notes_1.txt");
        assert_eq!(storage.read(&first.path).await.unwrap(), b"one");
        assert_eq!(storage.read(&second.path).await.unwrap(), b"two");

        storage.remove(&first.path).await.unwrap();
        storage.remove(&first.path).await.unwrap();
        assert!(storage.read(&first.path).await.is_err());

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn refuses_paths_outside_root() {
        let storage = FileStorage::new(temp_root("escape"));
        assert!(storage.read("/etc/hostname").await.is_err());
    }
}
