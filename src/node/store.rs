//! On-disk file store for a storage node
//!
//! Files live at `root/<name>`; names may contain `/`, which maps to
//! subdirectories. Listing walks the whole tree.

use crate::common::{validate_filename, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open or create the store at `root`
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_filename(name)?;
        Ok(self.root.join(name))
    }

    /// Write `data` under `name`, replacing any previous content.
    pub async fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        if !is_file(&path).await? {
            return Ok(None);
        }
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove `name`. Returns `false` if there was nothing to remove.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        if !is_file(&path).await? {
            return Ok(false);
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        // Prune directories left empty, up to (not including) the root
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.root || tokio::fs::remove_dir(d).await.is_err() {
                break;
            }
            dir = d.parent();
        }

        Ok(true)
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        is_file(&path).await
    }

    /// Every stored name, slash-separated and sorted
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(name) = self.name_of(&path) {
                        names.push(name);
                    }
                }
            }
        }

        names.sort();
        Ok(names)
    }

    fn name_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        Some(parts?.join("/"))
    }
}

async fn is_file(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        // A path component that is a regular file
        Err(e) if e.kind() == ErrorKind::NotADirectory => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.put("a.txt", b"hello").await.unwrap();
        assert_eq!(store.get("a.txt").await.unwrap().unwrap(), b"hello");
        assert!(store.exists("a.txt").await.unwrap());

        assert!(store.delete("a.txt").await.unwrap());
        assert!(!store.delete("a.txt").await.unwrap());
        assert!(store.get("a.txt").await.unwrap().is_none());
        assert!(!store.exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_nested_names() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.put("photos/2024/beach.jpg", b"jpg").await.unwrap();
        store.put("notes.md", b"md").await.unwrap();

        assert_eq!(
            store.list().await.unwrap(),
            vec!["notes.md".to_string(), "photos/2024/beach.jpg".to_string()]
        );

        // a directory is not a file
        assert!(!store.exists("photos").await.unwrap());
        assert!(store.get("photos").await.unwrap().is_none());
        assert!(!store.delete("photos/2024").await.unwrap());

        assert!(store.delete("photos/2024/beach.jpg").await.unwrap());
        assert!(!dir.path().join("photos").exists());
        assert_eq!(store.list().await.unwrap(), vec!["notes.md".to_string()]);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.put("a.txt", b"one").await.unwrap();
        store.put("a.txt", b"two").await.unwrap();
        assert_eq!(store.get("a.txt").await.unwrap().unwrap(), b"two");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("node")).await.unwrap();

        assert!(store.put("../outside", b"x").await.is_err());
        assert!(store.put("/etc/owned", b"x").await.is_err());
        assert!(!dir.path().join("outside").exists());
    }
}
