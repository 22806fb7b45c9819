//! A directory-backed [`BlobStore`].
//!
//! Blobs live directly under a root directory as `<key>.<W>x<H>.img`, which
//! lets [`BlobStore::enumerate`] rebuild a cache index from nothing but file
//! names and metadata.  Keys must therefore be filesystem-safe; pair this
//! store with hashed keys (see
//! [`CacheConfig::hashed_keys`](crate::CacheConfig)).
//!
//! Key handling makes a best effort to stop relative-path tricks from
//! escaping the root directory, primarily as a measure to detect bugs.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::cancel::CancelToken;
use crate::index::CacheItem;
use crate::size::Size;
use crate::traits::BlobStore;

pub struct FsStore {
    root: PathBuf,
}

fn conv_path(path: impl AsRef<Path>) -> io::Result<relative_path::RelativePathBuf> {
    relative_path::RelativePathBuf::from_path(path)
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "invalid cache file name"))
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: &Path) -> io::Result<FsStore> {
        fs::create_dir_all(root)?;
        Ok(FsStore {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, item: &CacheItem) -> io::Result<PathBuf> {
        let name = format!(
            "{}.{}x{}.img",
            item.key, item.image_size.width, item.image_size.height
        );
        // Normalize through a relative path; canonicalize chokes on relative
        // segments in the middle of a path on Windows.
        let absolute = conv_path(Path::new(&name))?.to_logical_path(&self.root);
        if !absolute.starts_with(&self.root) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "key escapes the cache directory",
            ));
        }
        Ok(absolute)
    }

    fn item_from_path(path: &Path) -> Option<CacheItem> {
        let name = path.file_name()?.to_str()?;
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() != 3 || parts[2] != "img" {
            return None;
        }
        let image_size = parse_size(parts[1])?;

        let meta = fs::metadata(path).ok()?;
        let last_access = meta.modified().unwrap_or_else(|_| SystemTime::now());

        Some(CacheItem {
            key: parts[0].to_string(),
            image_size,
            size_bytes: meta.len(),
            last_access,
        })
    }
}

fn parse_size(text: &str) -> Option<Size> {
    let mut dims = text.splitn(2, 'x');
    let width: u32 = dims.next()?.parse().ok()?;
    let height: u32 = dims.next()?.parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Size::new(width, height))
}

impl BlobStore for FsStore {
    fn get(&self, item: &CacheItem) -> io::Result<Option<Vec<u8>>> {
        let path = self.blob_path(item)?;
        match fs::read(&path) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    // A truncated leftover from an interrupted write; treat
                    // as absent and clean it up.
                    let _ = fs::remove_file(&path);
                    Ok(None)
                } else {
                    Ok(Some(bytes))
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn put(&self, item: &CacheItem, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.blob_path(item)?, bytes)
    }

    fn delete(&self, item: &CacheItem) -> io::Result<()> {
        match fs::remove_file(self.blob_path(item)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn enumerate(&self, cancel: &CancelToken) -> io::Result<Vec<CacheItem>> {
        let mut items = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            if cancel.is_cancelled() {
                break;
            }

            let path = entry?.path();
            let item = match Self::item_from_path(&path) {
                Some(item) => item,
                None => continue,
            };

            if item.size_bytes == 0 {
                if let Err(err) = fs::remove_file(&path) {
                    log::debug!("could not remove empty cache file {}: {}", path.display(), err);
                }
            } else {
                items.push(item);
            }
        }
        Ok(items)
    }
}
