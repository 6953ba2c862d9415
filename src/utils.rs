use crate::error::ObserverError;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

const STORE_DIR_NAME: &str = "sealevel_observer";

pub fn default_store_dir() -> Result<PathBuf, ObserverError> {
    dirs::data_dir()
        .map(|p| p.join(STORE_DIR_NAME))
        .ok_or_else(|| {
            ObserverError::StoreDirResolution(io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine system data directory",
            ))
        })
}

pub async fn ensure_dir_exists(path: &Path) -> Result<(), ObserverError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(ObserverError::StoreDirCreation(
                    path.to_path_buf(),
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "Store path exists but is not a directory",
                    ),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating store directory: {}", path.display());
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| ObserverError::StoreDirCreation(path.to_path_buf(), e))
        }
        Err(e) => Err(ObserverError::StoreDirCreation(path.to_path_buf(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir_exists(&nested).await.unwrap();
        assert!(nested.is_dir());
        ensure_dir_exists(&nested).await.unwrap();

        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ensure_dir_exists(&file).await,
            Err(ObserverError::StoreDirCreation(..))
        ));
    }
}
