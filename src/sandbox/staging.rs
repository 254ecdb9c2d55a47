use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Random 128-bit hex token naming one session's artifacts.
pub fn new_token() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// The source file of one session, on the host and inside the container.
#[derive(Debug, Clone)]
pub struct StagedSource {
    pub host_path: PathBuf,
    pub container_path: String,
}

impl StagedSource {
    /// Write `contents` to `<dir>/<token>.<ext>`. The file must not exist yet.
    pub async fn write(
        dir: &Path,
        mount_dir: &str,
        token: &str,
        extension: &str,
        contents: &str,
    ) -> io::Result<Self> {
        let file_name = format!("{}.{}", token, extension);
        let host_path = dir.join(&file_name);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&host_path)
            .await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;

        Ok(Self {
            host_path,
            container_path: format!("{}/{}", mount_dir.trim_end_matches('/'), file_name),
        })
    }

    pub async fn remove(&self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.host_path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
