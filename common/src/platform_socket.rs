use std::{
    io,
    os::unix::{
        fs::{FileTypeExt, PermissionsExt},
        net::{UnixListener, UnixStream},
    },
    path::Path,
    time::Duration,
};

/// Connect to the daemon control socket at `path`.
///
/// The socket is left in blocking mode; `timeout`, when given, becomes the
/// initial read and write timeout.
pub fn connect_socket(path: &Path, timeout: Option<Duration>) -> io::Result<UnixStream> {
    tracing::debug!("Connecting to control socket {}", path.display());

    match std::fs::metadata(path) {
        Ok(metadata) => {
            if !metadata.file_type().is_socket() {
                tracing::warn!(
                    "{} exists but is not a socket (file type: {:?})",
                    path.display(),
                    metadata.file_type()
                );
            }
            let mode = metadata.permissions().mode();
            tracing::debug!("Socket permissions: {:o}", mode);
        }
        Err(e) => {
            tracing::debug!(
                "Control socket {} is not accessible: {} (is the daemon running?)",
                path.display(),
                e
            );
        }
    }

    let stream = UnixStream::connect(path)?;
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;

    tracing::debug!("Connected to {}", path.display());
    Ok(stream)
}

/// Bind a listening socket at `path`, replacing a stale socket file left
/// behind by a previous process.
pub fn bind_socket(path: &Path) -> io::Result<UnixListener> {
    if let Ok(metadata) = std::fs::symlink_metadata(path) {
        if !metadata.file_type().is_socket() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a socket", path.display()),
            ));
        }
        tracing::warn!("Existing socket file found at {}, removing it", path.display());
        std::fs::remove_file(path)?;
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Parent directory {} does not exist", parent.display()),
            ));
        }
    }

    let listener = UnixListener::bind(path)?;
    tracing::info!("Listening on {}", path.display());
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = connect_socket(&dir.path().join("absent.sock"), None).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctl.sock");

        let first = bind_socket(&path).unwrap();
        drop(first);
        assert!(path.exists());

        let _second = bind_socket(&path).unwrap();
        let stream = connect_socket(&path, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(
            stream.read_timeout().unwrap(),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_bind_refuses_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-socket");
        std::fs::write(&path, b"data").unwrap();

        let err = bind_socket(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(path.exists());
    }
}
