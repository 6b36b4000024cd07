use crate::error::TransferError;
use std::path::{Path, PathBuf};

/// Validate a local file that is about to be uploaded
///
/// Rejects paths that do not exist and anything that is not a regular file.
/// Returns the path together with the file size.
pub fn validate_local_file(path: &Path) -> Result<(PathBuf, u64), TransferError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        TransferError::Validation(format!(
            "Failed to get file metadata for '{}': {}",
            path.display(),
            e
        ))
    })?;

    if !metadata.is_file() {
        return Err(TransferError::Validation(format!(
            "Not a regular file: {}",
            path.display()
        )));
    }

    Ok((path.to_path_buf(), metadata.len()))
}

/// Validate a bare file name used on both ends of a download
pub fn validate_file_name(file_name: &str) -> Result<(), TransferError> {
    if file_name.is_empty() || file_name == "." || file_name == ".." {
        return Err(TransferError::Validation(format!(
            "Invalid file name: '{}'",
            file_name
        )));
    }

    if file_name.contains('/') || file_name.contains('\\') {
        return Err(TransferError::Validation(format!(
            "File name must not contain path separators: '{}'",
            file_name
        )));
    }

    Ok(())
}

/// Validate a remote directory ("" means the login directory)
pub fn validate_remote_directory(remote_directory: &str) -> Result<(), TransferError> {
    if remote_directory.split('/').any(|segment| segment == "..") {
        return Err(TransferError::Validation(format!(
            "Remote directory contains '..' segment: '{}'",
            remote_directory
        )));
    }
    Ok(())
}

/// Join a remote directory and a file name with exactly one '/'
pub fn join_remote_path(remote_directory: &str, file_name: &str) -> String {
    let directory = remote_directory.trim_end_matches('/');
    if directory.is_empty() {
        if remote_directory.starts_with('/') {
            format!("/{}", file_name)
        } else {
            file_name.to_string()
        }
    } else {
        format!("{}/{}", directory, file_name)
    }
}

/// Base name of a local path as UTF-8
pub fn base_name(path: &Path) -> Result<String, TransferError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| {
            TransferError::Validation(format!("Path has no usable file name: {}", path.display()))
        })
}
