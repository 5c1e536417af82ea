use sha2::{Digest, Sha256};

use super::UploadError;

/// Lowercase hex SHA-256 of the full content.
pub fn fingerprint_blocking(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hashes on the blocking pool so large uploads never stall the executor.
pub async fn fingerprint(bytes: &[u8]) -> Result<String, UploadError> {
    let data = bytes.to_vec();
    tokio::task::spawn_blocking(move || fingerprint_blocking(&data))
        .await
        .map_err(|e| UploadError::Fingerprint(e.to_string()))
}
