//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::{BufReader, Error, ErrorKind};
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Load and check a PEM certificate chain and private key.
///
/// The files are parsed up front so a bad pair fails at startup with a
/// message naming the file, rather than on the first handshake.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, Error> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
        .collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("No certificates found in {:?}", cert_path),
        ));
    }

    if rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?.is_none() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("No private key found in {:?}", key_path),
        ));
    }

    tracing::debug!(certificates = certs.len(), "TLS material loaded");
    RustlsConfig::from_pem_file(cert_path, key_path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_files_are_rejected() {
        let err = load_tls_config(
            Path::new("/nonexistent/cert.pem"),
            Path::new("/nonexistent/key.pem"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_file_without_pem_blocks_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "not a certificate").unwrap();
        std::fs::write(&key, "not a key").unwrap();

        let err = load_tls_config(&cert, &key).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
