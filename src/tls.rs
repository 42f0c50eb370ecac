// src/tls.rs

use std::{
    fmt,
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio_rustls::{
    TlsAcceptor,
    rustls::{
        self, ServerConfig,
        pki_types::{CertificateDer, PrivateKeyDer},
    },
};

/// Reasons the server certificate cannot be loaded. All of them are fatal at startup.
#[derive(Debug)]
pub enum TlsError {
    Io { path: PathBuf, source: io::Error },
    NoCertificates(PathBuf),
    NoPrivateKey(PathBuf),
    Rustls(rustls::Error),
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsError::Io { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            TlsError::NoCertificates(path) => {
                write!(f, "no PEM certificates found in {}", path.display())
            }
            TlsError::NoPrivateKey(path) => {
                write!(f, "no PEM private key found in {}", path.display())
            }
            TlsError::Rustls(e) => write!(f, "invalid TLS configuration: {}", e),
        }
    }
}

impl std::error::Error for TlsError {}

impl From<rustls::Error> for TlsError {
    fn from(err: rustls::Error) -> Self {
        TlsError::Rustls(err)
    }
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

/// Builds the acceptor from a PEM certificate chain and a PEM private key (PKCS#1, PKCS#8
/// or SEC1). Client certificates are not requested.
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_no_client_auth()
    .with_single_cert(certs, key)?;

    tracing::info!(
        "Loaded TLS certificate from {} and key from {}",
        cert_path.display(),
        key_path.display()
    );
    Ok(TlsAcceptor::from(Arc::new(config)))
}
