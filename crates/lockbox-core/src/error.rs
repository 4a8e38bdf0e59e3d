use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store error: {0}")]
    CredentialStore(String),

    #[error("no key file and no recoverable backup")]
    KeyUnavailable,

    #[error(
        "master key cannot be decrypted on this device (device identity changed?) - the vault is unrecoverable here"
    )]
    DecryptionFailed,

    #[error("authentication failed (wrong key, corrupted data or tampering)")]
    AuthenticationFailed,

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("vault corrupted: {0}")]
    VaultCorrupted(String),

    #[error("{0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;
