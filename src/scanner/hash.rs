use std::{
    fmt,
    fs::File,
    io::{self, Read},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::catalog::{Catalog, OPTION_HASH_ALGORITHM};

use super::ScanError;

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Content digest used for checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Digest everything `reader` yields, returning lowercase hex.
    pub fn digest_reader(self, mut reader: impl Read) -> io::Result<String> {
        let mut hasher = StreamHasher::new(self);
        let mut buffer = vec![0u8; READ_BUFFER_BYTES];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hasher.finish())
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ScanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(ScanError::UnknownHashAlgorithm(other.to_string())),
        }
    }
}

/// What to do when a file fails mid-read while hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashErrorPolicy {
    /// Abort the pass; the current page is rolled back.
    #[default]
    Fatal,
    /// Record the file as missing and keep going.
    MarkMissing,
}

/// Why a file could not be hashed.
#[derive(Debug)]
pub(crate) enum HashFailure {
    /// The file could not be opened or is no longer a regular file.
    Open(io::Error),
    /// The file was opened but reading it failed.
    Read(io::Error),
}

enum StreamHasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl StreamHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => StreamHasher::Sha256(Sha256::new()),
            HashAlgorithm::Blake3 => StreamHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            StreamHasher::Sha256(hasher) => hasher.update(bytes),
            StreamHasher::Blake3(hasher) => {
                hasher.update(bytes);
            }
        }
    }

    fn finish(self) -> String {
        match self {
            StreamHasher::Sha256(hasher) => format!("{:x}", hasher.finalize()),
            StreamHasher::Blake3(hasher) => hasher.finalize().to_hex().to_string(),
        }
    }
}

/// Stream a file through the digest.
pub(crate) fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<String, HashFailure> {
    let file = File::open(path).map_err(HashFailure::Open)?;
    let meta = file.metadata().map_err(HashFailure::Open)?;
    if !meta.is_file() {
        return Err(HashFailure::Open(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    algorithm.digest_reader(file).map_err(HashFailure::Read)
}

/// Pick the algorithm for a pass: whatever the catalog was built with, else
/// `configured`, which is then recorded so later runs stay comparable.
pub(crate) fn resolve_algorithm(
    catalog: &Catalog,
    configured: HashAlgorithm,
) -> Result<HashAlgorithm, ScanError> {
    match catalog.get_option(OPTION_HASH_ALGORITHM)? {
        Some(recorded) => recorded.parse(),
        None => {
            catalog.set_option(OPTION_HASH_ALGORITHM, configured.as_str())?;
            Ok(configured)
        }
    }
}
