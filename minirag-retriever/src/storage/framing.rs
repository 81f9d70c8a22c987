//! On-disk framing shared by the index and checkpoint files.
//!
//! Every file starts with a 4-byte magic identifying its type and a little-endian `u32`
//! format version, followed by a `bincode` payload in the standard configuration. Decoding
//! caps the memory a payload may claim, so a corrupt length prefix is an error rather than a
//! giant allocation. Files are
//! replaced atomically: the new contents go to a sibling temp file which is then renamed over
//! the target, so readers see either the old or the new file, never a torn one.

use crate::error::{Result, RetrieverError};
use bincode::{Decode, Encode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;

/// Upper bound on the memory a single decoded container may claim.
pub const MAX_DECODE_BYTES: usize = 1 << 30;

/// Encode `value` behind the `magic` + version header.
pub fn encode_framed<T: Encode>(magic: [u8; 4], value: &T, what: &'static str) -> Result<Vec<u8>> {
    let payload = bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|source| RetrieverError::Encode { what, source })?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&magic);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a framed file; `origin` is only used for error messages.
pub fn decode_framed<T: Decode<()>>(magic: [u8; 4], bytes: &[u8], origin: &Path) -> Result<T> {
    if bytes.len() < HEADER_LEN {
        return Err(RetrieverError::corrupt(origin, "file is shorter than its header"));
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    if header[..4] != magic {
        return Err(RetrieverError::corrupt(
            origin,
            format!(
                "unexpected file type {:?}, expected {:?}",
                String::from_utf8_lossy(&header[..4]),
                String::from_utf8_lossy(&magic)
            ),
        ));
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != FORMAT_VERSION {
        return Err(RetrieverError::corrupt(
            origin,
            format!("unsupported format version {version} (supported: {FORMAT_VERSION})"),
        ));
    }

    let config = bincode::config::standard().with_limit::<MAX_DECODE_BYTES>();
    let (value, read) =
        bincode::decode_from_slice(payload, config).map_err(|source| RetrieverError::Decode {
            path: origin.to_path_buf(),
            source,
        })?;
    if read != payload.len() {
        return Err(RetrieverError::corrupt(
            origin,
            format!("{} trailing bytes after payload", payload.len() - read),
        ));
    }
    Ok(value)
}

/// Sibling temp path used while writing `path` (`index.bin` -> `index.bin.tmp`).
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("minirag"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `bytes` via write-to-temp and rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(RetrieverError::io(parent))?;
    }

    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(RetrieverError::io(&tmp))?;
    file.write_all(bytes).await.map_err(RetrieverError::io(&tmp))?;
    file.sync_all().await.map_err(RetrieverError::io(&tmp))?;
    drop(file);

    if let Err(source) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(RetrieverError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Read a whole file, mapping "not found" to `None`.
pub async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RetrieverError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MAGIC: [u8; 4] = *b"TEST";

    #[derive(Debug, PartialEq, Encode, Decode)]
    struct Record {
        name: String,
        values: Vec<f32>,
    }

    fn record() -> Record {
        Record {
            name: "sample".to_string(),
            values: vec![0.5, -0.25],
        }
    }

    #[test]
    fn test_frame_roundtrip() {
        let bytes = encode_framed(MAGIC, &record(), "record").unwrap();

        assert_eq!(&bytes[..4], b"TEST");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        let decoded: Record = decode_framed(MAGIC, &bytes, Path::new("r.bin")).unwrap();
        assert_eq!(decoded, record());
    }

    #[test]
    fn test_rejects_wrong_magic_and_version() {
        let mut bytes = encode_framed(MAGIC, &record(), "record").unwrap();

        let err = decode_framed::<Record>(*b"MRAG", &bytes, Path::new("r.bin")).unwrap_err();
        assert!(matches!(err, RetrieverError::CorruptFile { .. }));

        bytes[4] = 9;
        let err = decode_framed::<Record>(MAGIC, &bytes, Path::new("r.bin")).unwrap_err();
        assert!(err.to_string().contains("unsupported format version 9"));
    }

    #[test]
    fn test_rejects_truncated_and_trailing_data() {
        let bytes = encode_framed(MAGIC, &record(), "record").unwrap();

        let short = decode_framed::<Record>(MAGIC, &bytes[..5], Path::new("r.bin"));
        assert!(matches!(short, Err(RetrieverError::CorruptFile { .. })));

        let truncated = decode_framed::<Record>(MAGIC, &bytes[..bytes.len() - 3], Path::new("r.bin"));
        assert!(matches!(truncated, Err(RetrieverError::Decode { .. })));

        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0, 0]);
        let trailing = decode_framed::<Record>(MAGIC, &padded, Path::new("r.bin"));
        assert!(matches!(trailing, Err(RetrieverError::CorruptFile { .. })));
    }

    #[test]
    fn test_rejects_oversized_length_prefix() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.push(0xFD);
        bytes.extend_from_slice(&(u64::MAX / 4).to_le_bytes());

        let err = decode_framed::<Record>(MAGIC, &bytes, Path::new("r.bin")).unwrap_err();
        assert!(matches!(
            err,
            RetrieverError::Decode {
                source: bincode::error::DecodeError::LimitExceeded,
                ..
            }
        ));

        // A valid name followed by a vector claiming 2^40 floats.
        let mut bytes = encode_framed(MAGIC, &record(), "record").unwrap();
        bytes.truncate(HEADER_LEN + 1 + "sample".len());
        bytes.push(0xFD);
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        let err = decode_framed::<Record>(MAGIC, &bytes, Path::new("r.bin")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Persistence);
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("out/index.bin")),
            PathBuf::from("out/index.bin.tmp")
        );
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("data.bin");

        write_atomic(&path, b"first").await?;
        write_atomic(&path, b"second").await?;

        assert_eq!(tokio::fs::read(&path).await?, b"second");
        assert!(!temp_path(&path).exists());
        assert_eq!(read_if_exists(&dir.path().join("missing")).await?, None);
        Ok(())
    }
}
