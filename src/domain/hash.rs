use std::{fmt::Display, path::Path};

use blake3::Hash;

/// Stable identifier of a track.
///
/// Computed from the file contents when the catalog source can read them,
/// otherwise from the normalized title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(pub Hash);

impl TrackId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    pub fn from_hex(hex: &str) -> anyhow::Result<Self> {
        Ok(Self(Hash::from_hex(hex)?))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes))
    }
}

impl Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::TrackId;

    #[test]
    fn hex_round_trip_keeps_id() -> anyhow::Result<()> {
        let id = TrackId::from_bytes(b"song one");
        assert_eq!(TrackId::from_hex(&id.to_hex())?, id);
        Ok(())
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(TrackId::from_hex("not-a-valid-id").is_err());
    }

    #[test]
    fn from_file_hashes_contents() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"abc")?;
        assert_eq!(TrackId::from_file(&path)?, TrackId::from_bytes(b"abc"));
        Ok(())
    }
}
