use std::io::{BufReader, BufWriter, Read, Write};

use crate::error::VecError;
use crate::index::PrototypeIndex;
use crate::vecstore::Prototype;

/// Binary format magic and version.
const SNAPSHOT_MAGIC: [u8; 4] = [b'P', b'R', b'T', b'O'];
const SNAPSHOT_VERSION: u32 = 1;

/// Upper bound on id/label byte length accepted by [`load`].
const MAX_STRING_LEN: usize = 64 * 1024;

/// Snapshot is the decoded content of a saved index.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dim: usize,
    pub prototypes: Vec<Prototype>,
}

/// Save serializes every prototype of the index in a compact binary format:
///
/// ```text
/// [4B magic "PRTO"] [4B version=1]
/// [4B dim] [4B count]
/// For each prototype (insertion order):
///   [4B idLen] [idLen bytes ID string]
///   [1B has label] If set: [4B labelLen] [labelLen bytes label]
///   [dim x 4B float32 normalized vector]
/// ```
///
/// All multi-byte values are little-endian. The snapshot is taken under a
/// single read lock, so it is consistent.
pub fn save(index: &PrototypeIndex, w: &mut dyn Write) -> Result<(), VecError> {
    let prototypes = index.prototypes();
    let mut bw = BufWriter::new(w);
    let write_err = |e: std::io::Error| VecError::Io(e.to_string());

    bw.write_all(&SNAPSHOT_MAGIC).map_err(write_err)?;
    bw.write_all(&SNAPSHOT_VERSION.to_le_bytes()).map_err(write_err)?;
    bw.write_all(&(index.dim() as u32).to_le_bytes()).map_err(write_err)?;
    bw.write_all(&(prototypes.len() as u32).to_le_bytes()).map_err(write_err)?;

    for p in &prototypes {
        write_str(&mut bw, &p.identity_id)?;
        match &p.label {
            Some(label) => {
                bw.write_all(&[1u8]).map_err(write_err)?;
                write_str(&mut bw, label)?;
            }
            None => bw.write_all(&[0u8]).map_err(write_err)?,
        }
        for &v in &p.embedding {
            bw.write_all(&v.to_le_bytes()).map_err(write_err)?;
        }
    }

    bw.flush().map_err(write_err)?;
    Ok(())
}

fn write_str(w: &mut impl Write, s: &str) -> Result<(), VecError> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u32).to_le_bytes())
        .and_then(|_| w.write_all(bytes))
        .map_err(|e| VecError::Io(e.to_string()))
}

fn read_u32(r: &mut impl Read) -> Result<u32, VecError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| VecError::Io(e.to_string()))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_str(r: &mut impl Read) -> Result<String, VecError> {
    let len = read_u32(r)? as usize;
    if len > MAX_STRING_LEN {
        return Err(VecError::InvalidFormat(format!(
            "string length {len} exceeds maximum {MAX_STRING_LEN}"
        )));
    }
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes).map_err(|e| VecError::Io(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| VecError::InvalidFormat(e.to_string()))
}

/// Load deserializes a snapshot produced by [`save`].
///
/// The result is meant for [`PrototypeIndex::bulk_load`]; nothing is
/// applied to any index here.
pub fn load(r: &mut dyn Read) -> Result<Snapshot, VecError> {
    let mut br = BufReader::new(r);
    let read_err = |e: std::io::Error| VecError::Io(e.to_string());

    let mut magic = [0u8; 4];
    br.read_exact(&mut magic).map_err(read_err)?;
    if magic != SNAPSHOT_MAGIC {
        return Err(VecError::InvalidFormat(format!("invalid magic {magic:?}")));
    }

    let version = read_u32(&mut br)?;
    if version != SNAPSHOT_VERSION {
        return Err(VecError::InvalidFormat(format!(
            "unsupported version {version} (want {SNAPSHOT_VERSION})"
        )));
    }

    let dim = read_u32(&mut br)? as usize;
    if dim == 0 {
        return Err(VecError::InvalidFormat("invalid dimension 0".into()));
    }
    let count = read_u32(&mut br)? as usize;

    let mut prototypes = Vec::new();
    prototypes
        .try_reserve_exact(count)
        .map_err(|e| VecError::ResourceExhausted(format!("snapshot of {count} prototypes: {e}")))?;

    for _ in 0..count {
        let identity_id = read_str(&mut br)?;

        let mut flag = [0u8; 1];
        br.read_exact(&mut flag).map_err(read_err)?;
        let label = match flag[0] {
            0 => None,
            1 => Some(read_str(&mut br)?),
            other => {
                return Err(VecError::InvalidFormat(format!(
                    "invalid label flag {other}"
                )))
            }
        };

        let mut embedding = vec![0.0f32; dim];
        for v in &mut embedding {
            let mut fb = [0u8; 4];
            br.read_exact(&mut fb).map_err(read_err)?;
            *v = f32::from_le_bytes(fb);
        }

        prototypes.push(Prototype {
            identity_id,
            embedding,
            label,
        });
    }

    Ok(Snapshot { dim, prototypes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{BackendKind, IndexConfig};

    fn index(dim: usize) -> PrototypeIndex {
        PrototypeIndex::with_backend(
            IndexConfig {
                dim,
                ..IndexConfig::default()
            },
            BackendKind::Exact,
        )
    }

    #[test]
    fn save_and_rehydrate() {
        let src = index(3);
        src.add("a", &[1.0, 0.0, 0.0], Some("alice")).unwrap();
        src.add("b", &[0.0, 2.0, 0.0], None).unwrap();
        src.add("c", &[0.0, 1.0, 1.0], None).unwrap();

        let mut buf = Vec::new();
        save(&src, &mut buf).unwrap();

        let snap = load(&mut buf.as_slice()).unwrap();
        assert_eq!(snap.dim, 3);
        assert_eq!(snap.prototypes.len(), 3);
        assert_eq!(snap.prototypes[0].label.as_deref(), Some("alice"));

        let dst = index(3);
        dst.bulk_load(snap.prototypes).unwrap();
        assert_eq!(dst.count(), 3);
        let hits = dst.search(&[0.0, 1.0, 0.9], 1, 0.0).unwrap();
        assert_eq!(hits[0].identity_id, "c");
        assert_eq!(dst.get("b").unwrap(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn save_empty() {
        let mut buf = Vec::new();
        save(&index(2), &mut buf).unwrap();
        let snap = load(&mut buf.as_slice()).unwrap();
        assert!(snap.prototypes.is_empty());
    }

    #[test]
    fn load_rejects_bad_magic() {
        let data = b"HNSW\x01\x00\x00\x00";
        assert!(matches!(
            load(&mut &data[..]),
            Err(VecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn load_rejects_truncated() {
        let src = index(2);
        src.add("a", &[1.0, 0.0], None).unwrap();
        let mut buf = Vec::new();
        save(&src, &mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(load(&mut buf.as_slice()), Err(VecError::Io(_))));
    }

    #[test]
    fn save_to_file() {
        let src = index(2);
        src.add("a", &[1.0, 1.0], None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prototypes.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        save(&src, &mut f).unwrap();
        drop(f);

        let mut f = std::fs::File::open(&path).unwrap();
        let snap = load(&mut f).unwrap();
        assert_eq!(snap.prototypes[0].identity_id, "a");
    }
}
