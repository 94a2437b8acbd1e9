//! Export output blobs and their stream encoding.
//!
//! An export to memory produces a chain of named blobs: the primary file
//! first (empty name), followed by companion files such as an `.mtl` beside
//! an `.obj`. The stream encoding is little-endian:
//!
//! ```text
//! u32 name_len, name bytes (UTF-8)
//! u32 data_len, data bytes
//! u8  has_next (0 or 1)
//! ... next blob if has_next
//! ```

use std::io::{self, Read, Write};

use crate::error::InteropError;

/// One exported file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportDataBlob {
    /// Blob name: empty for the primary file, otherwise the extension of a
    /// companion file (e.g. `mtl`).
    pub name: String,
    /// File contents.
    pub data: Vec<u8>,
    /// Next blob in the chain.
    pub next: Option<Box<ExportDataBlob>>,
}

impl ExportDataBlob {
    /// A single blob with no successor.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            next: None,
        }
    }

    /// Whether this blob carries any bytes.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// Iterate this blob and every successor, in chain order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { next: Some(self) }
    }

    /// Number of blobs in the chain starting here.
    pub fn chain_len(&self) -> usize {
        self.iter().count()
    }

    /// Find a blob in the chain by name.
    pub fn find(&self, name: &str) -> Option<&ExportDataBlob> {
        self.iter().find(|b| b.name == name)
    }

    /// Build a chain from blobs in order. Returns `None` for an empty input.
    pub fn from_chain(blobs: Vec<ExportDataBlob>) -> Option<Self> {
        blobs.into_iter().rev().fold(None, |next, mut blob| {
            blob.next = next.map(Box::new);
            Some(blob)
        })
    }

    /// Write the chain starting at `self` to `w`.
    pub fn to_stream(&self, w: &mut dyn Write) -> Result<(), InteropError> {
        for blob in self.iter() {
            write_bytes(w, blob.name.as_bytes())?;
            write_bytes(w, &blob.data)?;
            w.write_all(&[u8::from(blob.next.is_some())])?;
        }
        Ok(())
    }

    /// Read a chain written by [`ExportDataBlob::to_stream`].
    pub fn from_stream(r: &mut dyn Read) -> Result<Self, InteropError> {
        let mut blobs = Vec::new();
        loop {
            let name = String::from_utf8(read_bytes(r)?)
                .map_err(|e| InteropError::marshal(format!("blob name is not UTF-8: {e}")))?;
            let data = read_bytes(r)?;
            blobs.push(ExportDataBlob::new(name, data));
            match read_u8(r)? {
                0 => break,
                1 => continue,
                other => {
                    return Err(InteropError::marshal(format!(
                        "invalid blob continuation flag {other}"
                    )))
                }
            }
        }
        Self::from_chain(blobs).ok_or_else(|| InteropError::marshal("empty blob stream"))
    }
}

impl Drop for ExportDataBlob {
    fn drop(&mut self) {
        // Unlink successors one at a time so a long chain does not recurse.
        let mut next = self.next.take();
        while let Some(mut blob) = next {
            next = blob.next.take();
        }
    }
}

/// Iterator over a blob chain.
pub struct Iter<'a> {
    next: Option<&'a ExportDataBlob>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a ExportDataBlob;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next.as_deref();
        Some(current)
    }
}

impl<'a> IntoIterator for &'a ExportDataBlob {
    type Item = &'a ExportDataBlob;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

fn write_bytes(w: &mut dyn Write, bytes: &[u8]) -> Result<(), InteropError> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| InteropError::marshal(format!("blob field of {} bytes exceeds u32", bytes.len())))?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(bytes)?;
    Ok(())
}

fn read_u8(r: &mut dyn Read) -> Result<u8, InteropError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(eof_to_marshal)?;
    Ok(buf[0])
}

fn read_bytes(r: &mut dyn Read) -> Result<Vec<u8>, InteropError> {
    let mut len = [0u8; 4];
    r.read_exact(&mut len).map_err(eof_to_marshal)?;
    let len = u32::from_le_bytes(len) as usize;
    let mut buf = Vec::new();
    let read = r.take(len as u64).read_to_end(&mut buf)?;
    if read != len {
        return Err(InteropError::marshal(format!(
            "blob stream truncated: expected {len} bytes, got {read}"
        )));
    }
    Ok(buf)
}

fn eof_to_marshal(e: io::Error) -> InteropError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        InteropError::marshal("blob stream truncated")
    } else {
        InteropError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn obj_chain() -> ExportDataBlob {
        ExportDataBlob::from_chain(vec![
            ExportDataBlob::new("", b"v 1 0 0\n".to_vec()),
            ExportDataBlob::new("mtl", b"newmtl MyMaterial\n".to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn stream_preserves_names_lengths_and_order() {
        let chain = obj_chain();
        let mut buf = Vec::new();
        chain.to_stream(&mut buf).unwrap();
        let back = ExportDataBlob::from_stream(&mut buf.as_slice()).unwrap();
        assert_eq!(back, chain);
        let names: Vec<_> = back.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["", "mtl"]);
        assert!(back.find("mtl").is_some_and(ExportDataBlob::has_data));
    }

    #[test]
    fn encoding_layout() {
        let mut buf = Vec::new();
        ExportDataBlob::new("ab", vec![9]).to_stream(&mut buf).unwrap();
        assert_eq!(buf, [2, 0, 0, 0, b'a', b'b', 1, 0, 0, 0, 9, 0]);
    }

    #[test]
    fn truncated_stream_fails() {
        let mut buf = Vec::new();
        obj_chain().to_stream(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        let err = ExportDataBlob::from_stream(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, InteropError::MarshalFailure { .. }));
    }

    #[test]
    fn long_chains_drop_without_recursing() {
        let blobs = (0..200_000)
            .map(|i| ExportDataBlob::new(format!("{i}"), Vec::new()))
            .collect();
        let chain = ExportDataBlob::from_chain(blobs).unwrap();
        assert_eq!(chain.chain_len(), 200_000);
        drop(chain);
    }

    #[test]
    fn bad_continuation_flag_fails() {
        let buf = [0, 0, 0, 0, 0, 0, 0, 0, 7];
        assert!(ExportDataBlob::from_stream(&mut buf.as_slice()).is_err());
    }

    proptest! {
        #[test]
        fn arbitrary_chains_survive_the_stream(
            parts in prop::collection::vec(("[a-z]{0,8}", prop::collection::vec(any::<u8>(), 0..64)), 1..6)
        ) {
            let blobs = parts
                .into_iter()
                .map(|(name, data)| ExportDataBlob::new(name, data))
                .collect::<Vec<_>>();
            let chain = ExportDataBlob::from_chain(blobs.clone()).unwrap();
            prop_assert_eq!(chain.chain_len(), blobs.len());
            let mut buf = Vec::new();
            chain.to_stream(&mut buf).unwrap();
            let back = ExportDataBlob::from_stream(&mut buf.as_slice()).unwrap();
            prop_assert_eq!(back, chain);
        }
    }
}
