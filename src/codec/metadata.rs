//! Editor metadata stored between the block table and the first block.
//!
//! The current format starts with `MD2_` followed by key records:
//! `u32 key_len, key, u32 type_count, { u32 type, u32 len, bytes }*`.
//! Type 0 holds binary data, type 1 a latin-1 string; every other type is
//! carried through untouched.
//!
//! Blobs without the magic come from older editors that stored a pickled
//! `str -> str` dictionary. Those are parsed on a best-effort basis.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::codec::records::{latin1_bytes, latin1_string};
use crate::error::CourseError;

/// Leading bytes of a current-format blob.
pub const MAGIC: &[u8; 4] = b"MD2_";

/// Type tag for binary values.
pub const TYPE_BINARY: u32 = 0;
/// Type tag for latin-1 string values.
pub const TYPE_STRING: u32 = 1;

/// String keys the editor shows as level information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoField {
    /// Level name
    Title,
    /// Level author
    Author,
    /// Group or team the author belongs to
    Group,
    /// Author's web page
    Website,
}

impl InfoField {
    /// Every info field, in display order.
    pub const ALL: [InfoField; 4] = [
        InfoField::Title,
        InfoField::Author,
        InfoField::Group,
        InfoField::Website,
    ];

    /// Metadata key the field is stored under.
    pub fn key(self) -> &'static str {
        match self {
            InfoField::Title => "Title",
            InfoField::Author => "Author",
            InfoField::Group => "Group",
            InfoField::Website => "Website",
        }
    }
}

/// Lossless key/type/value store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    entries: BTreeMap<String, BTreeMap<u32, Vec<u8>>>,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CourseError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err(CourseError::Metadata(format!(
                "record at offset {} wants {n} bytes but only {} remain",
                self.pos,
                self.data.len() - self.pos
            )));
        };
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, CourseError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }
}

impl Metadata {
    /// Decode a metadata blob. An empty blob yields empty metadata.
    pub fn decode(data: &[u8]) -> Result<Self, CourseError> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        if !data.starts_with(MAGIC) {
            return Ok(Self::decode_legacy(data));
        }

        let mut meta = Self::default();
        let mut r = Reader { data, pos: 4 };
        while r.pos + 4 < data.len() {
            let key_len = r.u32()? as usize;
            let key = latin1_string(r.take(key_len)?);
            let types = r.u32()?;
            for _ in 0..types {
                let ty = r.u32()?;
                let len = r.u32()? as usize;
                let value = r.take(len)?.to_vec();
                meta.set_other_data(&key, ty, value);
            }
        }
        Ok(meta)
    }

    fn decode_legacy(data: &[u8]) -> Self {
        let mut meta = Self::default();
        if let Some(pairs) = legacy::parse_str_dict(data) {
            for (k, v) in pairs {
                if meta.set_str_data(&k, &v).is_err() {
                    log::debug!("skipping legacy metadata entry '{k}' with non latin-1 text");
                }
            }
        }
        if meta.other_data("Website", TYPE_STRING).is_none() {
            if let Some(site) = meta.other_data("Webpage", TYPE_STRING).map(<[u8]>::to_vec) {
                meta.set_other_data("Website", TYPE_STRING, site);
            }
        }
        meta
    }

    /// Encode sorted by key, then by type. Always starts with [`MAGIC`].
    pub fn encode(&self) -> Result<Vec<u8>, CourseError> {
        let mut out = MAGIC.to_vec();
        for (key, types) in &self.entries {
            let raw = latin1_bytes(key)?;
            push_len(&mut out, raw.len(), key)?;
            out.extend_from_slice(&raw);
            push_len(&mut out, types.len(), key)?;
            for (ty, value) in types {
                // writes into a Vec cannot fail
                let _ = out.write_u32::<BigEndian>(*ty);
                push_len(&mut out, value.len(), key)?;
                out.extend_from_slice(value);
            }
        }
        Ok(out)
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Value of `key` with an arbitrary type tag.
    pub fn other_data(&self, key: &str, ty: u32) -> Option<&[u8]> {
        self.entries.get(key)?.get(&ty).map(Vec::as_slice)
    }

    /// Store a value, replacing any value with the same key and type.
    pub fn set_other_data(&mut self, key: &str, ty: u32, value: Vec<u8>) {
        self.entries.entry(key.to_owned()).or_default().insert(ty, value);
    }

    /// Binary value (type 0) stored under `key`.
    pub fn bin_data(&self, key: &str) -> Option<&[u8]> {
        self.other_data(key, TYPE_BINARY)
    }

    /// Store a binary value (type 0) under `key`.
    pub fn set_bin_data(&mut self, key: &str, value: Vec<u8>) {
        self.set_other_data(key, TYPE_BINARY, value);
    }

    /// String value of `key`, each byte read as the code point of the same
    /// value.
    pub fn str_data(&self, key: &str) -> Option<String> {
        self.other_data(key, TYPE_STRING).map(latin1_string)
    }

    /// Store a string value. Fails with [`CourseError::NotLatin1`] if any
    /// character is above U+00FF; nothing is stored in that case.
    pub fn set_str_data(&mut self, key: &str, value: &str) -> Result<(), CourseError> {
        let raw = latin1_bytes(value)?;
        self.set_other_data(key, TYPE_STRING, raw);
        Ok(())
    }

    /// Drop every value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<BTreeMap<u32, Vec<u8>>> {
        self.entries.remove(key)
    }

    /// Level information string, if set.
    pub fn info(&self, field: InfoField) -> Option<String> {
        self.str_data(field.key())
    }

    /// Store a level information field.
    pub fn set_info(&mut self, field: InfoField, value: &str) -> Result<(), CourseError> {
        self.set_str_data(field.key(), value)
    }
}

fn push_len(out: &mut Vec<u8>, len: usize, key: &str) -> Result<(), CourseError> {
    let len = u32::try_from(len)
        .map_err(|_| CourseError::overflow(format!("metadata entry '{key}'")))?;
    let _ = out.write_u32::<BigEndian>(len);
    Ok(())
}

/// Reader for the text pickle (protocol 0) of a flat string dictionary.
mod legacy {
    use std::collections::HashMap;

    enum Item {
        Mark,
        Str(String),
        Dict(Vec<(String, String)>),
    }

    /// Returns `None` on anything outside the small opcode subset a
    /// `str -> str` dict pickles to.
    pub(super) fn parse_str_dict(data: &[u8]) -> Option<Vec<(String, String)>> {
        let mut stack: Vec<Item> = Vec::new();
        let mut memo: HashMap<String, String> = HashMap::new();
        let mut pos = 0;

        while pos < data.len() {
            let op = data[pos];
            pos += 1;
            match op {
                b'(' => stack.push(Item::Mark),
                b'd' => {
                    // only the empty-dict form `(d` appears here
                    match stack.pop()? {
                        Item::Mark => stack.push(Item::Dict(Vec::new())),
                        _ => return None,
                    }
                }
                b'}' => stack.push(Item::Dict(Vec::new())),
                b'S' => {
                    let raw = line(data, &mut pos)?;
                    stack.push(Item::Str(unquote(raw)?));
                }
                b'V' => {
                    let raw = line(data, &mut pos)?;
                    stack.push(Item::Str(unescape_unicode(raw)?));
                }
                b'p' => {
                    let id = String::from_utf8(line(data, &mut pos)?.to_vec()).ok()?;
                    if let Some(Item::Str(s)) = stack.last() {
                        memo.insert(id, s.clone());
                    }
                }
                b'g' => {
                    let id = String::from_utf8(line(data, &mut pos)?.to_vec()).ok()?;
                    stack.push(Item::Str(memo.get(&id)?.clone()));
                }
                b's' => {
                    let v = match stack.pop()? {
                        Item::Str(s) => s,
                        _ => return None,
                    };
                    let k = match stack.pop()? {
                        Item::Str(s) => s,
                        _ => return None,
                    };
                    match stack.last_mut()? {
                        Item::Dict(pairs) => pairs.push((k, v)),
                        _ => return None,
                    }
                }
                b'.' => {
                    return match stack.pop()? {
                        Item::Dict(pairs) => Some(pairs),
                        _ => None,
                    };
                }
                b'\n' | b'\r' => {}
                _ => return None,
            }
        }
        None
    }

    fn line<'a>(data: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
        let rest = data.get(*pos..)?;
        let nl = rest.iter().position(|&b| b == b'\n')?;
        *pos += nl + 1;
        Some(&rest[..nl])
    }

    fn unquote(raw: &[u8]) -> Option<String> {
        let (&q, rest) = raw.split_first()?;
        if q != b'\'' && q != b'"' {
            return None;
        }
        let body = rest.strip_suffix(&[q])?;
        let mut out = String::new();
        let mut it = body.iter().copied();
        while let Some(b) = it.next() {
            if b != b'\\' {
                out.push(b as char);
                continue;
            }
            match it.next()? {
                b'n' => out.push('\n'),
                b't' => out.push('\t'),
                b'r' => out.push('\r'),
                b'x' => {
                    let hex = [it.next()?, it.next()?];
                    let v = u8::from_str_radix(std::str::from_utf8(&hex).ok()?, 16).ok()?;
                    out.push(v as char);
                }
                other => out.push(other as char),
            }
        }
        Some(out)
    }

    fn unescape_unicode(raw: &[u8]) -> Option<String> {
        let mut out = String::new();
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'\\' && raw.get(i + 1) == Some(&b'u') {
                let hex = std::str::from_utf8(raw.get(i + 2..i + 6)?).ok()?;
                out.push(char::from_u32(u32::from_str_radix(hex, 16).ok()?)?);
                i += 6;
            } else {
                out.push(raw[i] as char);
                i += 1;
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_layout_is_sorted_and_prefixed() {
        let mut meta = Metadata::default();
        meta.set_str_data("b", "x").expect("latin-1");
        meta.set_bin_data("a", vec![1, 2]);

        let bytes = meta.encode().expect("encode");
        let parts: [&[u8]; 13] = [
            &b"MD2_"[..],
            &[0, 0, 0, 1], b"a", &[0, 0, 0, 1], &[0, 0, 0, 0], &[0, 0, 0, 2], &[1, 2],
            &[0, 0, 0, 1], b"b", &[0, 0, 0, 1], &[0, 0, 0, 1], &[0, 0, 0, 1], b"x",
        ];
        assert_eq!(bytes, parts.concat());
    }

    #[test]
    fn decode_preserves_unknown_types() {
        let mut meta = Metadata::default();
        meta.set_other_data("Future", 7, vec![9, 9, 9]);
        meta.set_str_data("Title", "Caf\u{e9}").expect("latin-1");
        meta.set_bin_data("Title", vec![0xAA]);

        let decoded = Metadata::decode(&meta.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, meta);
        assert_eq!(decoded.other_data("Future", 7), Some(&[9u8, 9, 9][..]));
        assert_eq!(decoded.info(InfoField::Title).as_deref(), Some("Caf\u{e9}"));
    }

    #[test]
    fn zero_padding_after_last_record_is_ignored() {
        let mut meta = Metadata::default();
        meta.set_str_data("Author", "someone").expect("latin-1");
        let mut bytes = meta.encode().expect("encode");
        bytes.extend_from_slice(&[0, 0, 0]);
        assert_eq!(Metadata::decode(&bytes).expect("decode"), meta);
    }

    #[test]
    fn characters_above_latin1_are_rejected() {
        let mut meta = Metadata::default();
        let err = meta.set_str_data("Title", "\u{3042}").unwrap_err();
        assert!(matches!(err, CourseError::NotLatin1(_)));
        assert!(meta.is_empty());
    }

    #[test]
    fn truncated_record_is_an_error() {
        let parts: [&[u8]; 3] = [b"MD2_", &[0, 0, 0, 40], b"short"];
        let bytes = parts.concat();
        assert!(matches!(Metadata::decode(&bytes), Err(CourseError::Metadata(_))));
    }

    #[test]
    fn legacy_pickle_is_converted() {
        let pickled = b"(dp0\nS'Title'\np1\nS'Old level'\np2\nsS'Webpage'\np3\nS'http://example.org'\np4\ns.";
        let meta = Metadata::decode(pickled).expect("legacy never fails");
        assert_eq!(meta.info(InfoField::Title).as_deref(), Some("Old level"));
        assert_eq!(meta.info(InfoField::Website).as_deref(), Some("http://example.org"));
        assert_eq!(meta.str_data("Webpage").as_deref(), Some("http://example.org"));
    }

    #[test]
    fn garbage_without_magic_is_empty() {
        let meta = Metadata::decode(&[0x80, 1, 2, 3, 4, 5]).expect("legacy never fails");
        assert!(meta.is_empty());
    }

    #[test]
    fn empty_metadata_still_carries_magic() {
        assert_eq!(Metadata::default().encode().expect("encode"), b"MD2_");
        assert!(Metadata::decode(b"MD2_").expect("decode").is_empty());
    }
}
