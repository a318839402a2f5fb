//! In-level comments, kept in the metadata blob under a per-area key as
//! `{ u32 x, u32 y, u32 len, latin-1 text }*`.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::codec::records::{latin1_bytes, latin1_string};
use crate::error::CourseError;
use crate::model::Comment;

/// Metadata key holding the comments of area `number`.
pub fn key(number: usize) -> String {
    format!("InLevelComments_A{number}")
}

/// Parse a comment blob.
pub fn decode(data: &[u8]) -> Result<Vec<Comment>, CourseError> {
    let mut out = Vec::new();
    let mut idx = 0;
    while idx < data.len() {
        let Some(head) = data.get(idx..idx + 12) else {
            return Err(CourseError::Metadata(format!(
                "comment header at offset {idx} is truncated"
            )));
        };
        let len = BigEndian::read_u32(&head[8..]) as usize;
        let start = idx + 12;
        let Some(text) = data.get(start..start.saturating_add(len)) else {
            return Err(CourseError::Metadata(format!(
                "comment text at offset {start} is truncated"
            )));
        };
        out.push(Comment {
            x: BigEndian::read_u32(head),
            y: BigEndian::read_u32(&head[4..]),
            text: latin1_string(text),
        });
        idx = start + len;
    }
    Ok(out)
}

/// Inverse of [`decode`].
pub fn encode(comments: &[Comment]) -> Result<Vec<u8>, CourseError> {
    let mut out = Vec::new();
    for c in comments {
        let text = latin1_bytes(&c.text)?;
        let len = u32::try_from(text.len()).map_err(|_| CourseError::overflow("comment text"))?;
        // writes into a Vec cannot fail
        let _ = out.write_u32::<BigEndian>(c.x);
        let _ = out.write_u32::<BigEndian>(c.y);
        let _ = out.write_u32::<BigEndian>(len);
        out.extend_from_slice(&text);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_survive_encoding() {
        let comments = vec![
            Comment {
                x: 16,
                y: 32,
                text: "hidden block here".into(),
            },
            Comment {
                x: 0,
                y: 0,
                text: String::new(),
            },
        ];
        let bytes = encode(&comments).expect("encode");
        assert_eq!(bytes.len(), 12 + 17 + 12);
        assert_eq!(decode(&bytes).expect("decode"), comments);
    }

    #[test]
    fn truncated_text_is_rejected() {
        let mut bytes = encode(&[Comment {
            x: 1,
            y: 2,
            text: "abc".into(),
        }])
        .expect("encode");
        bytes.pop();
        assert!(matches!(decode(&bytes), Err(CourseError::Metadata(_))));
    }

    #[test]
    fn key_is_per_area() {
        assert_eq!(key(3), "InLevelComments_A3");
    }
}
