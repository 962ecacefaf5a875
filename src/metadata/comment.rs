// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The VORBIS_COMMENT block's payload, and the merge of pending tag edits
//!
//! The payload layout is, with all integers little-endian:
//!
//! ```text
//! vendor length (4) | vendor string | comment count (4) |
//! { comment length (4) | "FIELD=value" } × comment count
//! ```

use super::PayloadCursor;
use crate::Error;
use bitstream_io::{BigEndian, BitWrite, BitWriter, LittleEndian};

/// A single `FIELD=value` comment entry
///
/// Fields are matched case-insensitively but stored with their
/// original casing.  A field must not itself contain the `=`
/// character; a value may.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Comment {
    /// The entry's field name, in its original casing
    pub field: String,
    /// The entry's value
    pub value: String,
}

impl Comment {
    /// Builds a new comment from a field and value
    ///
    /// # Panics
    ///
    /// Panics if field contains the `=` character.
    pub fn new<S, V>(field: S, value: V) -> Self
    where
        S: Into<String>,
        V: std::fmt::Display,
    {
        let field = field.into();
        assert!(!field.contains('='), "field must not contain '='");
        Self {
            field,
            value: value.to_string(),
        }
    }

    /// Splits a stored entry on its first `=` character
    ///
    /// Only an entry with *no* `=` at all is malformed;
    /// any `=` past the first belongs to the value.
    ///
    /// # Example
    ///
    /// ```
    /// use flac_metaedit::metadata::Comment;
    ///
    /// let comment = Comment::parse("COMMENT=a=b").unwrap();
    /// assert_eq!(comment.field, "COMMENT");
    /// assert_eq!(comment.value, "a=b");
    ///
    /// assert!(Comment::parse("no separator").is_err());
    /// ```
    pub fn parse(entry: &str) -> Result<Self, Error> {
        entry
            .split_once('=')
            .map(|(field, value)| Self {
                field: field.to_owned(),
                value: value.to_owned(),
            })
            .ok_or_else(|| Error::MalformedComment(entry.to_owned()))
    }

    /// Whether our field matches the given one, case-insensitively
    pub fn matches(&self, field: &str) -> bool {
        self.field.eq_ignore_ascii_case(field)
    }
}

impl std::fmt::Display for Comment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// A decoded VORBIS_COMMENT metadata block payload
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VorbisComment {
    /// The vendor string
    pub vendor_string: String,
    /// The individual comment entries, in payload order
    pub comments: Vec<Comment>,
}

impl Default for VorbisComment {
    fn default() -> Self {
        Self {
            vendor_string: concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
                .to_owned(),
            comments: vec![],
        }
    }
}

impl VorbisComment {
    /// Parses a VORBIS_COMMENT block payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::VendorLengthTooShort`] on a payload under
    /// 8 bytes, [`Error::UnexpectedEndOfBlock`] when a declared
    /// length points past the payload's end, and
    /// [`Error::MalformedComment`] on an entry without `=`.
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        if payload.len() < 8 {
            return Err(Error::VendorLengthTooShort(payload.len()));
        }

        let mut r = PayloadCursor::new(payload);

        let vendor_length = r.u32_le()?;
        let vendor_string = r.string(vendor_length as usize)?;

        let comments = (0..r.u32_le()?)
            .map(|_| {
                let length = r.u32_le()?;
                r.string(length as usize)
                    .and_then(|entry| Comment::parse(&entry))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            vendor_string,
            comments,
        })
    }

    /// Serializes ourself to a fresh block payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthOverflow`] if a string or the
    /// comment count overflows its 32-bit length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        fn write_string<W: BitWrite + ?Sized>(w: &mut W, s: &str) -> Result<(), Error> {
            w.write_as_from::<LittleEndian, u32>(
                s.len().try_into().map_err(|_| Error::LengthOverflow)?,
            )?;
            w.write_bytes(s.as_bytes())?;
            Ok(())
        }

        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        write_string(&mut w, &self.vendor_string)?;
        w.write_as_from::<LittleEndian, u32>(
            self.comments
                .len()
                .try_into()
                .map_err(|_| Error::LengthOverflow)?,
        )?;
        self.comments
            .iter()
            .try_for_each(|c| write_string(&mut w, &c.to_string()))?;
        Ok(w.into_writer())
    }

    /// Given a field name, returns the first matching value, if any
    ///
    /// Fields are matched case-insensitively
    pub fn get(&self, field: &str) -> Option<&str> {
        self.comments
            .iter()
            .find(|c| c.matches(field))
            .map(|c| c.value.as_str())
    }
}

/// A single pending tag edit, applied at save time
///
/// Edits accumulate in an ordered log so the merged result is a
/// deterministic fold rather than a reconciliation of parallel
/// collections.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TagOp {
    /// Adds a field, or overwrites an existing one of the same name
    Set {
        /// The field name to add or overwrite
        field: String,
        /// The field's new value
        value: String,
    },
    /// Drops every entry matching the field name
    Remove {
        /// The field name to drop
        field: String,
    },
}

/// Folds an ordered edit log over the parsed comment list
///
/// Parsed comments keep their on-disk order.  A `Set` on an
/// existing field replaces that entry in place, keeping its
/// position but taking the new entry's casing and value; a `Set`
/// on a fresh field appends.  Later operations win over earlier
/// ones, so the result is stable across runs for identical input.
///
/// # Example
///
/// ```
/// use flac_metaedit::metadata::{Comment, TagOp, comment::merge};
///
/// let parsed = vec![Comment::new("TITLE", "Old"), Comment::new("ALBUM", "LP")];
/// let ops = vec![
///     TagOp::Set { field: "Artist".to_owned(), value: "A".to_owned() },
///     TagOp::Set { field: "Artist".to_owned(), value: "B".to_owned() },
///     TagOp::Remove { field: "album".to_owned() },
/// ];
///
/// assert_eq!(
///     merge(&parsed, &ops),
///     vec![Comment::new("TITLE", "Old"), Comment::new("Artist", "B")],
/// );
/// ```
pub fn merge(parsed: &[Comment], ops: &[TagOp]) -> Vec<Comment> {
    fn set(merged: &mut Vec<Comment>, comment: Comment) {
        match merged.iter_mut().find(|c| c.matches(&comment.field)) {
            Some(slot) => *slot = comment,
            None => merged.push(comment),
        }
    }

    let mut merged = Vec::with_capacity(parsed.len());
    for comment in parsed {
        set(&mut merged, comment.clone());
    }
    for op in ops {
        match op {
            TagOp::Set { field, value } => set(
                &mut merged,
                Comment {
                    field: field.clone(),
                    value: value.clone(),
                },
            ),
            TagOp::Remove { field } => merged.retain(|c| !c.matches(field)),
        }
    }
    merged
}
