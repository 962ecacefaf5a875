// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An open FLAC file with pending metadata edits
//!
//! [`FlacFile::open`] scans the metadata section once and keeps a
//! snapshot of what it found.  Edits accumulate on the session
//! without touching the file; [`FlacFile::save`] folds them into a
//! rebuilt metadata section and writes the whole container out,
//! carrying the audio bytes over verbatim.

use crate::Error;
use crate::metadata::{
    self, BlockHeader, BlockType, Comment, FLAC_TAG, MetadataBlock, Picture, TagOp, VorbisComment,
    comment,
};
use bitstream_io::{BigEndian, BitWrite, BitWriter};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An open FLAC file and its pending metadata edits
///
/// Reads answer from the snapshot taken at open time.  Mutations
/// are recorded but deferred; nothing reaches disk until
/// [`save`](FlacFile::save).  The snapshot is *not* refreshed by a
/// save, so observing the result of one means reopening the file.
///
/// The underlying handle is held read-only for the life of the
/// session and released when the session is dropped.
///
/// # Example
///
/// ```no_run
/// use flac_metaedit::FlacFile;
///
/// let mut flac = FlacFile::open("song.flac")?;
/// flac.set("TITLE", "Fastness");
/// flac.remove("COMMENT", true)?;
/// flac.save(None)?;
/// # Ok::<(), flac_metaedit::Error>(())
/// ```
pub struct FlacFile {
    file: File,
    path: PathBuf,
    blocks: Vec<MetadataBlock>,
    parsed_comments: Vec<Comment>,
    ops: Vec<TagOp>,
    pending_cover: Option<Picture>,
    remove_cover: bool,
}

impl FlacFile {
    /// Opens a FLAC file and scans its metadata section
    ///
    /// The whole block chain is walked up front, so any structural
    /// problem surfaces here rather than at first use.
    ///
    /// # Errors
    ///
    /// Passes along any I/O error, [`Error::NotAFlacFile`] if the
    /// stream doesn't open with a `"fLaC"` tag, and the scan errors
    /// of [`BlockIterator`](crate::metadata::BlockIterator) for a
    /// truncated or duplicated block chain.  A present but
    /// malformed VORBIS_COMMENT payload is also rejected here.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_owned();
        let mut file = File::open(&path)?;

        let blocks = metadata::read_blocks(BufReader::new(&mut file))
            .collect::<Result<Vec<_>, _>>()?;

        let parsed_comments = match blocks
            .iter()
            .find(|b| b.header.block_type == BlockType::VorbisComment)
        {
            Some(block) => VorbisComment::parse(&block.data)?.comments,
            None => Vec::new(),
        };

        Ok(Self {
            file,
            path,
            blocks,
            parsed_comments,
            ops: Vec::new(),
            pending_cover: None,
            remove_cover: false,
        })
    }

    /// The path this session was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The metadata blocks found at open time, in file order
    pub fn blocks(&self) -> &[MetadataBlock] {
        &self.blocks
    }

    /// The comment entries found at open time, in payload order
    ///
    /// Pending edits are not reflected here.
    pub fn comments(&self) -> &[Comment] {
        &self.parsed_comments
    }

    /// Returns the value of the given field, matched case-insensitively
    ///
    /// On duplicate fields, the first entry wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataNotFound`] if no entry matches.
    pub fn read(&self, field: &str) -> Result<&str, Error> {
        self.parsed_comments
            .iter()
            .find(|c| c.matches(field))
            .map(|c| c.value.as_str())
            .ok_or_else(|| Error::MetadataNotFound(field.to_owned()))
    }

    /// Records a field to be added, or overwritten if already present
    ///
    /// # Panics
    ///
    /// Panics if field contains the `=` character.
    pub fn set<S, V>(&mut self, field: S, value: V)
    where
        S: Into<String>,
        V: std::fmt::Display,
    {
        let Comment { field, value } = Comment::new(field, value);
        self.ops.push(TagOp::Set { field, value });
    }

    /// Records a batch of fields, in iteration order
    ///
    /// Equivalent to calling [`set`](FlacFile::set) once per pair.
    pub fn set_all<S, V, I>(&mut self, pairs: I)
    where
        S: Into<String>,
        V: std::fmt::Display,
        I: IntoIterator<Item = (S, V)>,
    {
        for (field, value) in pairs {
            self.set(field, value);
        }
    }

    /// Records a field to be dropped at save time
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataNotFound`] if the field wasn't in
    /// the file at open time, unless `ignore_if_missing` is set.
    pub fn remove(&mut self, field: &str, ignore_if_missing: bool) -> Result<(), Error> {
        if !ignore_if_missing && !self.parsed_comments.iter().any(|c| c.matches(field)) {
            return Err(Error::MetadataNotFound(field.to_owned()));
        }
        self.ops.push(TagOp::Remove {
            field: field.to_owned(),
        });
        Ok(())
    }

    /// Sets the front cover picture to be written at save time
    ///
    /// Replaces any cover already in the file, and cancels a
    /// pending [`remove_cover`](FlacFile::remove_cover).
    pub fn set_cover(&mut self, picture: Picture) {
        self.pending_cover = Some(picture);
        self.remove_cover = false;
    }

    /// Builds a front cover from raw image bytes, sniffing their format
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageTooSmall`] or
    /// [`Error::UnsupportedImageFormat`] when the bytes can't be
    /// identified as a supported image.
    pub fn set_cover_from_bytes<V>(&mut self, data: V) -> Result<(), Error>
    where
        V: Into<Vec<u8>> + AsRef<[u8]>,
    {
        Picture::from_sniffed_bytes(data).map(|p| self.set_cover(p))
    }

    /// Builds a front cover from an image file on disk
    ///
    /// # Errors
    ///
    /// Passes along any I/O error reading the file, plus the
    /// sniffing errors of
    /// [`set_cover_from_bytes`](FlacFile::set_cover_from_bytes).
    pub fn set_cover_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        Picture::open(path).map(|p| self.set_cover(p))
    }

    /// Records the cover picture to be dropped at save time
    ///
    /// Also discards any cover pending from a prior
    /// [`set_cover`](FlacFile::set_cover).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCoverPicture`] if the file had no
    /// PICTURE block at open time, unless `ignore_if_missing` is
    /// set.
    pub fn remove_cover(&mut self, ignore_if_missing: bool) -> Result<(), Error> {
        if !ignore_if_missing && self.picture_block().is_none() {
            return Err(Error::MissingCoverPicture);
        }
        self.pending_cover = None;
        self.remove_cover = true;
        Ok(())
    }

    /// Decodes the cover picture found at open time, if any
    ///
    /// Pending edits are not reflected here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEndOfBlock`] on a PICTURE payload
    /// shorter than its own declared lengths.
    pub fn cover(&self) -> Result<Option<Picture>, Error> {
        self.picture_block()
            .map(|b| Picture::parse(&b.data))
            .transpose()
    }

    fn picture_block(&self) -> Option<&MetadataBlock> {
        self.blocks
            .iter()
            .find(|b| b.header.block_type == BlockType::Picture)
    }

    /// Rebuilds the file with all pending edits applied
    ///
    /// Writes to `output` if given, otherwise over the source path.
    /// The metadata section is freshly re-scanned and reassembled:
    /// STREAMINFO first and verbatim, then the VORBIS_COMMENT block
    /// (remerged if edits are pending, carried through verbatim
    /// otherwise, and left out entirely when the merge comes up
    /// empty), then the PICTURE block under the same rules, then
    /// every other block verbatim in original order.  Only the
    /// final emitted block carries the terminal flag, whatever the
    /// source file claimed.  The audio section is copied over
    /// byte-for-byte.
    ///
    /// The whole output is assembled in memory before any byte is
    /// written, so saving over the source path is safe.
    ///
    /// # Errors
    ///
    /// Passes along any I/O error, the scan errors of
    /// [`open`](FlacFile::open), [`Error::MissingStreaminfo`] if
    /// the file has no STREAMINFO block, and
    /// [`Error::LengthOverflow`] if a rebuilt payload outgrows the
    /// 24-bit block size field.
    pub fn save(&mut self, output: Option<&Path>) -> Result<(), Error> {
        self.file.seek(SeekFrom::Start(0))?;
        let blocks = metadata::read_blocks(BufReader::new(&mut self.file))
            .collect::<Result<Vec<_>, _>>()?;

        let last = blocks.last().ok_or(Error::MissingStreaminfo)?;
        let audio_start = last.next_offset();

        let find = |t: BlockType| blocks.iter().find(|b| b.header.block_type == t);

        let streaminfo = find(BlockType::Streaminfo).ok_or(Error::MissingStreaminfo)?;

        let mut emitted: Vec<(BlockType, Vec<u8>)> = Vec::with_capacity(blocks.len() + 1);
        emitted.push((BlockType::Streaminfo, streaminfo.data.clone()));

        if self.ops.is_empty() {
            if let Some(block) = find(BlockType::VorbisComment) {
                emitted.push((BlockType::VorbisComment, block.data.clone()));
            }
        } else {
            let merged = comment::merge(&self.parsed_comments, &self.ops);
            if !merged.is_empty() {
                let payload = VorbisComment {
                    comments: merged,
                    ..VorbisComment::default()
                }
                .to_bytes()?;
                emitted.push((BlockType::VorbisComment, payload));
            }
        }

        if let Some(picture) = &self.pending_cover {
            emitted.push((BlockType::Picture, picture.to_bytes()?));
        } else if !self.remove_cover {
            if let Some(block) = find(BlockType::Picture) {
                emitted.push((BlockType::Picture, block.data.clone()));
            }
        }

        emitted.extend(
            blocks
                .iter()
                .filter(|b| {
                    !matches!(
                        b.header.block_type,
                        BlockType::Streaminfo | BlockType::VorbisComment | BlockType::Picture,
                    )
                })
                .map(|b| (b.header.block_type, b.data.clone())),
        );

        self.file.seek(SeekFrom::Start(audio_start))?;
        let mut audio = Vec::new();
        self.file.read_to_end(&mut audio)?;

        let metadata_len: usize = emitted
            .iter()
            .map(|(_, payload)| BlockHeader::SIZE as usize + payload.len())
            .sum();
        let mut out = Vec::with_capacity(FLAC_TAG.len() + metadata_len + audio.len());
        out.extend_from_slice(FLAC_TAG);

        let mut w = BitWriter::endian(&mut out, BigEndian);
        let count = emitted.len();
        for (i, (block_type, payload)) in emitted.iter().enumerate() {
            w.build(&BlockHeader {
                last: i + 1 == count,
                block_type: *block_type,
                size: payload.len().try_into()?,
            })?;
            w.write_bytes(payload)?;
        }

        out.extend_from_slice(&audio);

        File::create(output.unwrap_or(&self.path))?.write_all(&out)?;
        Ok(())
    }
}

impl std::fmt::Debug for FlacFile {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FlacFile")
            .field("path", &self.path)
            .field("blocks", &self.blocks.len())
            .field("comments", &self.parsed_comments.len())
            .field("pending_ops", &self.ops.len())
            .finish_non_exhaustive()
    }
}
