// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling a FLAC file's metadata blocks
//!
//! Many items are capitalized simply because they were capitalized
//! in the original FLAC format documentation.
//!
//! # Metadata Blocks
//!
//! FLAC supports seven different metadata block types
//!
//! | Block Type | Handling |
//! |-----------:|---------|
//! | STREAMINFO | carried through verbatim, always first |
//! | PADDING | carried through verbatim |
//! | APPLICATION | carried through verbatim |
//! | SEEKTABLE | carried through verbatim |
//! | [VORBIS_COMMENT](`VorbisComment`) | parsed and rewritten |
//! | CUESHEET | carried through verbatim |
//! | [PICTURE](`Picture`) | parsed and rewritten |
//!
//! Reserved or invalid type codes are also carried through verbatim.

use crate::Error;
use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, FromBitStream, ToBitStream};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub mod comment;
pub mod picture;

pub use comment::{Comment, TagOp, VorbisComment};
pub use picture::Picture;

/// The tag which must occupy a FLAC file's first 4 bytes
pub const FLAC_TAG: &[u8; 4] = b"fLaC";

/// A FLAC metadata block type code
///
/// Code 127 is invalid per the FLAC format documentation and
/// codes 7 through 126 are reserved for future use, but both
/// are treated identically here: the verbatim code is retained
/// so unrecognized blocks round-trip unchanged.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockType {
    /// The STREAMINFO block
    Streaminfo,
    /// The PADDING block
    Padding,
    /// The APPLICATION block
    Application,
    /// The SEEKTABLE block
    SeekTable,
    /// The VORBIS_COMMENT block
    VorbisComment,
    /// The CUESHEET block
    Cuesheet,
    /// The PICTURE block
    Picture,
    /// A reserved or invalid block type, carrying its verbatim code
    Invalid(u8),
}

impl BlockType {
    /// Converts a 7-bit type code to a `BlockType`
    pub fn from_code(code: u8) -> Self {
        match code & 0x7F {
            0 => Self::Streaminfo,
            1 => Self::Padding,
            2 => Self::Application,
            3 => Self::SeekTable,
            4 => Self::VorbisComment,
            5 => Self::Cuesheet,
            6 => Self::Picture,
            code => Self::Invalid(code),
        }
    }

    /// Returns our 7-bit type code
    pub fn code(self) -> u8 {
        match self {
            Self::Streaminfo => 0,
            Self::Padding => 1,
            Self::Application => 2,
            Self::SeekTable => 3,
            Self::VorbisComment => 4,
            Self::Cuesheet => 5,
            Self::Picture => 6,
            Self::Invalid(code) => code,
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Streaminfo => "STREAMINFO".fmt(f),
            Self::Padding => "PADDING".fmt(f),
            Self::Application => "APPLICATION".fmt(f),
            Self::SeekTable => "SEEKTABLE".fmt(f),
            Self::VorbisComment => "VORBIS_COMMENT".fmt(f),
            Self::Cuesheet => "CUESHEET".fmt(f),
            Self::Picture => "PICTURE".fmt(f),
            Self::Invalid(_) => "INVALID".fmt(f),
        }
    }
}

impl FromBitStream for BlockType {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        r.read::<7, u8>().map(Self::from_code)
    }
}

impl ToBitStream for BlockType {
    type Error = std::io::Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        w.write::<7, u8>(self.code())
    }
}

/// A 24-bit block size value, with safeguards against overflow
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct BlockSize(u32);

impl BlockSize {
    /// The largest possible block size, in bytes
    pub const MAX: u32 = (1 << 24) - 1;

    /// Our current value as a u32
    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for BlockSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<usize> for BlockSize {
    type Error = Error;

    fn try_from(u: usize) -> Result<Self, Error> {
        u32::try_from(u)
            .ok()
            .filter(|s| *s <= Self::MAX)
            .map(Self)
            .ok_or(Error::LengthOverflow)
    }
}

impl TryFrom<u32> for BlockSize {
    type Error = Error;

    fn try_from(u: u32) -> Result<Self, Error> {
        (u <= Self::MAX)
            .then_some(Self(u))
            .ok_or(Error::LengthOverflow)
    }
}

impl From<BlockSize> for u32 {
    #[inline]
    fn from(size: BlockSize) -> u32 {
        size.0
    }
}

impl FromBitStream for BlockSize {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        r.read::<24, _>().map(Self)
    }
}

impl ToBitStream for BlockSize {
    type Error = std::io::Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        w.write::<24, _>(self.0)
    }
}

/// A FLAC metadata block header
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 1    | `last` | final metadata block in file |
/// | 7    | `block_type` | type of block |
/// | 24   | `size` | block size, in bytes |
///
/// # Example
/// ```
/// use bitstream_io::{BitReader, BitRead, BigEndian};
/// use flac_metaedit::metadata::{BlockHeader, BlockType};
///
/// let data: &[u8] = &[0b1_0000100, 0x00, 0x00, 0x22];
/// let mut r = BitReader::endian(data, BigEndian);
/// assert_eq!(
///     r.parse::<BlockHeader>().unwrap(),
///     BlockHeader {
///         last: true,                            // 0b1
///         block_type: BlockType::VorbisComment,  // 0b0000100
///         size: 0x22u32.try_into().unwrap(),     // 0x00, 0x00, 0x22
///     },
/// );
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BlockHeader {
    /// Whether we are the final block
    pub last: bool,
    /// Our block type
    pub block_type: BlockType,
    /// Our block size, in bytes
    pub size: BlockSize,
}

impl BlockHeader {
    /// Size of an encoded header, in bytes
    pub const SIZE: u64 = (1 + 7 + 24) / 8;
}

impl FromBitStream for BlockHeader {
    type Error = std::io::Error;

    fn from_reader<R: BitRead + ?Sized>(r: &mut R) -> Result<Self, Self::Error> {
        Ok(Self {
            last: r.read::<1, _>()?,
            block_type: r.parse()?,
            size: r.parse()?,
        })
    }
}

impl ToBitStream for BlockHeader {
    type Error = std::io::Error;

    fn to_writer<W: BitWrite + ?Sized>(&self, w: &mut W) -> Result<(), Self::Error> {
        w.write::<1, _>(self.last)?;
        w.build(&self.block_type)?;
        w.build(&self.size)?;
        Ok(())
    }
}

/// A raw metadata block read from a FLAC file
///
/// Blocks are produced only by a full sequential scan of the
/// file's metadata section and are immutable once constructed;
/// edits are expressed as pending state on the owning
/// [`FlacFile`](crate::file::FlacFile) and applied at save time.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MetadataBlock {
    /// Absolute offset of the block's header in the file
    pub offset: u64,
    /// The block's decoded header
    pub header: BlockHeader,
    /// The verbatim 4 header bytes, as found on disk
    pub raw_header: [u8; 4],
    /// The block's payload, exactly `header.size` bytes
    pub data: Vec<u8>,
}

impl MetadataBlock {
    /// Total size of the block in the file, header included
    pub fn total_len(&self) -> u64 {
        BlockHeader::SIZE + self.data.len() as u64
    }

    /// Absolute offset of whatever follows this block
    pub fn next_offset(&self) -> u64 {
        self.offset + self.total_len()
    }
}

/// An iterator over FLAC metadata blocks
pub struct BlockIterator<R: std::io::Read> {
    reader: R,
    offset: u64,
    failed: bool,
    tag_read: bool,
    vorbiscomment_read: bool,
    finished: bool,
}

impl<R: std::io::Read> BlockIterator<R> {
    /// Creates an iterator over something that implements `Read`.
    /// Because this may perform many small reads,
    /// performance is greatly improved by buffering reads
    /// when reading from a raw `File`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            failed: false,
            tag_read: false,
            vorbiscomment_read: false,
            finished: false,
        }
    }

    fn read_block(&mut self) -> Result<MetadataBlock, Error> {
        use std::io::Read;

        let offset = self.offset;

        let mut raw_header = [0; 4];
        self.reader
            .read_exact(&mut raw_header)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => Error::TruncatedHeader { offset },
                _ => Error::Io(e),
            })?;

        let header: BlockHeader = BitReader::endian(raw_header.as_slice(), BigEndian).parse()?;

        let expected = header.size.get();
        let mut data = Vec::with_capacity(expected as usize);
        self.reader
            .by_ref()
            .take(expected.into())
            .read_to_end(&mut data)?;
        if data.len() != expected as usize {
            return Err(Error::TruncatedBlock {
                offset,
                expected,
                found: data.len(),
            });
        }

        let block = MetadataBlock {
            offset,
            header,
            raw_header,
            data,
        };

        self.offset = block.next_offset();
        self.finished = header.last;
        Ok(block)
    }
}

impl<R: std::io::Read> Iterator for BlockIterator<R> {
    type Item = Result<MetadataBlock, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.finished {
            // once we hit an error or the terminal block, stop any further reads
            None
        } else if !self.tag_read {
            // "fLaC" tag must come before anything else
            let mut tag = [0; 4];
            match self.reader.read_exact(&mut tag) {
                Ok(()) if &tag == FLAC_TAG => {
                    self.tag_read = true;
                    self.offset = FLAC_TAG.len() as u64;
                    self.next()
                }
                Ok(()) => {
                    self.failed = true;
                    Some(Err(Error::NotAFlacFile { found: tag }))
                }
                Err(err) => {
                    self.failed = true;
                    Some(Err(Error::Io(err)))
                }
            }
        } else {
            match self.read_block() {
                Ok(block) if block.header.block_type == BlockType::VorbisComment => {
                    // at most one VORBIS_COMMENT block is permitted,
                    // and a second one is surfaced rather than repaired
                    if !self.vorbiscomment_read {
                        self.vorbiscomment_read = true;
                        Some(Ok(block))
                    } else {
                        self.failed = true;
                        Some(Err(Error::DuplicateVorbisBlock))
                    }
                }
                Ok(block) => Some(Ok(block)),
                Err(err) => {
                    self.failed = true;
                    Some(Err(err))
                }
            }
        }
    }
}

/// Returns iterator of blocks from the given reader
///
/// The reader should be positioned at the start of the FLAC file.
///
/// Because this may perform many small reads,
/// using a buffered reader may greatly improve performance
/// when reading from a raw `File`.
///
/// # Example
///
/// ```
/// use flac_metaedit::metadata::{read_blocks, BlockType};
///
/// let flac: &[u8] = &[
///     0x66, 0x4c, 0x61, 0x43,  // "fLaC"
///     0x80, 0x00, 0x00, 0x02,  // last STREAMINFO block, 2 bytes
///     0xaa, 0xbb,              // (stub payload)
/// ];
///
/// let blocks = read_blocks(flac)
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
///
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].offset, 4);
/// assert_eq!(blocks[0].header.block_type, BlockType::Streaminfo);
/// assert!(blocks[0].header.last);
/// assert_eq!(blocks[0].data, &[0xaa, 0xbb]);
/// ```
pub fn read_blocks<R: std::io::Read>(r: R) -> BlockIterator<R> {
    BlockIterator::new(r)
}

/// Returns all metadata blocks from the given path, in on-disk order
///
/// # Errors
///
/// Returns any I/O error from opening or reading the path,
/// or any error from parsing individual blocks.
pub fn blocks<P: AsRef<Path>>(p: P) -> Result<Vec<MetadataBlock>, Error> {
    File::open(p.as_ref())
        .map_err(Error::Io)
        .and_then(|f| read_blocks(BufReader::new(f)).collect())
}

/// A bounds-checked cursor over a single block's payload bytes
///
/// Reads past the payload's end yield `UnexpectedEndOfBlock`
/// carrying the offending payload offset.
pub(crate) struct PayloadCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        match self.data[self.pos..].get(..len) {
            Some(bytes) => {
                self.pos += len;
                Ok(bytes)
            }
            None => Err(Error::UnexpectedEndOfBlock {
                offset: self.pos,
                needed: len,
            }),
        }
    }

    pub fn u32_le(&mut self) -> Result<u32, Error> {
        let mut word = [0; 4];
        word.copy_from_slice(self.bytes(4)?);
        Ok(u32::from_le_bytes(word))
    }

    pub fn u32_be(&mut self) -> Result<u32, Error> {
        let mut word = [0; 4];
        word.copy_from_slice(self.bytes(4)?);
        Ok(u32::from_be_bytes(word))
    }

    pub fn string(&mut self, len: usize) -> Result<String, Error> {
        self.bytes(len)
            .and_then(|b| String::from_utf8(b.to_vec()).map_err(Error::Utf8))
    }
}
