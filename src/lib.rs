//! A library for editing the metadata section of FLAC files
//!
//! This crate reads, mutates, and rewrites FLAC metadata blocks
//! without ever touching the audio frames, which are copied
//! byte-for-byte when a file is saved.  It interprets only the
//! VORBIS_COMMENT and PICTURE blocks; all other block types are
//! carried through opaquely.
//!
//! # Example
//!
//! ```no_run
//! use flac_metaedit::FlacFile;
//!
//! let mut flac = FlacFile::open("song.flac")?;
//! flac.set("TITLE", "Track Title");
//! flac.set("ARTIST", "Artist Name");
//! flac.save(None)?;  // overwrites "song.flac" in place
//! # Ok::<(), flac_metaedit::Error>(())
//! ```

pub mod file;
pub mod metadata;

pub use file::FlacFile;

/// A general error when processing a FLAC file's metadata
#[derive(Debug)]
pub enum Error {
    /// An I/O error from the underlying stream
    Io(std::io::Error),
    /// A string which is not valid UTF-8
    Utf8(std::string::FromUtf8Error),
    /// File does not begin with the "fLaC" tag
    NotAFlacFile {
        /// The 4 bytes found in place of the tag
        found: [u8; 4],
    },
    /// Stream ended with fewer than 4 block header bytes remaining
    TruncatedHeader {
        /// Absolute offset of the incomplete header
        offset: u64,
    },
    /// Stream ended before a block's declared payload length
    TruncatedBlock {
        /// Absolute offset of the block's header
        offset: u64,
        /// The payload length declared by the header
        expected: u32,
        /// The number of payload bytes actually present
        found: usize,
    },
    /// A declared length within a block points past the block's end
    UnexpectedEndOfBlock {
        /// Offset within the block payload where the read began
        offset: usize,
        /// The number of bytes the read required
        needed: usize,
    },
    /// VORBIS_COMMENT payload too short to hold its vendor length
    VendorLengthTooShort(usize),
    /// A VORBIS_COMMENT entry containing no `=` separator
    MalformedComment(String),
    /// More than one VORBIS_COMMENT block found in file
    DuplicateVorbisBlock,
    /// STREAMINFO block not present at save time
    MissingStreaminfo,
    /// No comment found with the requested field name
    MetadataNotFound(String),
    /// No cover PICTURE block present to remove
    MissingCoverPicture,
    /// Image too small for its media type to be detected
    ImageTooSmall(usize),
    /// Image content matches no supported media type
    UnsupportedImageFormat,
    /// A length too large for its 24-bit or 32-bit field
    LengthOverflow,
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(error: std::string::FromUtf8Error) -> Self {
        Self::Utf8(error)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
            Self::NotAFlacFile { found } => {
                write!(f, "missing \"fLaC\" tag, found {found:02x?}")
            }
            Self::TruncatedHeader { offset } => {
                write!(f, "truncated metadata block header at offset {offset}")
            }
            Self::TruncatedBlock {
                offset,
                expected,
                found,
            } => write!(
                f,
                "truncated metadata block at offset {offset}, \
                 expected {expected} payload bytes, found {found}"
            ),
            Self::UnexpectedEndOfBlock { offset, needed } => write!(
                f,
                "unexpected end of block, {needed} bytes needed at payload offset {offset}"
            ),
            Self::VendorLengthTooShort(len) => {
                write!(f, "VORBIS_COMMENT payload of {len} bytes too short")
            }
            Self::MalformedComment(comment) => {
                write!(f, "comment entry {comment:?} contains no \"=\"")
            }
            Self::DuplicateVorbisBlock => "multiple VORBIS_COMMENT blocks found in file".fmt(f),
            Self::MissingStreaminfo => "STREAMINFO block not found in file".fmt(f),
            Self::MetadataNotFound(field) => {
                write!(f, "no comment found with field {field:?}")
            }
            Self::MissingCoverPicture => "no cover PICTURE block found in file".fmt(f),
            Self::ImageTooSmall(len) => {
                write!(f, "{len} image bytes too few to detect media type")
            }
            Self::UnsupportedImageFormat => "unsupported image format".fmt(f),
            Self::LengthOverflow => "value too large for its length field".fmt(f),
        }
    }
}
