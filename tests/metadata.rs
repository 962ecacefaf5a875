use flac_metaedit::Error;
use flac_metaedit::metadata::{BlockType, read_blocks};

fn block(last: bool, code: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![u8::from(last) << 7 | code];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(payload);
    out
}

fn flac(blocks: &[(u8, &[u8])], audio: &[u8]) -> Vec<u8> {
    let mut out = b"fLaC".to_vec();
    for (i, (code, payload)) in blocks.iter().enumerate() {
        out.extend(block(i + 1 == blocks.len(), *code, payload));
    }
    out.extend_from_slice(audio);
    out
}

fn vorbis(vendor: &str, comments: &[&str]) -> Vec<u8> {
    let mut out = (vendor.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(vendor.as_bytes());
    out.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for c in comments {
        out.extend_from_slice(&(c.len() as u32).to_le_bytes());
        out.extend_from_slice(c.as_bytes());
    }
    out
}

#[test]
fn test_scan_blocks() {
    let streaminfo = [0x11; 34];
    let comment = vorbis("test vendor", &["TITLE=X"]);
    let padding = [0; 10];

    let flac = flac(
        &[(0, &streaminfo), (4, &comment), (1, &padding)],
        b"audio bytes",
    );

    let blocks = read_blocks(flac.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(blocks.len(), 3);
    assert_eq!(
        blocks
            .iter()
            .map(|b| b.header.block_type)
            .collect::<Vec<_>>(),
        vec![
            BlockType::Streaminfo,
            BlockType::VorbisComment,
            BlockType::Padding,
        ],
    );
    assert_eq!(
        blocks.iter().map(|b| b.header.last).collect::<Vec<_>>(),
        vec![false, false, true],
    );

    // offsets chain through the file, payloads come back verbatim
    assert_eq!(blocks[0].offset, 4);
    assert_eq!(blocks[0].data, &streaminfo);
    assert_eq!(blocks[1].offset, blocks[0].next_offset());
    assert_eq!(blocks[1].data, comment);
    assert_eq!(blocks[2].offset, blocks[1].next_offset());

    // the scan stops at the terminal block, before the audio
    assert_eq!(blocks[2].next_offset() as usize, flac.len() - b"audio bytes".len());
}

#[test]
fn test_not_a_flac_file() {
    let mut blocks = read_blocks(b"OggS\x00\x00\x00\x00".as_slice());

    assert!(matches!(
        blocks.next(),
        Some(Err(Error::NotAFlacFile { found })) if &found == b"OggS",
    ));

    // the scan is poisoned after an error
    assert!(blocks.next().is_none());
}

#[test]
fn test_truncated_header() {
    // tag then a lone partial header byte
    let flac = b"fLaC\x80";

    assert!(matches!(
        read_blocks(flac.as_slice()).next(),
        Some(Err(Error::TruncatedHeader { offset: 4 })),
    ));

    // tag then nothing at all is just as truncated
    assert!(matches!(
        read_blocks(b"fLaC".as_slice()).next(),
        Some(Err(Error::TruncatedHeader { offset: 4 })),
    ));
}

#[test]
fn test_truncated_block() {
    // header declares 34 payload bytes but only 10 follow
    let mut flac = b"fLaC".to_vec();
    flac.extend(block(true, 0, &[0x22; 34]));
    flac.truncate(4 + 4 + 10);

    assert!(matches!(
        read_blocks(flac.as_slice()).next(),
        Some(Err(Error::TruncatedBlock {
            offset: 4,
            expected: 34,
            found: 10,
        })),
    ));
}

#[test]
fn test_duplicate_vorbis_block() {
    let comment = vorbis("v", &[]);
    let flac = flac(&[(0, &[0; 34]), (4, &comment), (4, &comment)], b"");

    let results = read_blocks(flac.as_slice()).collect::<Vec<_>>();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(matches!(results[2], Err(Error::DuplicateVorbisBlock)));
}

#[test]
fn test_unknown_block_types() {
    // reserved and invalid type codes scan fine and stay opaque
    let flac = flac(&[(0, &[0; 34]), (99, b"reserved"), (127, b"invalid")], b"");

    let blocks = read_blocks(flac.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(blocks[1].header.block_type, BlockType::Invalid(99));
    assert_eq!(blocks[1].data, b"reserved");
    assert_eq!(blocks[2].header.block_type, BlockType::Invalid(127));
    assert_eq!(blocks[2].data, b"invalid");
}

#[test]
fn test_header_roundtrip() {
    use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};
    use flac_metaedit::metadata::BlockHeader;

    let header = BlockHeader {
        last: true,
        block_type: BlockType::Picture,
        size: 0x0108u32.try_into().unwrap(),
    };

    let mut w = BitWriter::endian(Vec::new(), BigEndian);
    w.build(&header).unwrap();
    let bytes = w.into_writer();
    assert_eq!(bytes, &[0x86, 0x00, 0x01, 0x08]);

    assert_eq!(
        BitReader::endian(bytes.as_slice(), BigEndian)
            .parse::<BlockHeader>()
            .unwrap(),
        header,
    );
}

#[test]
fn test_vorbis_payload_errors() {
    use flac_metaedit::metadata::VorbisComment;

    let good = vorbis("vendor", &["TITLE=X", "ALBUM=Y"]);
    assert_eq!(VorbisComment::parse(&good).unwrap().comments.len(), 2);

    // comment count declares 5 entries but only 2 are present
    let mut overdeclared = good.clone();
    let count_at = 4 + "vendor".len();
    overdeclared[count_at..count_at + 4].copy_from_slice(&5u32.to_le_bytes());
    assert!(matches!(
        VorbisComment::parse(&overdeclared),
        Err(Error::UnexpectedEndOfBlock { .. }),
    ));

    // an entry with no "=" separator at all
    assert!(matches!(
        VorbisComment::parse(&vorbis("vendor", &["TITLE=X", "no separator"])),
        Err(Error::MalformedComment(c)) if c == "no separator",
    ));

    // too short to even hold a vendor length
    assert!(matches!(
        VorbisComment::parse(&[0; 7]),
        Err(Error::VendorLengthTooShort(7)),
    ));
}

#[test]
fn test_block_size_overflow() {
    use flac_metaedit::metadata::BlockSize;

    assert!(BlockSize::try_from(BlockSize::MAX).is_ok());
    assert!(matches!(
        BlockSize::try_from(BlockSize::MAX + 1),
        Err(Error::LengthOverflow),
    ));
    assert!(matches!(
        BlockSize::try_from(usize::MAX),
        Err(Error::LengthOverflow),
    ));
}
