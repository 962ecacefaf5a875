use flac_metaedit::metadata::{BlockType, Picture, picture::detect_media_type};
use flac_metaedit::{Error, FlacFile};
use std::path::PathBuf;

fn png_bytes() -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\x0a".to_vec();
    data.resize(4096, 0);
    fastrand::seed(0x706e67);
    data[8..].fill_with(|| fastrand::u8(..));
    data
}

fn block(last: bool, code: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![u8::from(last) << 7 | code];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(payload);
    out
}

fn flac(blocks: &[(u8, &[u8])]) -> Vec<u8> {
    let mut out = b"fLaC".to_vec();
    for (i, (code, payload)) in blocks.iter().enumerate() {
        out.extend(block(i + 1 == blocks.len(), *code, payload));
    }
    out.extend_from_slice(b"audio");
    out
}

struct TempFile(PathBuf);

impl TempFile {
    fn new(extension: &str, bytes: &[u8]) -> Self {
        let path = std::env::temp_dir().join(format!(
            "flac-metaedit-test-{:016x}.{extension}",
            fastrand::u64(..)
        ));
        std::fs::write(&path, bytes).unwrap();
        Self(path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn test_detect_media_type() {
    fn padded(magic: &[u8]) -> Vec<u8> {
        let mut data = magic.to_vec();
        data.resize(512, 0);
        data
    }

    assert_eq!(
        detect_media_type(&padded(b"\x89PNG\r\n\x1a\x0a")).unwrap(),
        "image/png",
    );
    assert_eq!(
        detect_media_type(&padded(b"\xFF\xD8\xFF\xE1")).unwrap(),
        "image/jpeg",
    );
    assert_eq!(detect_media_type(&padded(b"GIF87a")).unwrap(), "image/gif");
    assert_eq!(detect_media_type(&padded(b"GIF89a")).unwrap(), "image/gif");
    assert_eq!(
        detect_media_type(&padded(b"RIFF\x22\x00\x00\x00WEBP")).unwrap(),
        "image/webp",
    );
    assert_eq!(detect_media_type(&padded(b"BM")).unwrap(), "image/bmp");

    assert!(matches!(
        detect_media_type(&padded(b"no image here")),
        Err(Error::UnsupportedImageFormat),
    ));

    // 511 bytes is one too few, however obvious the magic
    assert!(matches!(
        detect_media_type(&padded(b"\x89PNG\r\n\x1a\x0a")[..511]),
        Err(Error::ImageTooSmall(511)),
    ));
}

#[test]
fn test_picture_roundtrip() {
    let picture = Picture::from_sniffed_bytes(png_bytes()).unwrap();

    assert_eq!(picture.picture_type, Picture::FRONT_COVER);
    assert_eq!(picture.media_type, "image/png");
    assert_eq!(picture.description, "");
    assert_eq!((picture.width, picture.height), (600, 600));
    assert_eq!(picture.color_depth, 24);
    assert_eq!(picture.colors_used, 0);

    let payload = picture.to_bytes().unwrap();
    assert_eq!(Picture::parse(&payload).unwrap(), picture);
}

#[test]
fn test_parse_truncated_payload() {
    let mut payload = Picture::from_sniffed_bytes(png_bytes())
        .unwrap()
        .to_bytes()
        .unwrap();

    // cut into the image data, leaving its declared length intact
    payload.truncate(payload.len() - 100);

    assert!(matches!(
        Picture::parse(&payload),
        Err(Error::UnexpectedEndOfBlock { .. }),
    ));
}

#[test]
fn test_set_cover() {
    let tmp = TempFile::new("flac", &flac(&[(0, &[0x11; 34])]));

    let mut flac = FlacFile::open(&tmp.0).unwrap();
    assert!(flac.cover().unwrap().is_none());
    flac.set_cover_from_bytes(png_bytes()).unwrap();
    flac.save(None).unwrap();

    let flac = FlacFile::open(&tmp.0).unwrap();
    let cover = flac.cover().unwrap().unwrap();
    assert_eq!(cover.media_type, "image/png");
    assert_eq!(cover.data, png_bytes());
}

#[test]
fn test_replace_cover() {
    let original = Picture::from_sniffed_bytes(png_bytes()).unwrap();
    let tmp = TempFile::new(
        "flac",
        &flac(&[
            (0, &[0x11; 34]),
            (6, &original.to_bytes().unwrap()),
            (1, &[0; 8]),
        ]),
    );

    let mut jpeg = b"\xFF\xD8\xFF\xE0".to_vec();
    jpeg.resize(2048, 0x5A);

    let mut flac = FlacFile::open(&tmp.0).unwrap();
    assert_eq!(flac.cover().unwrap().unwrap(), original);
    flac.set_cover_from_bytes(jpeg.clone()).unwrap();
    flac.save(None).unwrap();

    let flac = FlacFile::open(&tmp.0).unwrap();
    let cover = flac.cover().unwrap().unwrap();
    assert_eq!(cover.media_type, "image/jpeg");
    assert_eq!(cover.data, jpeg);

    // the replacement keeps the block's slot, and only one remains
    assert_eq!(
        flac.blocks()
            .iter()
            .map(|b| b.header.block_type)
            .collect::<Vec<_>>(),
        vec![BlockType::Streaminfo, BlockType::Picture, BlockType::Padding],
    );
}

#[test]
fn test_set_cover_from_path() {
    let image = TempFile::new("png", &png_bytes());
    let tmp = TempFile::new("flac", &flac(&[(0, &[0x11; 34])]));

    let mut flac = FlacFile::open(&tmp.0).unwrap();
    flac.set_cover_from_path(&image.0).unwrap();
    flac.save(None).unwrap();

    let cover = FlacFile::open(&tmp.0).unwrap().cover().unwrap().unwrap();
    assert_eq!(cover.data, png_bytes());
}

#[test]
fn test_remove_cover() {
    let cover = Picture::from_sniffed_bytes(png_bytes()).unwrap();
    let tmp = TempFile::new(
        "flac",
        &flac(&[(0, &[0x11; 34]), (6, &cover.to_bytes().unwrap())]),
    );

    let mut flac = FlacFile::open(&tmp.0).unwrap();
    flac.remove_cover(false).unwrap();
    flac.save(None).unwrap();

    let mut flac = FlacFile::open(&tmp.0).unwrap();
    assert!(flac.cover().unwrap().is_none());
    assert_eq!(flac.blocks().len(), 1);

    // now there is nothing left to remove
    assert!(matches!(
        flac.remove_cover(false),
        Err(Error::MissingCoverPicture),
    ));
    assert!(flac.remove_cover(true).is_ok());
}

#[test]
fn test_reject_unknown_image() {
    let tmp = TempFile::new("flac", &flac(&[(0, &[0x11; 34])]));
    let mut flac = FlacFile::open(&tmp.0).unwrap();

    assert!(matches!(
        flac.set_cover_from_bytes(vec![0x00; 1024]),
        Err(Error::UnsupportedImageFormat),
    ));
    assert!(matches!(
        flac.set_cover_from_bytes(vec![0x00; 100]),
        Err(Error::ImageTooSmall(100)),
    ));
}
