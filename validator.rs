use std::fs::File;
use std::io::Read;
use std::path::Path;

const HEADER_LEN: usize = 12;
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// True when the file starts with a JPEG or PNG signature. Unreadable
/// files count as invalid.
pub fn is_valid(path: &Path) -> bool {
    match read_header(path) {
        Ok(header) => has_image_magic(&header),
        Err(err) => {
            log::debug!("Cannot read header of {}: {}", path.display(), err);
            false
        }
    }
}

pub fn has_image_magic(header: &[u8]) -> bool {
    header.starts_with(JPEG_MAGIC) || header.starts_with(PNG_MAGIC)
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}
