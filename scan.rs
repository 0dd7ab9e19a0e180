use crate::error::{Error, Result};
use crate::validator;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_128;

const SUPPORTED_EXT: &[&str] = &["jpg", "jpeg", "png"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXT.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Picks the image to classify: the default upload path when it holds a
/// valid image, otherwise the most recently modified valid image in
/// `upload_dir`.
pub fn find_input_image(default_image: &Path, upload_dir: &Path) -> Result<PathBuf> {
    if default_image.is_file() && validator::is_valid(default_image) {
        log::debug!("Using default image {}", default_image.display());
        return Ok(default_image.to_path_buf());
    }
    if !upload_dir.is_dir() {
        return Err(Error::NotFound(format!(
            "upload directory {} does not exist",
            upload_dir.display()
        )));
    }

    let newest = WalkDir::new(upload_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_supported_image(e.path()))
        .filter(|e| {
            let valid = validator::is_valid(e.path());
            if !valid {
                log::warn!("Skipping invalid image {}", e.path().display());
            }
            valid
        })
        .map(|e| {
            let mtime = e
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (mtime, e.into_path())
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

    match newest {
        Some((_, path)) => {
            log::debug!("Newest image in {}: {}", upload_dir.display(), path.display());
            Ok(path)
        }
        None => Err(Error::NotFound(format!(
            "no valid image files in {}",
            upload_dir.display()
        ))),
    }
}

/// The upload's original filename, when the companion record exists and
/// is not blank.
pub fn read_original_filename(record: &Path) -> Option<String> {
    match fs::read_to_string(record) {
        Ok(contents) => {
            let name = contents.trim();
            if name.is_empty() {
                None
            } else {
                Some(name.to_lowercase())
            }
        }
        Err(err) => {
            log::debug!("No original filename record at {}: {}", record.display(), err);
            None
        }
    }
}

pub fn fingerprint(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    let digest = xxh3_128(&data);
    Ok(format!("{:x}", digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    fn touch(path: &Path, bytes: &[u8], age_secs: u64) {
        fs::write(path, bytes).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn empty_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_input_image(&dir.path().join("image.jpg"), dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        let err = find_input_image(&uploads.join("image.jpg"), &uploads).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn default_image_wins_when_valid() {
        let dir = tempfile::tempdir().unwrap();
        let default = dir.path().join("image.jpg");
        touch(&default, JPEG, 600);
        touch(&dir.path().join("newer.jpg"), JPEG, 0);
        assert_eq!(find_input_image(&default, dir.path()).unwrap(), default);
    }

    #[test]
    fn newest_valid_image_is_chosen() {
        let dir = tempfile::tempdir().unwrap();
        let default = dir.path().join("image.jpg");
        touch(&default, b"not really a jpeg", 0);
        touch(&dir.path().join("old.jpg"), JPEG, 300);
        touch(&dir.path().join("recent.png"), &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], 60);
        touch(&dir.path().join("corrupt.jpg"), &[0x00, 0x01], 1);
        touch(&dir.path().join("notes.txt"), JPEG, 0);
        let found = find_input_image(&default, dir.path()).unwrap();
        assert_eq!(found, dir.path().join("recent.png"));
    }

    #[test]
    fn only_invalid_images_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("broken.jpg"), b"oops", 0);
        let err = find_input_image(&dir.path().join("image.jpg"), dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn original_filename_record_is_trimmed_and_lowercased() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("original_filename.txt");
        assert_eq!(read_original_filename(&record), None);
        fs::write(&record, "  \n").unwrap();
        assert_eq!(read_original_filename(&record), None);
        fs::write(&record, "My_Sushi_Plate.JPG\n").unwrap();
        assert_eq!(
            read_original_filename(&record).as_deref(),
            Some("my_sushi_plate.jpg")
        );
    }

    #[test]
    fn fingerprint_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, JPEG).unwrap();
        fs::write(&b, JPEG).unwrap();
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
        fs::write(&b, b"different").unwrap();
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }
}
