use std::io;
use std::path::Path;

/// Reads a file's leading bytes and reports the extension its content
/// calls for, without the leading dot (`"png"`, `"mp4"`).
///
/// `Ok(None)` means the content matched no known signature.
pub trait ContentDetector {
    fn detect(&self, path: &Path) -> io::Result<Option<String>>;
}

impl<F> ContentDetector for F
where
    F: Fn(&Path) -> io::Result<Option<String>>,
{
    fn detect(&self, path: &Path) -> io::Result<Option<String>> {
        self(path)
    }
}

/// Magic-byte detection backed by the `infer` signature tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicDetector;

impl ContentDetector for MagicDetector {
    fn detect(&self, path: &Path) -> io::Result<Option<String>> {
        Ok(infer::get_from_path(path)?.map(|kind| kind.extension().to_string()))
    }
}

/// Normalise a detected extension (`"png"` or `".PNG"`) to `".png"`.
pub fn dotted(ext: &str) -> String {
    format!(".{}", ext.trim_start_matches('.').to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[test]
    fn magic_detector_reads_signatures_not_names() {
        let tmp = TempDir::new().unwrap();
        let png = tmp.path().join("really_png.jpg");
        let jpg = tmp.path().join("really_jpg.png");
        let txt = tmp.path().join("notes.bin");
        fs::write(&png, PNG_MAGIC).unwrap();
        fs::write(&jpg, JPEG_MAGIC).unwrap();
        fs::write(&txt, b"plain words").unwrap();

        assert_eq!(MagicDetector.detect(&png).unwrap().as_deref(), Some("png"));
        assert_eq!(MagicDetector.detect(&jpg).unwrap().as_deref(), Some("jpg"));
        assert_eq!(MagicDetector.detect(&txt).unwrap(), None);
    }

    #[test]
    fn magic_detector_surfaces_io_errors() {
        let tmp = TempDir::new().unwrap();
        assert!(MagicDetector.detect(&tmp.path().join("gone")).is_err());
    }

    #[test]
    fn closures_are_detectors() {
        let fixed = |_: &Path| -> io::Result<Option<String>> { Ok(Some("gif".into())) };
        assert_eq!(fixed.detect(Path::new("x")).unwrap().as_deref(), Some("gif"));
    }

    #[test]
    fn dotted_normalises() {
        assert_eq!(dotted("PNG"), ".png");
        assert_eq!(dotted(".webp"), ".webp");
    }
}
