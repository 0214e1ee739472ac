use crate::error::{CaveError, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// The flat directory holding every file referenced by a document.
///
/// Renames stay inside this directory and never replace an existing file.
#[derive(Debug, Clone)]
pub struct MediaDir {
    base_dir: PathBuf,
}

impl MediaDir {
    /// Open an existing media directory.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.is_dir() {
            return Err(CaveError::MissingPath(base_dir));
        }
        Ok(Self { base_dir })
    }

    /// Path of an entry directly inside the directory.
    ///
    /// `name` must be a single plain file name: no separators, no `..`,
    /// not absolute. Anything else is `InvalidInput`.
    pub fn absolute_path(&self, name: &str) -> io::Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => {
                Ok(self.base_dir.join(name))
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{name}' is not a plain file name inside the media directory"),
            )),
        }
    }

    pub fn exists(&self, name: &str) -> io::Result<bool> {
        Ok(self.absolute_path(name)?.exists())
    }

    /// Rename `from` to `to`, both plain names inside the directory.
    ///
    /// Fails with `AlreadyExists` instead of overwriting `to`.
    pub fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let src = self.absolute_path(from)?;
        let dst = self.absolute_path(to)?;
        if dst.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("target '{to}' already exists"),
            ));
        }
        fs::rename(&src, &dst)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_requires_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(MediaDir::open(tmp.path()).is_ok());
        let err = MediaDir::open(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, CaveError::MissingPath(_)));
    }

    #[test]
    fn rename_moves_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), b"x").unwrap();
        let media = MediaDir::open(tmp.path()).unwrap();

        media.rename("a.jpg", "b.jpg").unwrap();
        assert!(!media.exists("a.jpg").unwrap());
        assert!(media.exists("b.jpg").unwrap());
    }

    #[test]
    fn rename_refuses_to_clobber() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), b"a").unwrap();
        fs::write(tmp.path().join("b.jpg"), b"b").unwrap();
        let media = MediaDir::open(tmp.path()).unwrap();

        let err = media.rename("a.jpg", "b.jpg").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(tmp.path().join("a.jpg")).unwrap(), b"a");
        assert_eq!(fs::read(tmp.path().join("b.jpg")).unwrap(), b"b");
    }

    #[test]
    fn rename_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let media = MediaDir::open(tmp.path()).unwrap();
        assert!(media.rename("ghost.png", "x.png").is_err());
    }

    #[test]
    fn names_must_stay_inside_the_directory() {
        let outer = TempDir::new().unwrap();
        let inner = outer.path().join("media");
        fs::create_dir(&inner).unwrap();
        fs::write(inner.join("a.jpg"), b"a").unwrap();
        fs::write(outer.path().join("up.jpg"), b"up").unwrap();
        let media = MediaDir::open(&inner).unwrap();

        let absolute = outer.path().join("moved.jpg").display().to_string();
        for bad in ["../up.jpg", "sub/a.jpg", "", ".", "..", absolute.as_str()] {
            let err = media.absolute_path(bad).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{bad}");
        }
        assert!(media.exists("../up.jpg").is_err());

        let err = media.rename("a.jpg", &absolute).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = media.rename("../up.jpg", "up.jpg").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(inner.join("a.jpg").exists());
        assert!(outer.path().join("up.jpg").exists());
        assert!(!outer.path().join("moved.jpg").exists());
    }
}
