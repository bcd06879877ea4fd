use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

const FALLBACK_NAME: &str = "upload";
const MAX_NAME_LEN: usize = 128;

/// Reduces an untrusted client filename to a single safe ASCII path component.
///
/// Accented letters are decomposed (NFKD) and lose their marks, separators
/// become spaces, whitespace runs become `_`, anything outside
/// `[A-Za-z0-9_.-]` is removed and leading or trailing dots and underscores
/// are stripped, so `..` and hidden names cannot survive. Returns `"upload"`
/// when nothing usable remains.
pub fn sanitize_filename(raw: &str) -> String {
    let spaced: String = raw
        .nfkd()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    let mut name: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    while name.ends_with('.') || name.ends_with('_') {
        name.pop();
    }
    name
}

pub fn scratch_name(client_filename: &str) -> String {
    format!("{}_{}", Uuid::new_v4().simple(), sanitize_filename(client_filename))
}

/// An upload staged on disk for the lifetime of one request.
///
/// The file is deleted by [`ScratchFile::remove`] or, on any path that skips
/// it (early return, `?`, panic unwinding), when the guard is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: Option<PathBuf>,
}

impl ScratchFile {
    pub fn create(dir: &Path, client_filename: &str, bytes: &[u8]) -> std::io::Result<Self> {
        let path = dir.join(scratch_name(client_filename));
        // create_new refuses to clobber another request's file.
        let mut file: File = OpenOptions::new().write(true).create_new(true).open(&path)?;
        let staged = Self { path: Some(path) };
        file.write_all(bytes)?;
        file.sync_all()?;
        log::debug!("Staged {} bytes at {}", bytes.len(), staged.path().display());
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub fn remove(mut self) -> std::io::Result<()> {
        match self.path.take() {
            Some(path) => {
                let result = fs::remove_file(&path);
                if result.is_ok() {
                    log::debug!("Removed scratch file {}", path.display());
                }
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to remove scratch file {}: {}", path.display(), e);
                }
            }
        }
    }
}

pub fn ensure_scratch_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    log::info!("Scratch directory: {}", dir.display());
    Ok(())
}
