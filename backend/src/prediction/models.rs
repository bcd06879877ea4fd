#[derive(Debug, Clone)]
pub struct UploadedFile {
    // untrusted, sanitized before it reaches the filesystem
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}
