use std::path::Path;
use std::sync::Arc;

/// A named in-memory file, as picked by the operator or read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, text.as_bytes())
    }

    /// Lower-cased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::FileUpload;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(FileUpload::from_text("Area.KML", "").extension().as_deref(), Some("kml"));
        assert_eq!(FileUpload::from_text("noext", "").extension(), None);
    }

    #[test]
    fn invalid_utf8_has_no_text() {
        let f = FileUpload::new("x.kml", vec![0xff, 0xfe]);
        assert!(f.text().is_none());
        assert_eq!(f.len(), 2);
    }
}
