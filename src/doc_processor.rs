use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::prompt::estimate_tokens;

/// Inserted between consecutive pages when their text is concatenated.
pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF parse error in {}: {message}", .path.display())]
    Extraction { path: PathBuf, message: String },
    #[error("Unsupported file type: .{0}")]
    UnsupportedType(String),
    #[error("No PDF files found in {}", .0.display())]
    NoDocuments(PathBuf),
}

/// Extracted plain text of a document, loaded once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source_path: PathBuf,
    pub file_type: String,
    pub text: String,
    pub page_count: usize,
}

impl Document {
    /// Join page texts in order, separated by a blank line.
    pub fn from_pages(
        source_path: impl Into<PathBuf>,
        file_type: impl Into<String>,
        pages: Vec<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            file_type: file_type.into(),
            text: pages.join(PAGE_SEPARATOR),
            page_count: pages.len(),
        }
    }

    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_path.display().to_string())
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }

    /// First `max_chars` characters, with an ellipsis when the text is longer.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.text.chars();
        let mut preview: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            preview.push_str("...");
        }
        preview
    }
}

/// Load a document file into plain text.
///
/// PDFs are extracted page by page; `.txt` and `.md` files are read as a
/// single page. Every call re-reads the file.
pub fn load_document(path: &Path) -> Result<Document, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    info!(path = %path.display(), "Extracting text");

    let document = match ext.as_str() {
        "txt" => Document::from_pages(path, "txt", vec![read_text(path)?]),
        "md" | "markdown" => Document::from_pages(path, "md", vec![read_text(path)?]),
        "pdf" => {
            let bytes = fs::read(path).map_err(|source| DocumentError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let pages = extract_pdf_pages(path, &bytes)?;
            Document::from_pages(path, "pdf", pages)
        }
        _ => return Err(DocumentError::UnsupportedType(ext)),
    };

    info!(
        pages = document.page_count,
        words = document.word_count(),
        chars = document.char_count(),
        est_tokens = document.estimated_tokens(),
        "Extraction complete"
    );
    Ok(document)
}

fn read_text(path: &Path) -> Result<String, DocumentError> {
    fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn extract_pdf_pages(path: &Path, bytes: &[u8]) -> Result<Vec<String>, DocumentError> {
    // pdf-extract panics on some malformed font and stream data.
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    let message = match extracted {
        Ok(Ok(pages)) => {
            for (i, page) in pages.iter().enumerate() {
                debug!(page = i + 1, total = pages.len(), chars = page.len(), "Page extracted");
            }
            return Ok(pages);
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => "parser aborted on malformed content".to_string(),
    };

    Err(DocumentError::Extraction {
        path: path.to_path_buf(),
        message,
    })
}

/// List the PDF files directly inside `dir`, sorted by path.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    if !dir.is_dir() {
        return Err(DocumentError::NotFound(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|source| DocumentError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if pdfs.is_empty() {
        return Err(DocumentError::NoDocuments(dir.to_path_buf()));
    }
    pdfs.sort();
    Ok(pdfs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Build an in-memory PDF with one line of Courier text per page.
    fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => texts.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_pdf_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.pdf");
        fs::write(&path, pdf_with_pages(&["Alpha", "Bravo", "Charlie"])).unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.file_type, "pdf");

        let a = doc.text.find("Alpha").unwrap();
        let b = doc.text.find("Bravo").unwrap();
        let c = doc.text.find("Charlie").unwrap();
        assert!(a < b && b < c);
        assert!(doc.text[a..b].contains(PAGE_SEPARATOR));
        assert!(doc.text[b..c].contains(PAGE_SEPARATOR));
    }

    #[test]
    fn test_missing_file() {
        let err = load_document(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }

    #[test]
    fn test_corrupt_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"this is not a pdf at all").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, DocumentError::Extraction { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.xlsx");
        fs::write(&path, b"cells").unwrap();

        match load_document(&path).unwrap_err() {
            DocumentError::UnsupportedType(ext) => assert_eq!(ext, "xlsx"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_text_file_is_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.TXT");
        fs::write(&path, "one two three").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.text, "one two three");
        assert_eq!(doc.word_count(), 3);
        assert_eq!(doc.file_name(), "notes.TXT");
    }

    #[test]
    fn test_from_pages_joins_with_blank_line() {
        let doc = Document::from_pages("x.pdf", "pdf", vec!["a".into(), "b".into(), String::new()]);
        assert_eq!(doc.text, "a\n\nb\n\n");
        assert_eq!(doc.page_count, 3);

        let empty = Document::from_pages("x.pdf", "pdf", vec![]);
        assert_eq!(empty.text, "");
        assert_eq!(empty.page_count, 0);
    }

    #[test]
    fn test_preview() {
        let doc = Document::from_pages("x.txt", "txt", vec!["héllo world".into()]);
        assert_eq!(doc.preview(5), "héllo...");
        assert_eq!(doc.preview(100), "héllo world");
        assert_eq!(doc.char_count(), 11);
    }

    #[test]
    fn test_discover_documents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.pdf"), b"").unwrap();
        fs::write(dir.path().join("a.PDF"), b"").unwrap();
        fs::write(dir.path().join("readme.md"), b"").unwrap();
        fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let found = discover_documents(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn test_discover_documents_empty_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_documents(dir.path()),
            Err(DocumentError::NoDocuments(_))
        ));
        assert!(matches!(
            discover_documents(&dir.path().join("nope")),
            Err(DocumentError::NotFound(_))
        ));
    }
}
