//! Resume text extraction from PDF and DOCX files.

use super::ResumeExtractor;
use crate::errors::ProviderError;
use async_trait::async_trait;
use quick_xml::events::Event;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Resume formats text can be extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFormat {
    /// Page text of a PDF.
    Pdf,
    /// Paragraph text of a Word document.
    Docx,
}

impl ResumeFormat {
    /// Detects the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self, ProviderError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("docx") => Ok(Self::Docx),
            _ => Err(ProviderError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Reads resumes from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResumeExtractor;

impl FileResumeExtractor {
    /// Creates a new extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extracts text synchronously.
    pub fn extract_blocking(path: &Path) -> Result<String, ProviderError> {
        if !path.is_file() {
            return Err(ProviderError::NotFound(path.to_path_buf()));
        }
        let text = match ResumeFormat::from_path(path)? {
            ResumeFormat::Pdf => pdf_extract::extract_text(path)
                .map_err(|e| ProviderError::Extraction(e.to_string()))?,
            ResumeFormat::Docx => docx_text(path)?,
        };
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ResumeExtractor for FileResumeExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ProviderError> {
        let owned = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || Self::extract_blocking(&owned))
            .await
            .map_err(|e| ProviderError::Extraction(e.to_string()))??;
        debug!(path = %path.display(), chars = text.len(), "Resume text extracted");
        Ok(text)
    }
}

/// Paragraph text of `word/document.xml`, one paragraph per line.
fn docx_text(path: &Path) -> Result<String, ProviderError> {
    let file = std::fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ProviderError::Extraction(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| ProviderError::Extraction("missing word/document.xml".into()))?
        .read_to_string(&mut xml)?;

    paragraphs_from_xml(&xml)
}

fn paragraphs_from_xml(xml: &str) -> Result<String, ProviderError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut output = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"p" => {
                    output.push_str(&paragraph);
                    output.push('\n');
                    paragraph.clear();
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| ProviderError::Extraction(err.to_string()))?;
                paragraph.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ProviderError::Extraction(format!("XML parse error: {e}"))),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::io::Write;
    use tempfile::TempDir;

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Skills: </w:t></w:r><w:r><w:t>SQL &amp; Python</w:t></w:r></w:p>
    <w:p/>
  </w:body>
</w:document>"#;

    fn write_docx(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(DOCUMENT_XML.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ResumeFormat::from_path(Path::new("cv.PDF")).unwrap(), ResumeFormat::Pdf);
        assert_eq!(ResumeFormat::from_path(Path::new("cv.docx")).unwrap(), ResumeFormat::Docx);
        let err = ResumeFormat::from_path(Path::new("cv.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_paragraphs_from_xml() {
        let text = paragraphs_from_xml(DOCUMENT_XML).unwrap();
        assert_eq!(text, "Jane Doe\nSkills: SQL & Python\n");
    }

    #[tokio::test]
    async fn test_extract_docx() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resume.docx");
        write_docx(&path);

        let text = FileResumeExtractor::new().extract(&path).await.unwrap();
        assert_eq!(text, "Jane Doe\nSkills: SQL & Python");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = FileResumeExtractor::new()
            .extract(Path::new("/nonexistent/resume.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_existing_unsupported_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resume.odt");
        std::fs::write(&path, "text").unwrap();

        let err = FileResumeExtractor::new().extract(&path).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[tokio::test]
    async fn test_corrupt_docx_is_extraction_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resume.docx");
        std::fs::write(&path, "not a zip").unwrap();

        let err = FileResumeExtractor::new().extract(&path).await.unwrap_err();
        assert!(matches!(err, ProviderError::Extraction(_)));
    }
}
