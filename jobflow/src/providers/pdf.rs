//! Letter-size PDF rendering with the built-in Helvetica fonts.
//!
//! Layout and encoding are separate: [`layout_letters`] turns letters into
//! positioned lines per page, and [`PdfRenderer`] writes those pages.

use super::DocumentRenderer;
use crate::core::CoverLetter;
use crate::errors::ProviderError;
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::path::{Path, PathBuf};
use tracing::info;

/// Maximum characters of a letter body that are rendered.
pub const MAX_BODY_CHARS: usize = 1000;

/// Typeface of a rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    /// Helvetica.
    Regular,
    /// Helvetica-Bold.
    Bold,
}

impl Font {
    const fn resource_name(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
        }
    }
}

/// A positioned line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    /// Typeface.
    pub font: Font,
    /// Point size.
    pub size: i64,
    /// Left edge, in points.
    pub x: i64,
    /// Baseline, in points from the bottom.
    pub y: i64,
    /// The text.
    pub text: String,
}

/// Page geometry, in points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    /// Page width.
    pub width: i64,
    /// Page height.
    pub height: i64,
    /// Left margin.
    pub left: i64,
    /// Baseline of the first line.
    pub top: i64,
    /// Lowest allowed baseline.
    pub bottom: i64,
    /// Header size.
    pub header_size: i64,
    /// Body size.
    pub body_size: i64,
    /// Body line advance.
    pub leading: i64,
    /// Space after a block.
    pub block_gap: i64,
    /// Body characters per line.
    pub wrap_width: usize,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: 612,
            height: 792,
            left: 50,
            top: 750,
            bottom: 50,
            header_size: 12,
            body_size: 10,
            leading: 12,
            block_gap: 20,
            wrap_width: 95,
        }
    }
}

/// Lays out one block per letter and paginates.
///
/// Each block is a bold `Job: {title} at {company}` header followed by the
/// first [`MAX_BODY_CHARS`] characters of the letter, word-wrapped. A header
/// never ends a page on its own.
#[must_use]
pub fn layout_letters(letters: &[CoverLetter], layout: &PageLayout) -> Vec<Vec<TextLine>> {
    let mut pages: Vec<Vec<TextLine>> = Vec::new();
    let mut page = Vec::new();
    let mut y = layout.top;

    for letter in letters {
        if y - layout.header_size - layout.leading < layout.bottom {
            pages.push(std::mem::take(&mut page));
            y = layout.top;
        }
        page.push(TextLine {
            font: Font::Bold,
            size: layout.header_size,
            x: layout.left,
            y,
            text: format!(
                "Job: {} at {}",
                letter.job.display_title(),
                letter.job.display_company()
            ),
        });
        y -= layout.block_gap;

        let body: String = letter.letter_text.chars().take(MAX_BODY_CHARS).collect();
        for line in wrap(&body, layout.wrap_width) {
            if y < layout.bottom {
                pages.push(std::mem::take(&mut page));
                y = layout.top;
            }
            page.push(TextLine {
                font: Font::Regular,
                size: layout.body_size,
                x: layout.left,
                y,
                text: line,
            });
            y -= layout.leading;
        }
        y -= layout.block_gap;
    }

    if !page.is_empty() {
        pages.push(page);
    }
    pages
}

/// Wraps text at word boundaries, keeping blank lines between paragraphs.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

/// Maps text to the single-byte encoding of the standard fonts.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => b'\'',
            '\u{201C}' | '\u{201D}' => b'"',
            '\u{2013}' | '\u{2014}' => b'-',
            '\u{2022}' => b'*',
            c if u32::from(c) < 0x100 => u8::try_from(u32::from(c)).unwrap_or(b'?'),
            _ => b'?',
        })
        .collect()
}

fn page_operations(lines: &[TextLine]) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(lines.len() * 5);
    for line in lines {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![line.font.resource_name().into(), Object::Integer(line.size)],
        ));
        ops.push(Operation::new(
            "Td",
            vec![Object::Integer(line.x), Object::Integer(line.y)],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(&line.text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
    }
    ops
}

/// Writes laid-out pages to a PDF document.
pub(crate) fn write_pdf(
    pages: &[Vec<TextLine>],
    layout: &PageLayout,
    output: &Path,
) -> Result<(), ProviderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font = |base: &str| {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base,
            "Encoding" => "WinAnsiEncoding",
        }
    };
    let regular_id = doc.add_object(font("Helvetica"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for lines in pages {
        let content = Content {
            operations: page_operations(lines),
        };
        let bytes = content
            .encode()
            .map_err(|e| ProviderError::Render(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).map_err(|e| ProviderError::Render(e.to_string()))?;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(layout.width),
                Object::Integer(layout.height),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    doc.save(output)?;
    Ok(())
}

/// Renders letters into one Letter-size PDF.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    layout: PageLayout,
}

impl PdfRenderer {
    /// Creates a renderer with the default layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page layout.
    #[must_use]
    pub fn with_layout(mut self, layout: PageLayout) -> Self {
        self.layout = layout;
        self
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    async fn render(
        &self,
        letters: &[CoverLetter],
        output: &Path,
    ) -> Result<PathBuf, ProviderError> {
        let pages = layout_letters(letters, &self.layout);
        let layout = self.layout.clone();
        let path = output.to_path_buf();

        let written = tokio::task::spawn_blocking(move || {
            write_pdf(&pages, &layout, &path).map(|()| (path, pages.len()))
        })
        .await
        .map_err(|e| ProviderError::Render(e.to_string()))??;

        info!(
            path = %written.0.display(),
            pages = written.1,
            letters = letters.len(),
            "PDF generated"
        );
        Ok(written.0)
    }
}
