use crate::error::IngestError;
use crate::models::PageText;
use lopdf::Document;
use std::path::Path;

const FORM_FEED: char = '\u{000c}';

pub trait PageExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PageExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// Plain UTF-8 files. Form feeds separate pages; a file without one is a single page.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExtractor;

impl PageExtractor for TextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let raw = std::fs::read_to_string(path)?;
        let pages = split_pages(&raw);

        if pages.is_empty() {
            return Err(IngestError::EmptyDocument(path.display().to_string()));
        }

        Ok(pages)
    }
}

fn split_pages(raw: &str) -> Vec<PageText> {
    raw.split(FORM_FEED)
        .enumerate()
        .filter_map(|(index, page)| {
            if page.trim().is_empty() {
                None
            } else {
                Some(PageText {
                    number: (index + 1) as u32,
                    text: page.to_string(),
                })
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" | "text" => Some(Self::Text),
            _ => None,
        }
    }
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, IngestError> {
    match DocumentFormat::from_path(path) {
        Some(DocumentFormat::Pdf) => LopdfExtractor.extract_pages(path),
        Some(DocumentFormat::Text) => TextExtractor.extract_pages(path),
        None => Err(IngestError::UnsupportedFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn form_feed_splits_pages_and_skips_blank_ones() {
        let pages = split_pages("First\u{000C}  \n\u{000C}Third\n");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "First");
        assert_eq!(pages[1].number, 3);
        assert_eq!(pages[1].text, "Third\n");
    }

    #[test]
    fn text_file_without_form_feed_is_one_page() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("guide.txt");
        fs::write(&path, "The allowance is 500 units.")?;

        let pages = extract_page_texts(&path)?;
        assert_eq!(
            pages,
            vec![PageText {
                number: 1,
                text: "The allowance is 500 units.".to_string()
            }]
        );
        Ok(())
    }

    #[test]
    fn blank_text_file_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.md");
        fs::write(&path, " \n\t")?;

        assert!(matches!(
            extract_page_texts(&path),
            Err(IngestError::EmptyDocument(_))
        ));
        Ok(())
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        assert!(matches!(
            extract_page_texts(Path::new("notes.docx")),
            Err(IngestError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn broken_pdf_reports_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        assert!(matches!(
            extract_page_texts(&path),
            Err(IngestError::PdfParse(_))
        ));
        Ok(())
    }
}
