use std::path::Path;
use std::sync::{Mutex, PoisonError};

use mupdf::{Document, TextPageFlags};

use pdfindexer_core::{BackendError, DecodeLimits, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// The mupdf dependency (AGPL-3.0) lives only in this crate, so the
/// orchestration core never depends on it transitively.
///
/// Text pages are built without image preservation, so decoded image data
/// is never attached to the extracted text. Pages are assembled in a reusable
/// buffer that grows to the largest page seen; it stays allocated between
/// calls until [`release_retained`](PdfBackend::release_retained) frees it.
///
/// The buffer is checked out for the duration of a call and handed back
/// afterwards, so concurrent calls never wait on each other. A call that
/// finds the buffer checked out starts with a fresh one.
#[derive(Default)]
pub struct MupdfBackend {
    page_buffer: Mutex<String>,
}

impl MupdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently held by the page buffer.
    pub fn retained_bytes(&self) -> usize {
        self.page_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity()
    }

    fn checkout_buffer(&self) -> String {
        std::mem::take(
            &mut *self
                .page_buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Keep whichever buffer is larger.
    fn return_buffer(&self, buffer: String) {
        let mut retained = self
            .page_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if buffer.capacity() > retained.capacity() {
            *retained = buffer;
        }
    }

    /// Render `pages` one at a time and join them with newlines.
    ///
    /// `render_page` writes a page into the cleared buffer; it also gets the
    /// length of the text assembled so far. Cancellation is checked before
    /// each page and the decode ceiling after it.
    fn assemble<I, F>(
        &self,
        pages: I,
        limits: &DecodeLimits,
        render_page: F,
    ) -> Result<String, BackendError>
    where
        I: IntoIterator,
        F: FnMut(I::Item, &mut String, usize) -> Result<(), BackendError>,
    {
        let mut page_text = self.checkout_buffer();
        let result = assemble_into(pages, limits, &mut page_text, render_page);
        self.return_buffer(page_text);
        result
    }
}

fn assemble_into<I, F>(
    pages: I,
    limits: &DecodeLimits,
    page_text: &mut String,
    mut render_page: F,
) -> Result<String, BackendError>
where
    I: IntoIterator,
    F: FnMut(I::Item, &mut String, usize) -> Result<(), BackendError>,
{
    let mut text = String::new();
    for page in pages {
        limits.check_cancelled()?;

        page_text.clear();
        render_page(page, page_text, text.len())?;

        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(page_text);
        limits.check_memory(text.len() as u64)?;
    }
    Ok(text)
}

impl PdfBackend for MupdfBackend {
    fn name(&self) -> &str {
        "MuPDF"
    }

    fn probe(&self) -> bool {
        // Linked in at build time.
        true
    }

    fn extract_text(&self, path: &Path, limits: &DecodeLimits) -> Result<String, BackendError> {
        limits.check_cancelled()?;

        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;

        let document =
            Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;
        let pages = document
            .pages()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

        self.assemble(pages, limits, |page_result, page_text, assembled| {
            let page = page_result.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

            for block in text_page.blocks() {
                for line in block.lines() {
                    page_text.extend(line.chars().map(|c| c.char().unwrap_or('\u{FFFD}')));
                    page_text.push('\n');
                }
                limits.check_memory((assembled + page_text.len()) as u64)?;
            }
            Ok(())
        })
    }

    fn release_retained(&self) {
        let mut buf = self
            .page_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *buf = String::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Single-page PDF with the text "Quarterly results". It has no xref
    /// table; MuPDF rebuilds one on open.
    const MINIMAL_PDF: &str = "%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj
4 0 obj << /Length 48 >> stream
BT /F1 24 Tf 72 700 Td (Quarterly results) Tj ET
endstream endobj
5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj
trailer << /Root 1 0 R >>
%%EOF
";

    fn write_pdf(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("report.pdf");
        std::fs::write(&path, MINIMAL_PDF).unwrap();
        path
    }

    #[test]
    fn extracts_page_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path());
        let backend = MupdfBackend::new();

        let text = backend
            .extract_text(&path, &DecodeLimits::default())
            .unwrap();
        assert!(text.contains("Quarterly results"), "got {text:?}");
    }

    #[test]
    fn decode_limit_aborts_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path());
        let backend = MupdfBackend::new();

        let err = backend
            .extract_text(&path, &DecodeLimits::new(Some(4)))
            .unwrap_err();
        assert!(matches!(err, BackendError::MemoryExceeded { limit: 4 }));
    }

    #[test]
    fn release_frees_page_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path());
        let backend = MupdfBackend::new();

        backend
            .extract_text(&path, &DecodeLimits::default())
            .unwrap();
        assert!(backend.retained_bytes() > 0);

        backend.release_retained();
        assert_eq!(backend.retained_bytes(), 0);
    }

    #[test]
    fn cancelled_before_start_does_nothing() {
        let limits = DecodeLimits::default();
        limits.cancel.cancel();
        let err = MupdfBackend::new()
            .extract_text(Path::new("/nonexistent.pdf"), &limits)
            .unwrap_err();
        assert!(matches!(err, BackendError::Cancelled));
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = MupdfBackend::new()
            .extract_text(Path::new("/nonexistent/report.pdf"), &DecodeLimits::default())
            .unwrap_err();
        assert!(matches!(err, BackendError::OpenError(_)));
    }

    #[test]
    fn garbage_file_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        match MupdfBackend::new().extract_text(&path, &DecodeLimits::default()) {
            Ok(text) => assert!(text.trim().is_empty()),
            Err(e) => assert!(matches!(
                e,
                BackendError::OpenError(_) | BackendError::ExtractionError(_)
            )),
        }
    }

    #[test]
    fn slow_extraction_does_not_hold_up_another() {
        let backend = MupdfBackend::new();
        let limits = DecodeLimits::default();

        std::thread::scope(|scope| {
            let slow = scope.spawn(|| {
                backend.assemble(["slow"], &limits, |page, buf, _| {
                    std::thread::sleep(Duration::from_secs(2));
                    buf.push_str(page);
                    Ok(())
                })
            });
            std::thread::sleep(Duration::from_millis(100));

            let start = Instant::now();
            let fast = backend
                .assemble(["fast text"], &limits, |page, buf, _| {
                    buf.push_str(page);
                    Ok(())
                })
                .unwrap();
            assert_eq!(fast, "fast text");
            assert!(start.elapsed() < Duration::from_millis(500));

            assert_eq!(slow.join().unwrap().unwrap(), "slow");
        });
    }

    #[test]
    fn cancellation_is_checked_between_pages() {
        let backend = MupdfBackend::new();
        let limits = DecodeLimits::default();
        let mut rendered = Vec::new();

        let err = backend
            .assemble(["one", "two", "three"], &limits, |page, buf, _| {
                rendered.push(page);
                buf.push_str(page);
                limits.cancel.cancel();
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, BackendError::Cancelled));
        assert_eq!(rendered, vec!["one"]);
        // The buffer comes back even when a call is abandoned.
        assert!(backend.retained_bytes() > 0);
    }

    #[test]
    fn pages_are_joined_with_newlines() {
        let text = MupdfBackend::new()
            .assemble(["first", "second"], &DecodeLimits::default(), |page, buf, _| {
                buf.push_str(page);
                Ok(())
            })
            .unwrap();
        assert_eq!(text, "first\nsecond");
    }

    #[test]
    fn always_probes_available() {
        assert!(MupdfBackend::new().probe());
    }
}
