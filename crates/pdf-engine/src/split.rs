//! Splits one document into several by inclusive page ranges.

use log::info;

use crate::document::{LoadOptions, PdfDocument};
use crate::PdfEngineError;

/// A 1-based, inclusive page range and the file name its output is saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRange {
    pub start: usize,
    pub end: usize,
    pub filename: String,
}

impl SplitRange {
    pub fn new(start: usize, end: usize, filename: impl Into<String>) -> Self {
        Self { start, end, filename: filename.into() }
    }

    pub fn page_count(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    fn validate(&self, page_count: usize) -> Result<(), SplitError> {
        if self.filename.trim().is_empty() {
            return Err(SplitError::EmptyFilename { start: self.start, end: self.end });
        }
        if self.start < 1 || self.start > self.end || self.end > page_count {
            return Err(SplitError::InvalidRange {
                name: self.filename.clone(),
                start: self.start,
                end: self.end,
                page_count,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutput {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("no page ranges given")]
    NoRanges,
    #[error("failed to load the source document: {0}")]
    Source(#[from] PdfEngineError),
    #[error("range {start}-{end} for {name:?} is outside pages 1-{page_count}")]
    InvalidRange { name: String, start: usize, end: usize, page_count: usize },
    #[error("range {start}-{end} has no file name")]
    EmptyFilename { start: usize, end: usize },
    #[error("failed to split pages {start}-{end}: {reason}")]
    Failed { start: usize, end: usize, reason: String },
}

/// Produces one document per range, in the order given. Every range is
/// checked before any output is built.
pub fn split_document(bytes: &[u8], ranges: &[SplitRange]) -> Result<Vec<SplitOutput>, SplitError> {
    if ranges.is_empty() {
        return Err(SplitError::NoRanges);
    }

    let source = PdfDocument::load(bytes, LoadOptions::default())?;
    for range in ranges {
        range.validate(source.page_count())?;
    }

    let mut outputs = Vec::with_capacity(ranges.len());
    for range in ranges {
        let failed = |err: PdfEngineError| SplitError::Failed {
            start: range.start,
            end: range.end,
            reason: err.to_string(),
        };
        let pages: Vec<usize> = (range.start - 1..range.end).collect();
        let mut part = PdfDocument::create();
        part.copy_pages_from(&source, &pages).map_err(failed)?;
        let bytes = part.save().map_err(failed)?;
        outputs.push(SplitOutput { filename: range.filename.clone(), bytes });
    }

    info!("split {} pages into {} documents", source.page_count(), outputs.len());
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_blank_pdf, describe, PageSize};
    use pretty_assertions::assert_eq;

    fn five_pages() -> Vec<u8> {
        let sizes: Vec<PageSize> =
            (1..=5).map(|n| PageSize::new(100.0 * n as f32, 100.0)).collect();
        build_blank_pdf(&sizes).expect("build should succeed")
    }

    fn widths(bytes: &[u8]) -> Vec<f32> {
        describe(bytes)
            .expect("describe should succeed")
            .into_iter()
            .map(|page| page.size.width_pt)
            .collect()
    }

    #[test]
    fn each_range_becomes_one_document() {
        let outputs = split_document(
            &five_pages(),
            &[SplitRange::new(1, 2, "a.pdf"), SplitRange::new(3, 5, "b.pdf")],
        )
        .expect("split should succeed");

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].filename, "a.pdf");
        assert_eq!(widths(&outputs[0].bytes), vec![100.0, 200.0]);
        assert_eq!(outputs[1].filename, "b.pdf");
        assert_eq!(widths(&outputs[1].bytes), vec![300.0, 400.0, 500.0]);
    }

    #[test]
    fn overlapping_and_single_page_ranges_are_allowed() {
        let outputs = split_document(
            &five_pages(),
            &[SplitRange::new(2, 4, "mid.pdf"), SplitRange::new(4, 4, "four.pdf")],
        )
        .expect("split should succeed");
        assert_eq!(widths(&outputs[1].bytes), vec![400.0]);
    }

    #[test]
    fn invalid_range_fails_before_any_output() {
        let err = split_document(
            &five_pages(),
            &[SplitRange::new(1, 2, "ok.pdf"), SplitRange::new(4, 6, "bad.pdf")],
        )
        .expect_err("page 6 does not exist");

        match err {
            SplitError::InvalidRange { name, start, end, page_count } => {
                assert_eq!((name.as_str(), start, end, page_count), ("bad.pdf", 4, 6, 5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reversed_and_zero_ranges_are_rejected() {
        for range in [SplitRange::new(3, 2, "r.pdf"), SplitRange::new(0, 1, "z.pdf")] {
            let err = split_document(&five_pages(), &[range]).expect_err("range is invalid");
            assert!(matches!(err, SplitError::InvalidRange { .. }));
        }
    }

    #[test]
    fn blank_filename_is_rejected() {
        let err = split_document(&five_pages(), &[SplitRange::new(1, 1, "  ")])
            .expect_err("blank name");
        assert!(matches!(err, SplitError::EmptyFilename { start: 1, end: 1 }));
    }
}
