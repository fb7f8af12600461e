//! Scan a saved copy of the Drive folder page ("Save page as... HTML").
//!
//! A saved page is a single rendered window, so scrolling never moves and the
//! scan always runs in snapshot mode.

use scraper::{ElementRef, Html, Selector};
use std::path::Path;

use crate::config::DomConfig;
use crate::scanner::{DomReader, RawRow, ScanError, ScrollOffsets};

pub struct HtmlSnapshotReader {
    rows: Vec<RawRow>,
    has_container: bool,
}

fn selector(css: &str) -> Result<Selector, ScanError> {
    Selector::parse(css).map_err(|e| ScanError::Snapshot(format!("invalid selector '{}': {:?}", css, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl HtmlSnapshotReader {
    pub fn from_html(html: &str, dom: &DomConfig) -> Result<Self, ScanError> {
        let document = Html::parse_document(html);
        let row_sel = selector(&dom.row_selector)?;
        let name_sel = selector(&dom.name_selector)?;
        let date_sel = selector(&dom.date_selector)?;

        let rows = document
            .select(&row_sel)
            .map(|row| RawRow {
                name: row.select(&name_sel).next().map(element_text),
                date: row.select(&date_sel).next().map(element_text),
            })
            .collect();

        let mut has_container = false;
        for css in &dom.scroll_container_selectors {
            if document.select(&selector(css)?).next().is_some() {
                has_container = true;
                break;
            }
        }

        Ok(Self { rows, has_container })
    }

    pub fn from_file(path: &Path, dom: &DomConfig) -> Result<Self, ScanError> {
        let html = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Snapshot(format!("{}: {}", path.display(), e)))?;
        Self::from_html(&html, dom)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl DomReader for HtmlSnapshotReader {
    fn has_scroll_container(&self) -> Result<bool, ScanError> {
        Ok(self.has_container)
    }

    fn visible_rows(&self) -> Result<Vec<RawRow>, ScanError> {
        Ok(self.rows.clone())
    }

    fn scroll_by(&mut self, _px: u32) -> Result<ScrollOffsets, ScanError> {
        Ok(ScrollOffsets { before: 0, after: 0 })
    }
}
