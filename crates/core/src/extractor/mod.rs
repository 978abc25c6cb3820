//! Extraction of raw address rows from a result-grid page payload.
//!
//! The registry renders results in a jqGrid table and reports the total
//! match count in a paging-info element (`共 123 條`). Both landmarks are
//! load-bearing: if either disappears the page structure has changed and
//! the whole run must stop rather than silently ingest garbage.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

use crate::record::RawAddressTuple;

/// Per-page accounting reported alongside the extracted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    /// Rows actually present on this page.
    pub rows_on_page: u32,
    /// Total matching rows the source claims across all pages.
    pub total_rows_reported: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// A structural landmark is missing; the page no longer looks like
    /// the grid this extractor was written against. Fatal to the run.
    #[error("page structure changed: {0}")]
    StructureChanged(String),
}

static GRID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<table[^>]*id="jQGrid"[^>]*>(.*?)</table>"#).unwrap()
});
static ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<tr[^>]*>(.*?)</tr>").unwrap());
static CELL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<td[^>]*>(.*?)</td>").unwrap());
static PAGING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)class="ui-paging-info"[^>]*>(.*?)<"#).unwrap()
});
static TOTAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"共\s*(\d+)\s*[條筆]").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Extract the ordered raw tuples and page accounting from one page.
///
/// Rows with fewer than four cells or an empty address cell are skipped;
/// they are grid chrome (headers, spacers), not data.
pub fn extract_page(body: &str) -> Result<(Vec<RawAddressTuple>, PageMeta), ExtractError> {
    let grid = GRID_RE
        .captures(body)
        .ok_or_else(|| ExtractError::StructureChanged("result grid not found".to_string()))?;
    let grid_body = grid.get(1).map(|m| m.as_str()).unwrap_or_default();

    let total_rows_reported = extract_total(body)?;

    let mut tuples = Vec::new();
    for row in ROW_RE.captures_iter(grid_body) {
        let row_body = match row.get(1) {
            Some(m) => m.as_str(),
            None => continue,
        };

        let cells: Vec<String> = CELL_RE
            .captures_iter(row_body)
            .filter_map(|c| c.get(1).map(|m| cell_text(m.as_str())))
            .collect();

        // Expected layout: [row number, full address, register date, kind].
        if cells.len() < 4 {
            continue;
        }
        if cells[1].is_empty() {
            continue;
        }

        tuples.push(RawAddressTuple {
            full_address: cells[1].clone(),
            register_date: cells[2].clone(),
            register_type: cells[3].clone(),
        });
    }

    let meta = PageMeta {
        rows_on_page: tuples.len() as u32,
        total_rows_reported,
    };
    Ok((tuples, meta))
}

fn extract_total(body: &str) -> Result<u32, ExtractError> {
    let paging = PAGING_RE
        .captures(body)
        .ok_or_else(|| ExtractError::StructureChanged("paging info not found".to_string()))?;
    let text = paging.get(1).map(|m| m.as_str()).unwrap_or_default();

    let caps = TOTAL_RE.captures(text).ok_or_else(|| {
        ExtractError::StructureChanged(format!("total count not found in paging info: {text}"))
    })?;

    caps[1].parse().map_err(|_| {
        ExtractError::StructureChanged("total count is not a number".to_string())
    })
}

/// Inner text of a cell: nested tags removed, whitespace trimmed.
fn cell_text(raw: &str) -> String {
    TAG_RE.replace_all(raw, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::grid_page;

    #[test]
    fn test_extracts_rows_in_order() {
        let body = grid_page(
            &[
                ("富台里19鄰信義路四段100巷5弄10號", "114-11-07", "門牌初編"),
                ("中正路22號", "114-11-08", "門牌增編"),
            ],
            2,
        );

        let (tuples, meta) = extract_page(&body).unwrap();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].full_address, "富台里19鄰信義路四段100巷5弄10號");
        assert_eq!(tuples[0].register_date, "114-11-07");
        assert_eq!(tuples[0].register_type, "門牌初編");
        assert_eq!(tuples[1].full_address, "中正路22號");
        assert_eq!(meta.rows_on_page, 2);
        assert_eq!(meta.total_rows_reported, 2);
    }

    #[test]
    fn test_total_can_exceed_page_rows() {
        let body = grid_page(&[("中正路1號", "114-01-01", "門牌初編")], 120);
        let (_, meta) = extract_page(&body).unwrap();
        assert_eq!(meta.rows_on_page, 1);
        assert_eq!(meta.total_rows_reported, 120);
    }

    #[test]
    fn test_empty_grid_is_not_an_error() {
        let body = grid_page(&[], 0);
        let (tuples, meta) = extract_page(&body).unwrap();
        assert!(tuples.is_empty());
        assert_eq!(meta.rows_on_page, 0);
        assert_eq!(meta.total_rows_reported, 0);
    }

    #[test]
    fn test_missing_grid_is_structure_changed() {
        let body = r#"<html><body><div class="ui-paging-info">共 3 條</div></body></html>"#;
        let err = extract_page(body).unwrap_err();
        assert!(matches!(err, ExtractError::StructureChanged(_)));
    }

    #[test]
    fn test_missing_paging_info_is_structure_changed() {
        let body = r#"<table id="jQGrid"><tr><td>1</td><td>路</td><td>114-01-01</td><td>門牌初編</td></tr></table>"#;
        let err = extract_page(body).unwrap_err();
        assert!(matches!(err, ExtractError::StructureChanged(_)));
    }

    #[test]
    fn test_garbled_total_is_structure_changed() {
        let body = r#"<table id="jQGrid"></table><div class="ui-paging-info">沒有資料</div>"#;
        let err = extract_page(body).unwrap_err();
        assert!(matches!(err, ExtractError::StructureChanged(_)));
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let body = r#"
            <table id="jQGrid">
                <tr><th>編號</th></tr>
                <tr><td>1</td><td>中正路5號</td><td>114-02-03</td><td>門牌初編</td></tr>
            </table>
            <div class="ui-paging-info">共 1 條</div>
        "#;
        let (tuples, meta) = extract_page(body).unwrap();
        assert_eq!(tuples.len(), 1);
        assert_eq!(meta.rows_on_page, 1);
    }

    #[test]
    fn test_nested_tags_stripped_from_cells() {
        let body = r#"
            <table id="jQGrid">
                <tr><td>1</td><td><span>中正路</span>5號</td><td> 114-02-03 </td><td><b>門牌初編</b></td></tr>
            </table>
            <div class="ui-paging-info">共 1 條</div>
        "#;
        let (tuples, _) = extract_page(body).unwrap();
        assert_eq!(tuples[0].full_address, "中正路5號");
        assert_eq!(tuples[0].register_type, "門牌初編");
    }
}
