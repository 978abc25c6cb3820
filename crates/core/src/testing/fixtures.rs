//! Canned registry pages for extractor and lifecycle tests.

use std::fmt::Write;

/// Render a result page the way the registry's grid lays it out: one
/// header row, then one row per tuple of (address, date, kind), plus the
/// paging element carrying the claimed total.
pub fn grid_page(rows: &[(&str, &str, &str)], total: u32) -> String {
    let mut body = String::from("<html><body>\n<table id=\"jQGrid\">\n");
    body.push_str("<tr><th>編號</th><th>門牌</th><th>編釘日期</th><th>類別</th></tr>\n");
    for (i, (address, date, kind)) in rows.iter().enumerate() {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{address}</td><td>{date}</td><td>{kind}</td></tr>",
            i + 1
        );
    }
    body.push_str("</table>\n");
    let _ = writeln!(body, "<div class=\"ui-paging-info\">共 {total} 條</div>");
    body.push_str("</body></html>");
    body
}
