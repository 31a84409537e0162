//! Upload normalization
//!
//! Uploaded SRS files are flattened to plain text before being stored as SRS
//! content. Tabular formats become pipe-separated tables.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Extensions accepted by the upload endpoint
pub const ALLOWED_EXTENSIONS: &[&str] = &[".txt", ".md", ".json", ".csv", ".xlsx", ".xls"];

pub const XLS_NOT_SUPPORTED: &str =
    "Excel file uploaded. Legacy .xls workbooks are not parsed; re-save as .xlsx for full parsing.";

/// Reduce a client-supplied filename to a safe basename.
///
/// Compatibility-decomposed (NFKD) so accented letters fold to ASCII, then
/// remaining non-ASCII characters are dropped, path separators become spaces,
/// whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]` is removed
/// and leading/trailing `.`/`_` are stripped.
pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name
        .nfkd()
        .filter(|c| c.is_ascii())
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Lowercased extension including the dot, or `""`
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn is_allowed(ext: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&ext)
}

/// Convert uploaded bytes to SRS text according to their extension
pub fn normalize(ext: &str, data: &[u8]) -> String {
    match ext {
        ".csv" => csv_to_text(&String::from_utf8_lossy(data)),
        ".xlsx" => match xlsx_to_text(data) {
            Ok(text) => text,
            Err(e) => format!("Excel file uploaded. Failed to parse: {}", e),
        },
        ".xls" => XLS_NOT_SUPPORTED.to_string(),
        _ => String::from_utf8_lossy(data).into_owned(),
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Header, `---` separator, then rows padded or truncated to header width
fn render_table(rows: &[Vec<String>], out: &mut Vec<String>) {
    let Some((header, body)) = rows.split_first() else {
        return;
    };
    out.push(header.join(" | "));
    out.push(vec!["---"; header.len()].join(" | "));
    for row in body {
        let cells: Vec<&str> = (0..header.len())
            .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        out.push(cells.join(" | "));
    }
}

pub fn csv_to_text(input: &str) -> String {
    let rows = parse_csv(input);
    let mut out = Vec::new();
    render_table(&rows, &mut out);
    out.join("\n")
}

/// Minimal RFC 4180 reader: quoted fields, doubled quotes, CRLF. Blank
/// records are skipped; cells are trimmed.
pub fn parse_csv(input: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    let mut end_record = |row: &mut Vec<String>, field: &mut String| {
        row.push(std::mem::take(field).trim().to_string());
        let record = std::mem::take(row);
        if !(record.len() == 1 && record[0].is_empty()) {
            rows.push(record);
        }
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field).trim().to_string()),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                end_record(&mut row, &mut field);
            }
            '\n' => end_record(&mut row, &mut field),
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        end_record(&mut row, &mut field);
    }
    rows
}

// ============================================================================
// XLSX
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum XlsxError {
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Malformed(String),
}

/// Last column Excel allows (`XFD`)
const MAX_COLUMN: usize = 16_383;

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex")
}

static SHEET_RE: Lazy<Regex> = Lazy::new(|| regex(r"<sheet\b([^>]*?)/?>"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| regex(r#"([A-Za-z_][\w:.-]*)\s*=\s*"([^"]*)""#));
static TEXT_RUN_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>"));
static SHARED_STRING_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?s)<si>(.*?)</si>|<si/>"));
static RELATIONSHIP_RE: Lazy<Regex> = Lazy::new(|| regex(r"<Relationship\b([^>]*?)/?>"));
static ROW_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?s)<row\b[^>]*?(?:/>|>(.*?)</row>)"));
static CELL_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)"));
static VALUE_RE: Lazy<Regex> = Lazy::new(|| regex(r"(?s)<v>(.*?)</v>"));

/// Render every worksheet as `# Sheet: <name>` followed by its table
pub fn xlsx_to_text(data: &[u8]) -> Result<String, XlsxError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;

    let mut read_entry = |name: &str| -> Result<Option<String>, XlsxError> {
        match archive.by_name(name) {
            Ok(mut entry) => {
                let mut buf = String::new();
                entry.read_to_string(&mut buf)?;
                Ok(Some(buf))
            }
            Err(zip::result::ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    };

    let workbook = read_entry("xl/workbook.xml")?
        .ok_or_else(|| XlsxError::Malformed("missing xl/workbook.xml".to_string()))?;
    let shared = read_entry("xl/sharedStrings.xml")?
        .map(|xml| parse_shared_strings(&xml))
        .unwrap_or_default();
    let targets = read_entry("xl/_rels/workbook.xml.rels")?
        .map(|xml| parse_relationships(&xml))
        .unwrap_or_default();

    let mut parts = Vec::new();
    for (index, cap) in SHEET_RE.captures_iter(&workbook).enumerate() {
        let attrs = attributes(&cap[1]);
        let name = attrs.get("name").cloned().unwrap_or_else(|| format!("Sheet{}", index + 1));
        let path = attrs
            .get("r:id")
            .and_then(|id| targets.get(id))
            .map(|target| resolve_target(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));

        let xml = read_entry(&path)?
            .ok_or_else(|| XlsxError::Malformed(format!("missing worksheet {}", path)))?;
        let rows = parse_sheet_rows(&xml, &shared)?;

        parts.push(format!("# Sheet: {}", name));
        render_table(&rows, &mut parts);
        parts.push(String::new());
    }

    Ok(parts.join("\n").trim().to_string())
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn attributes(raw: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(raw)
        .map(|c| (c[1].to_string(), unescape(&c[2])))
        .collect()
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Concatenated text runs of a `<si>`/`<is>` element
fn text_runs(xml: &str) -> String {
    TEXT_RUN_RE
        .captures_iter(xml)
        .map(|c| unescape(&c[1]))
        .collect()
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    SHARED_STRING_RE
        .captures_iter(xml)
        .map(|c| c.get(1).map(|m| text_runs(m.as_str())).unwrap_or_default())
        .collect()
}

fn parse_relationships(xml: &str) -> HashMap<String, String> {
    RELATIONSHIP_RE
        .captures_iter(xml)
        .filter_map(|c| {
            let attrs = attributes(&c[1]);
            Some((attrs.get("Id")?.clone(), attrs.get("Target")?.clone()))
        })
        .collect()
}

/// Zero-based column from a cell reference such as `AB12`; `None` when the
/// reference has no column letters.
fn column_index(reference: &str) -> Result<Option<usize>, XlsxError> {
    let letters = reference.bytes().take_while(|b| b.is_ascii_alphabetic());
    let mut n: usize = 0;
    for b in letters {
        let digit = (b.to_ascii_uppercase() - b'A' + 1) as usize;
        n = n
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .filter(|n| *n <= MAX_COLUMN + 1)
            .ok_or_else(|| XlsxError::Malformed(format!("cell reference out of range: {}", reference)))?;
    }
    Ok(n.checked_sub(1))
}

fn parse_sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, XlsxError> {
    let mut rows = Vec::new();
    for row_cap in ROW_RE.captures_iter(xml) {
        let Some(body) = row_cap.get(1) else {
            continue;
        };
        let mut row: Vec<String> = Vec::new();
        for cell in CELL_RE.captures_iter(body.as_str()) {
            let attrs = attributes(&cell[1]);
            let inner = cell.get(2).map_or("", |m| m.as_str());
            let raw = VALUE_RE.captures(inner).map(|v| unescape(&v[1]));

            let value = match attrs.get("t").map(String::as_str) {
                Some("s") => raw
                    .and_then(|i| i.trim().parse::<usize>().ok())
                    .and_then(|i| shared.get(i).cloned())
                    .unwrap_or_default(),
                Some("inlineStr") => text_runs(inner),
                Some("b") => match raw.as_deref() {
                    Some("1") => "True".to_string(),
                    Some(_) => "False".to_string(),
                    None => String::new(),
                },
                _ => raw.unwrap_or_default(),
            };

            let col = match attrs.get("r") {
                Some(r) => column_index(r)?,
                None => None,
            }
            .unwrap_or(row.len());
            if col > MAX_COLUMN {
                return Err(XlsxError::Malformed("too many cells in row".to_string()));
            }
            if row.len() <= col {
                row.resize(col + 1, String::new());
            }
            row[col] = value.trim().to_string();
        }
        if row.iter().any(|c| !c.is_empty()) {
            rows.push(row);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My SRS v1.txt"), "My_SRS_v1.txt");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("résumé.md"), "resume.md");
        assert_eq!(sanitize_filename("Ｆｕｌｌｗｉｄｔｈ ﬁle.txt"), "Fullwidth_file.txt");
        assert_eq!(sanitize_filename("日本語.txt"), "txt");
        assert_eq!(sanitize_filename("__.hidden.csv"), "hidden.csv");
        assert_eq!(sanitize_filename("a<b>c?.json"), "abc.json");
        assert_eq!(sanitize_filename("..."), "");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("spec.TXT"), ".txt");
        assert_eq!(extension_of("book.xlsx"), ".xlsx");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert!(is_allowed(".md"));
        assert!(!is_allowed(".pdf"));
        assert!(!is_allowed(""));
    }

    #[test]
    fn test_plain_text_is_lossy_utf8() {
        assert_eq!(normalize(".md", b"# Title\nbody"), "# Title\nbody");
        assert_eq!(normalize(".txt", &[b'o', b'k', 0xff]), "ok\u{fffd}");
    }

    #[test]
    fn test_csv_table() {
        let input = "id, name ,notes\r\n1,Login,\"says \"\"hi\"\", then leaves\"\n\n2,Logout\n3,a,b,extra\n";
        assert_eq!(
            csv_to_text(input),
            "id | name | notes\n--- | --- | ---\n1 | Login | says \"hi\", then leaves\n2 | Logout | \n3 | a | b"
        );
    }

    #[test]
    fn test_csv_multiline_quoted_field() {
        let rows = parse_csv("a,b\n\"line1\nline2\",x");
        assert_eq!(rows[1], vec!["line1\nline2".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_empty_csv() {
        assert_eq!(csv_to_text(""), "");
        assert_eq!(normalize(".csv", b"\n\n"), "");
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("C7").unwrap(), Some(2));
        assert_eq!(column_index("AA3").unwrap(), Some(26));
        assert_eq!(column_index("XFD1").unwrap(), Some(MAX_COLUMN));
        assert_eq!(column_index("12").unwrap(), None);
        assert!(column_index("XFE1").is_err());
        assert!(column_index("ZZZZZZZZZ1").is_err());
        assert!(column_index("AAAAAAAAAAAAAAAA1").is_err());
    }

    fn build_xlsx(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in files {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_xlsx_sheets() {
        let data = build_xlsx(&[
            (
                "xl/workbook.xml",
                r#"<workbook><sheets><sheet name="Requirements" sheetId="1" r:id="rId1"/><sheet name="Notes &amp; Misc" sheetId="2" r:id="rId2"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Target="/xl/worksheets/sheet2.xml"/></Relationships>"#,
            ),
            (
                "xl/sharedStrings.xml",
                r#"<sst><si><t>ID</t></si><si><t>Requirement</t></si><si><r><t>Login </t></r><r><t>works</t></r></si></sst>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2"><c r="A2"><v>1</v></c><c r="B2" t="s"><v>2</v></c></row><row r="3"><c r="B3" t="inlineStr"><is><t>orphan</t></is></c></row></sheetData></worksheet>"#,
            ),
            (
                "xl/worksheets/sheet2.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Note</t></is></c></row><row r="2"><c r="A2" t="b"><v>1</v></c></row></sheetData></worksheet>"#,
            ),
        ]);

        assert_eq!(
            normalize(".xlsx", &data),
            "# Sheet: Requirements\nID | Requirement\n--- | ---\n1 | Login works\n | orphan\n\n# Sheet: Notes & Misc\nNote\n---\nTrue"
        );
    }

    #[test]
    fn test_xlsx_parse_failure() {
        let text = normalize(".xlsx", b"definitely not a zip");
        assert!(text.starts_with("Excel file uploaded. Failed to parse: "));
    }

    fn single_cell_book(reference: &str) -> Vec<u8> {
        let sheet = format!(
            r#"<worksheet><sheetData><row r="1"><c r="{}" t="inlineStr"><is><t>x</t></is></c></row></sheetData></worksheet>"#,
            reference
        );
        build_xlsx(&[
            ("xl/workbook.xml", r#"<workbook><sheets><sheet name="S" sheetId="1"/></sheets></workbook>"#),
            ("xl/worksheets/sheet1.xml", sheet.as_str()),
        ])
    }

    #[test]
    fn test_xlsx_oversized_cell_reference() {
        for reference in ["AAAAAAAAAAAAAAAA1", "ZZZZZZZZZ1", "XFE1"] {
            let text = normalize(".xlsx", &single_cell_book(reference));
            assert!(
                text.starts_with("Excel file uploaded. Failed to parse: cell reference out of range"),
                "{}: {}",
                reference,
                text
            );
        }
        assert_eq!(normalize(".xlsx", &single_cell_book("B1")), "# Sheet: S\n | x\n--- | ---");
    }

    #[test]
    fn test_xls_is_not_parsed() {
        assert_eq!(normalize(".xls", b"\xd0\xcf\x11\xe0"), XLS_NOT_SUPPORTED);
    }
}
