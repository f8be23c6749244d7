//! Quoted, delimited record format used by the batch geocoder.
//!
//! Encoding always quotes every field. Decoding is a small hand-rolled
//! scanner rather than a general CSV reader: it mirrors exactly what the
//! service produces and makes no attempt to validate anything else.
//!
//! ```text
//! "1","4600 Silver Hill Rd","Washington","DC","20233"
//! ```

const QUOTE: u8 = b'"';

/// Default field delimiter.
pub const COMMA: u8 = b',';

/// Trim surrounding whitespace and double embedded quotes.
pub fn escape(field: &str) -> String {
    field.trim().replace('"', "\"\"")
}

/// Collapse doubled quotes left in a decoded field.
///
/// [`decode`] keeps fields in their escaped form; call this before handing a
/// decoded field back to [`encode`], which would otherwise double them again.
pub fn unescape(field: &str) -> String {
    field.replace("\"\"", "\"")
}

/// Encode one record as a line of quoted fields.
pub fn encode_record<S: AsRef<str>>(fields: &[S]) -> String {
    let escaped: Vec<String> = fields.iter().map(|f| escape(f.as_ref())).collect();
    format!("\"{}\"", escaped.join("\",\""))
}

/// Encode records as newline-separated lines.
pub fn encode<R, S>(rows: &[R]) -> String
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    rows.iter()
        .map(|row| encode_record(row.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode newline-separated records. Empty lines become empty rows.
pub fn decode(text: &str, delimiter: u8) -> Vec<Vec<String>> {
    text.split('\n')
        .map(|line| split_record(line, delimiter))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    FieldStart,
    InField,
    InQuotedField,
}

/// Split a single line into fields.
///
/// A field that starts with `"` runs until the first quote not followed by
/// another quote; doubled quotes are kept as-is. The two characters after a
/// quoted span (closing quote and delimiter) are skipped without being
/// checked; the skip counts characters, not bytes. A trailing delimiter
/// yields one extra empty field.
pub fn split_record(line: &str, delimiter: u8) -> Vec<String> {
    let bytes = line.as_bytes();
    let mut fields = Vec::new();
    let mut start = 0usize;
    let mut pos = 0usize;
    let mut state = Scan::FieldStart;

    while pos < bytes.len() {
        match state {
            Scan::FieldStart if bytes[pos] == QUOTE => {
                start = pos + 1;
                pos = start;
                state = Scan::InQuotedField;
            }
            Scan::FieldStart | Scan::InField => {
                if bytes[pos] == delimiter {
                    fields.push(field(bytes, start, pos));
                    start = pos + 1;
                    pos = start;
                    state = Scan::FieldStart;
                } else {
                    pos += 1;
                    state = Scan::InField;
                }
            }
            Scan::InQuotedField => {
                if bytes[pos] != QUOTE {
                    pos += 1;
                } else if bytes.get(pos + 1) == Some(&QUOTE) {
                    pos += 2;
                } else {
                    fields.push(field(bytes, start, pos));
                    // closing quote, then one whole character
                    let next = line[pos + 1..].chars().next().map_or(0, char::len_utf8);
                    start = pos + 1 + next;
                    pos = start;
                    state = Scan::FieldStart;
                }
            }
        }
    }

    match state {
        Scan::InField => fields.push(field(bytes, start, bytes.len())),
        // unterminated quote: keep the rest of the line
        Scan::InQuotedField => fields.push(field(bytes, start, bytes.len())),
        Scan::FieldStart => {}
    }
    if bytes.last() == Some(&delimiter) {
        fields.push(String::new());
    }
    fields
}

fn field(bytes: &[u8], start: usize, end: usize) -> String {
    let end = end.min(bytes.len());
    let start = start.min(end);
    String::from_utf8_lossy(&bytes[start..end]).into_owned()
}
