use super::Extractor;
use crate::error::Result;

/// Delimited-tabular conversion: every row becomes one tab-joined line,
/// header row first. Quoted-field handling is minimal: double quotes may
/// wrap a field containing the delimiter, "" escapes a quote, and quoted
/// line breaks are not supported.
pub struct TabularExtractor;

impl Extractor for TabularExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(extension, "csv" | "tsv")
    }

    fn extract(&self, payload: &[u8], extension: &str) -> Result<String> {
        let delimiter = if extension == "tsv" { '\t' } else { ',' };
        let source = String::from_utf8_lossy(payload);
        let mut lines = Vec::new();

        for line in source.lines() {
            if line.trim().is_empty() {
                continue;
            }
            lines.push(split_fields(line, delimiter).join("\t"));
        }

        Ok(lines.join("\n"))
    }
}

fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                // "" inside a quoted field is an escaped quote
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' && current.is_empty() {
            in_quotes = true;
        } else if ch == delimiter {
            fields.push(std::mem::take(&mut current).trim().to_string());
        } else {
            current.push(ch);
        }
    }

    fields.push(current.trim().to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tabular_can_extract() {
        let extractor = TabularExtractor;
        assert!(extractor.can_extract("csv"));
        assert!(extractor.can_extract("tsv"));
        assert!(!extractor.can_extract("xlsx"));
    }

    #[test]
    fn test_csv_rows_become_tab_joined_lines() {
        let extractor = TabularExtractor;
        let text = extractor
            .extract(b"item,qty,cost\nrebar,40,1200\nconcrete,12,3400\n", "csv")
            .unwrap();
        assert_eq!(text, "item\tqty\tcost\nrebar\t40\t1200\nconcrete\t12\t3400");
    }

    #[test]
    fn test_csv_quoted_field_keeps_delimiter() {
        let extractor = TabularExtractor;
        let text = extractor
            .extract(b"task,note\npour,\"slab, east wing\"\n", "csv")
            .unwrap();
        assert_eq!(text, "task\tnote\npour\tslab, east wing");
    }

    #[test]
    fn test_csv_escaped_quote() {
        let extractor = TabularExtractor;
        let text = extractor.extract(b"a,b\n\"say \"\"go\"\"\",2\n", "csv").unwrap();
        assert_eq!(text, "a\tb\nsay \"go\"\t2");
    }

    #[test]
    fn test_tsv_delimiter() {
        let extractor = TabularExtractor;
        let text = extractor.extract(b"crew\tsize\nframing\t6\n", "tsv").unwrap();
        assert_eq!(text, "crew\tsize\nframing\t6");
    }

    #[test]
    fn test_blank_rows_skipped() {
        let extractor = TabularExtractor;
        let text = extractor.extract(b"a,b\n\n\nc,d\n", "csv").unwrap();
        assert_eq!(text, "a\tb\nc\td");
    }
}
