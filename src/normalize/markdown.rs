use super::Extractor;
use crate::error::Result;
use pulldown_cmark::{Event, Parser as CmarkParser, TagEnd};

/// Markdown text extraction; rendering syntax is dropped, prose is kept
pub struct MarkdownExtractor;

impl Extractor for MarkdownExtractor {
    fn can_extract(&self, extension: &str) -> bool {
        matches!(extension, "md" | "markdown")
    }

    fn extract(&self, payload: &[u8], _extension: &str) -> Result<String> {
        let source = String::from_utf8_lossy(payload);
        let parser = CmarkParser::new(&source);
        let mut text = String::new();

        for event in parser {
            match event {
                Event::Text(chunk) => text.push_str(&chunk),
                Event::Code(code) => {
                    text.push_str(&code);
                    text.push(' ');
                }
                Event::SoftBreak | Event::HardBreak => text.push('\n'),
                Event::End(TagEnd::Heading(_))
                | Event::End(TagEnd::Paragraph)
                | Event::End(TagEnd::Item)
                | Event::End(TagEnd::CodeBlock) => text.push('\n'),
                _ => {}
            }
        }

        Ok(text)
    }
}
