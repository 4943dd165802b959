use regex::Regex;

use fencecast_types::artifact::CodeBlockMatch;

/// Finds closed fenced code blocks tagged with one language.
///
/// Extraction is a pure function of the whole buffer: every call rescans
/// from the start and keeps the last block whose closing fence has been
/// seen. An unterminated trailing block never matches, so a truncated body
/// can never be returned.
#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    language: String,
    pattern: Regex,
}

impl ArtifactExtractor {
    pub fn new(language: &str) -> Result<Self, regex::Error> {
        let tag = regex::escape(language);
        // Stop "html" from also claiming "htmlbars" fences.
        let boundary = if language.chars().last().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            r"\b"
        } else {
            ""
        };
        let pattern = Regex::new(&format!(r"(?s)```{tag}{boundary}\s*(.*?)\s*```"))?;
        Ok(Self { language: language.to_string(), pattern })
    }

    /// All closed blocks, in document order, non-overlapping.
    pub fn extract_all(&self, text: &str) -> Vec<CodeBlockMatch> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let body = caps.get(1)?;
                Some(CodeBlockMatch {
                    language: self.language.clone(),
                    body: body.as_str().to_string(),
                    span_end: whole.end(),
                })
            })
            .collect()
    }

    /// The closed block with the greatest `span_end`, if any.
    pub fn extract(&self, text: &str) -> Option<CodeBlockMatch> {
        self.extract_all(text).pop()
    }
}
