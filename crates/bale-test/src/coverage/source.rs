//! Line lookups for source text.
//!
//! V8 reports offsets in UTF-16 code units while oxc spans are UTF-8 bytes,
//! so both are indexed.

#[derive(Debug, Clone)]
pub struct SourceText {
    text: String,
    /// (byte offset, UTF-16 offset) of each line start.
    line_starts: Vec<(u32, u32)>,
    utf16_len: u32,
}

/// A line that can execute, with the offsets of its first code character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutableLine {
    /// 1-based.
    pub line: u32,
    pub byte_offset: u32,
    pub utf16_offset: u32,
}

impl SourceText {
    pub fn new(text: String) -> Self {
        let mut line_starts = vec![(0, 0)];
        let mut utf16 = 0u32;
        for (byte, ch) in text.char_indices() {
            utf16 += ch.len_utf16() as u32;
            if ch == '\n' {
                line_starts.push((byte as u32 + 1, utf16));
            }
        }
        Self {
            text,
            line_starts,
            utf16_len: utf16,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn utf16_len(&self) -> u32 {
        self.utf16_len
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// 1-based line holding a UTF-16 offset.
    pub fn line_of_utf16(&self, offset: u32) -> u32 {
        self.line_starts.partition_point(|&(_, start)| start <= offset) as u32
    }

    /// 1-based line holding a byte offset.
    pub fn line_of_byte(&self, offset: u32) -> u32 {
        self.line_starts.partition_point(|&(start, _)| start <= offset) as u32
    }

    /// Lines with code on them. Blank lines and comment-only lines are left out.
    pub fn executable_lines(&self) -> Vec<ExecutableLine> {
        let mut lines = Vec::new();
        let mut in_block_comment = false;

        for (index, line) in self.text.split('\n').enumerate() {
            let Some(&(byte_start, utf16_start)) = self.line_starts.get(index) else {
                break;
            };
            let trimmed = line.trim();
            if in_block_comment {
                if let Some(end) = trimmed.find("*/") {
                    in_block_comment = false;
                    if trimmed[end + 2..].trim().is_empty() {
                        continue;
                    }
                } else {
                    continue;
                }
            }
            if trimmed.is_empty() || trimmed.starts_with("//") {
                continue;
            }
            if trimmed.starts_with("/*") {
                match trimmed.find("*/") {
                    Some(end) if !trimmed[end + 2..].trim().is_empty() => {}
                    Some(_) => continue,
                    None => {
                        in_block_comment = true;
                        continue;
                    }
                }
            }

            let indent = line.len() - line.trim_start().len();
            let indent_utf16: u32 = line[..indent].chars().map(|c| c.len_utf16() as u32).sum();
            lines.push(ExecutableLine {
                line: index as u32 + 1,
                byte_offset: byte_start + indent as u32,
                utf16_offset: utf16_start + indent_utf16,
            });
        }
        lines
    }
}
