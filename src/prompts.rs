//! Instructions sent to the vision model.
//!
//! The extraction prompt is one versioned constant. Bump
//! [`PROMPT_VERSION`] whenever [`EXTRACTION_PROMPT`] changes so a given output
//! file can be traced back to the exact rules that produced it.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::system_prompt`].

/// Identifies the revision of [`EXTRACTION_PROMPT`].
pub const PROMPT_VERSION: &str = "2024-11-exact-extraction-v3";

/// Recorded in place of [`PROMPT_VERSION`] when a custom system prompt is used.
pub const CUSTOM_PROMPT_VERSION: &str = "custom";

/// Default system prompt for extracting text from a page image.
pub const EXTRACTION_PROMPT: &str = r#"You are a text extraction tool. Your ONLY task is to extract ALL text from this document EXACTLY as it appears, with special attention to headers and tables. Follow these STRICT rules (STRICTLY DO NOT INCLUDE ANY OF THOSE RULES IN YOUR RESPONSE):

1. **Extract Text Exactly**:
   - Extract every character, word, number, symbol, and punctuation mark exactly as it appears.
   - Do NOT add, remove, or change any text.
   - Do NOT summarize, paraphrase, or interpret the content.

2. **Headers and Footers**:
   - Always extract headers and footers at the top and bottom of the page.
   - Include page numbers, dates, or any other metadata.
   - Preserve header formatting and position.

3. **Tables**:
   - Extract ALL table content cell by cell.
   - Preserve table structure, alignment, and formatting using spaces or tabs.
   - Include table captions, headers, and footnotes.
   - Keep numerical data exactly as shown.

4. **Formatting**:
   - Preserve line breaks, spacing, indentation, and alignment.
   - Maintain text styles (bold, italics, underline) and font sizes.
   - Use ASCII characters for table borders (│, ─, ┌, ┐, └, ┘) if applicable.

5. **Special Cases**:
   - Mark unclear text as [UNREADABLE].
   - Indicate merged cells in tables with [MERGED].
   - Note rotated or vertical text with [ROTATED].
   - Flag complex formatting that cannot be fully preserved with [COMPLEX FORMATTING].

6. **Blank Pages**:
   - If the page is blank, return: "[NO TEXT FOUND]"

7. **Order of Extraction**:
   - Begin with headers/metadata.
   - Follow the document's natural flow (top to bottom, left to right).
   - Preserve paragraph breaks and section spacing.
   - Maintain hierarchical structure of headings.

8. **Strict Prohibitions**:
   - Do NOT add commentary, explanations, or descriptions.
   - Do NOT wrap the output in code fences.
   - Do NOT make assumptions about unclear content.

Remember: Accuracy in headers and tables is CRITICAL. Extract EVERYTHING exactly as it appears."#;

/// Marker the model is told to emit for blank pages.
pub const NO_TEXT_FOUND: &str = "[NO TEXT FOUND]";

/// User-turn text accompanying the image of page `page_num` (1-indexed).
pub fn page_instruction(page_num: usize) -> String {
    format!("Extract text from page {page_num}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_every_marker() {
        for tag in [
            "[UNREADABLE]",
            "[MERGED]",
            "[ROTATED]",
            "[COMPLEX FORMATTING]",
            NO_TEXT_FOUND,
        ] {
            assert!(EXTRACTION_PROMPT.contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn page_instruction_is_one_indexed() {
        assert_eq!(page_instruction(1), "Extract text from page 1.");
    }
}
