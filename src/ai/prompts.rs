/// Vision request: pull the facts a filename is built from out of the page image
pub const VISION_PROMPT: &str = r#"Extract the text from this document image and analyze its content.
The goal is to identify the information needed to build a filename.
Reference numbers, subject, sender, recipient and dates are especially important.

Target format: YYYY-MM-DD_COMPANY_DOCTYPE_SUBJECT_ID
Example: 2024-11-23_AOK_Rückzahlung_Kndnr1234"#;

/// Maximum characters of page text attached to the vision request
const MAX_CONTEXT_CHARS: usize = 2_000;

/// Build the vision prompt, attaching page text when there is any
pub fn build_vision_prompt(page_text: &str) -> String {
    let page_text = page_text.trim();
    if page_text.is_empty() {
        return VISION_PROMPT.to_string();
    }

    let excerpt: String = page_text.chars().take(MAX_CONTEXT_CHARS).collect();
    format!(
        r#"{}

EXTRACTED PAGE TEXT (may be incomplete):
---
{}
---"#,
        VISION_PROMPT, excerpt
    )
}

/// Build the filename request for a description or page text
pub fn build_filename_prompt(content: &str) -> String {
    format!(
        r#"Analyze the following content:
{}

Produce a concise, meaningful filename in the format: YYYY-MM-DD_COMPANY_DOCTYPE_ID
Example: 2024-11-23_AOK_Rückzahlung_Kndnr1234
Use only alphanumeric characters and underscores, in the language of the document.
Respond with ONLY the filename, without extension. No explanation."#,
        content
    )
}
