//! Prompts for chat-model translation.
//!
//! Centralising the instruction here keeps the orchestrator free of prompt
//! text and lets unit tests inspect the exact wording without a model.

/// Prefix of every inline placeholder substituted for a failed translation.
///
/// Kept stable so the output of a failed item is distinguishable from a
/// real translation.
pub const TRANSLATION_ERROR_PREFIX: &str = "Translation error: ";

/// Build the single user instruction sent for one source text.
///
/// The instruction embeds the text between single quotes together with the
/// language names and lists what must survive translation untouched.
pub fn translation_instruction(text: &str, source_lang: &str, target_lang: &str) -> String {
    format!(
        "Translate the following {source_lang} text '{text}' into {target_lang} directly, \
without altering the original meaning. Keep all numbers, math equations, symbols, unicode, \
and formatting (e.g., blank lines, dashes) intact. Do not add interpretations, summaries, \
or personal perspectives. The translation should be natural, accurate, clean, and faithful \
to the original text."
    )
}

/// Placeholder shown in the document in place of a failed translation.
pub fn translation_error(detail: impl std::fmt::Display) -> String {
    format!("{TRANSLATION_ERROR_PREFIX}{detail}")
}

/// Whether a translated value is an error placeholder.
pub fn is_translation_error(value: &str) -> bool {
    value.starts_with(TRANSLATION_ERROR_PREFIX)
}
