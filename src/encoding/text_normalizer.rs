/// Character used to pad short text blocks. Padding is encoded like content.
pub const PAD_CHAR: char = ' ';

/// Truncates `text` to `max_length` characters, right-pads with spaces, and
/// maps each character to its Unicode code point.
pub fn normalize_text(text: &str, max_length: usize) -> Vec<u32> {
    let mut codes: Vec<u32> = text.chars().take(max_length).map(u32::from).collect();
    codes.resize(max_length, u32::from(PAD_CHAR));
    codes
}
