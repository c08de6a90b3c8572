//! Shell quoting for command lines that cross a shell boundary
//! (ssh remote command strings, `bash -c` wrappers).

fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '=' | ':' | '%' | '@' | ',' | '+')
}

/// Shell-quote one word.
///
/// Words made only of plain characters pass through untouched; anything else
/// is wrapped in single quotes, with inner single quotes escaped as `'\''`.
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_plain) {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// Quote and join words into one shell command line.
pub fn join_quoted<'a>(words: impl IntoIterator<Item = &'a str>) -> String {
    words
        .into_iter()
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}
