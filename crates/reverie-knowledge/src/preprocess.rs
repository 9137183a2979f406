//! Text normalization applied before hashing, chunking, and embedding.

use regex::Regex;

/// Normalize text for embedding: strip markup and noise, collapse
/// whitespace, lowercase. Ingestion and query paths share this so
/// hashes and embeddings stay comparable.
pub fn preprocess(text: &str) -> String {
    let mut output = text.to_string();
    for (pattern, replacement) in [
        // fenced code blocks, then inline code
        (r"```[\s\S]*?```", " "),
        (r"`[^`]*`", " "),
        // markdown images and links keep their label
        (r"!\[([^\]]*)\]\([^)]*\)", "$1"),
        (r"\[([^\]]*)\]\([^)]*\)", "$1"),
        // html-ish tags and comments
        (r"<!--[\s\S]*?-->", " "),
        (r"<[^>]+>", " "),
        // headers, emphasis, quotes
        (r"(?m)^#{1,6}\s+", ""),
        (r"[*_~]{1,3}", ""),
        (r"(?m)^>\s+", ""),
        // bare urls
        (r"https?://\S+", " "),
        (r"\s+", " "),
    ] {
        let Ok(regex) = Regex::new(pattern) else {
            continue;
        };
        output = regex.replace_all(&output, replacement).to_string();
    }
    output.trim().to_lowercase()
}

/// Split normalized text into overlapping fixed-size token windows.
///
/// Windows advance by `size - overlap` tokens; the tail window may be
/// shorter. Empty input yields no chunks.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let tokens = text.split_whitespace().collect::<Vec<_>>();
    if tokens.is_empty() || size == 0 {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + size).min(tokens.len());
        chunks.push(tokens[start..end].join(" "));
        if end == tokens.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Truncate text to a maximum token count.
pub fn truncate_tokens(text: &str, max_tokens: usize) -> String {
    let tokens = text.split_whitespace().collect::<Vec<_>>();
    if tokens.len() <= max_tokens {
        return text.to_string();
    }
    tokens[..max_tokens].join(" ")
}

/// Count whitespace tokens in text.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::{chunk_text, preprocess, token_count, truncate_tokens};
    use pretty_assertions::assert_eq;

    #[test]
    fn preprocess_strips_markup_and_lowercases() {
        let input = "# Title\n\nSome **bold** text with [a link](https://example.com) \
                     and `inline code`.\n\n```rust\nfn main() {}\n```\n<b>tag</b> \
                     visit https://example.org now";
        let output = preprocess(input);
        assert_eq!(
            output,
            "title some bold text with a link and . tag visit now"
        );
    }

    #[test]
    fn preprocess_is_idempotent_on_plain_text() {
        let plain = "already plain text";
        assert_eq!(preprocess(plain), plain);
        assert_eq!(preprocess(&preprocess(plain)), preprocess(plain));
    }

    #[test]
    fn chunking_produces_sequential_overlapping_windows() {
        let text = (0..10)
            .map(|i| format!("w{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 4, 1);
        assert_eq!(
            chunks,
            vec![
                "w0 w1 w2 w3".to_string(),
                "w3 w4 w5 w6".to_string(),
                "w6 w7 w8 w9".to_string(),
            ]
        );
    }

    #[test]
    fn chunking_handles_short_and_empty_input() {
        assert_eq!(chunk_text("one two", 10, 2), vec!["one two".to_string()]);
        assert_eq!(chunk_text("", 10, 2), Vec::<String>::new());
    }

    #[test]
    fn truncation_bounds_token_count() {
        let text = "a b c d e";
        assert_eq!(truncate_tokens(text, 3), "a b c");
        assert_eq!(truncate_tokens(text, 10), text);
        assert_eq!(token_count(text), 5);
    }
}
