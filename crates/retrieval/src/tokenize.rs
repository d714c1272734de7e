use once_cell::sync::Lazy;
use regex::Regex;

static CLEANER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{Latin}\p{Nd}\s]+").expect("valid tokenizer regex"));

/// Lowercased Latin-script tokens, Vietnamese diacritics preserved.
pub fn tokenize(input: &str) -> Vec<String> {
    let normalized = CLEANER.replace_all(input, " ").to_lowercase();

    normalized
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .map(|token| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_vietnamese_and_english() {
        let tokens = tokenize("Quán cà phê, view Hồ Gươm! (rooftop)");
        assert!(tokens.iter().any(|t| t == "quán"));
        assert!(tokens.iter().any(|t| t == "gươm"));
        assert!(tokens.iter().any(|t| t == "rooftop"));
        assert!(!tokens.iter().any(|t| t.contains('!')));
    }
}
