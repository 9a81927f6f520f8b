//! Tokenizing and slug helpers shared by indexing and lookup.

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "for", "from", "i", "in", "is",
    "it", "make", "me", "my", "of", "on", "or", "please", "should", "so", "the", "this", "to",
    "up", "we", "with", "you", "want", "would", "like", "could",
];

const MAX_SLUG_LEN: usize = 48;

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Lowercase word tokens; splits on punctuation and camelCase boundaries.
/// Order is preserved, duplicates removed, single characters and stopwords dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if current.len() > 1 && !is_stopword(current) && !tokens.contains(current) {
            tokens.push(std::mem::take(current));
        } else {
            current.clear();
        }
    };

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower {
                flush(&mut current, &mut tokens);
            }
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            current.extend(ch.to_lowercase());
        } else {
            prev_lower = false;
            flush(&mut current, &mut tokens);
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

/// `".header__logo:hover"` -> `"header-logo-hover"`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_camel_case_and_punctuation() {
        assert_eq!(
            tokenize("Make the headerLogo bigger, please!"),
            vec!["header", "logo", "bigger"]
        );
        assert_eq!(tokenize("main-product.liquid"), vec!["main", "product", "liquid"]);
        assert_eq!(tokenize("logo logo LOGO"), vec!["logo"]);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify(".header__logo:hover"), "header-logo-hover");
        assert_eq!(slugify("section.settings.show_logo"), "section-settings-show-logo");
        assert_eq!(slugify("***"), "");
        assert!(slugify(&"x-".repeat(60)).len() <= MAX_SLUG_LEN);
    }
}
