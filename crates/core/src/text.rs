const ARTICLES: [&str; 3] = ["a", "an", "the"];

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercases, strips ASCII punctuation, drops English articles and collapses whitespace.
///
/// Deliberately stricter than case and whitespace folding: "The answer." and
/// "answer" compare equal, matching SQuAD-style answer scoring.
pub fn normalize_answer(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .filter(|character| !character.is_ascii_punctuation())
        .collect();
    lowered
        .split_whitespace()
        .filter(|token| !ARTICLES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn answer_tokens(text: &str) -> Vec<String> {
    normalize_answer(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Lowercase alphanumeric terms used for sparse indexing.
pub fn index_terms(text: &str) -> Vec<String> {
    text.split(|character: char| !character.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Case variants of an identifier whose words are separated by `_`.
pub fn text_modifier(text: &str, extra_words: &[String]) -> Vec<String> {
    let mut variants = vec![
        text.to_string(),
        text.to_lowercase(),
        capitalize(text),
        text.to_uppercase(),
    ];

    if text.contains('_') {
        let parts: Vec<&str> = text.split('_').collect();
        let capitalized: Vec<String> = parts.iter().map(|part| capitalize(part)).collect();
        variants.push(parts.join("-"));
        variants.push(capitalized.join("_"));
        variants.push(capitalized.join("-"));
        variants.push(parts.concat());
        variants.push(capitalized.concat());
        variants.push(parts.iter().map(|part| part.to_uppercase()).collect());
    }

    variants.extend(extra_words.iter().cloned());
    variants
}

/// Cuts `text` at each stop word in turn, unless the cut would leave nothing.
pub fn slice_stop_words(text: &str, stop_words: &[String]) -> String {
    let mut current = text.to_string();
    for stop_word in stop_words.iter().filter(|word| !word.is_empty()) {
        if let Some(position) = current.find(stop_word.as_str()) {
            if position > 0 {
                current.truncate(position);
            }
        }
    }
    current
}
