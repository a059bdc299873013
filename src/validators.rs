use crate::error::{AppError, Result};

/// Splits a comma/semicolon/newline separated list into unique, lowercased keywords.
/// Order of first appearance is kept.
pub fn validate_keywords(input: &str) -> Result<Vec<String>> {
    let mut keywords: Vec<String> = Vec::new();
    for raw in input.split([',', ';', '\n']) {
        let keyword = raw.trim().to_lowercase();
        if !keyword.is_empty() && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }
    if keywords.is_empty() {
        return Err(AppError::Configuration("No valid keywords provided".to_string()));
    }
    Ok(keywords)
}

/// Trims `keyword` and checks its length in characters.
pub fn validate_keyword(keyword: &str, min_len: usize, max_len: usize) -> Result<String> {
    let trimmed = keyword.trim();
    let len = trimmed.chars().count();
    if len < min_len {
        return Err(AppError::Configuration(format!(
            "Keyword '{trimmed}' is too short (minimum {min_len} characters)"
        )));
    }
    if len > max_len {
        return Err(AppError::Configuration(format!(
            "Keyword is too long ({len} characters, maximum {max_len})"
        )));
    }
    Ok(trimmed.to_string())
}

/// Normalizes a site URL. A missing scheme becomes `https://`; the result must have a host.
pub fn validate_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::Configuration("URL cannot be empty".to_string()));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = url::Url::parse(&candidate)
        .map_err(|e| AppError::Configuration(format!("Invalid URL '{trimmed}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(AppError::Configuration(format!("Invalid URL '{trimmed}'")));
    }
    Ok(candidate)
}

pub fn validate_country_code(code: &str) -> Result<String> {
    two_letter_code(code, "country")
}

pub fn validate_language_code(code: &str) -> Result<String> {
    two_letter_code(code, "language")
}

fn two_letter_code(code: &str, what: &str) -> Result<String> {
    let code = code.trim();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Configuration(format!(
            "Invalid {what} code '{code}' (expected 2 letters)"
        )));
    }
    Ok(code.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_list_is_split_lowercased_and_deduplicated() {
        assert_eq!(
            validate_keywords("python, SEO, automation").unwrap(),
            vec!["python", "seo", "automation"]
        );
        assert_eq!(
            validate_keywords("rust;Rust\ncargo,, ").unwrap(),
            vec!["rust", "cargo"]
        );
    }

    #[test]
    fn empty_keyword_list_is_rejected() {
        assert!(matches!(validate_keywords(""), Err(AppError::Configuration(_))));
        assert!(matches!(validate_keywords(" , ;\n"), Err(AppError::Configuration(_))));
    }

    #[test]
    fn keyword_list_has_no_minimum_length() {
        assert_eq!(validate_keywords("a").unwrap(), vec!["a"]);
        assert!(validate_keyword("a", 2, 200).is_err());
    }

    #[test]
    fn keyword_length_bounds() {
        assert!(validate_keyword("a", 2, 200).is_err());
        assert_eq!(validate_keyword("  ab ", 2, 200).unwrap(), "ab");
        assert!(validate_keyword(&"x".repeat(201), 2, 200).is_err());
        assert!(validate_keyword(&"x".repeat(200), 2, 200).is_ok());
    }

    #[test]
    fn url_gets_https_scheme() {
        assert_eq!(validate_url("example.com").unwrap(), "https://example.com");
        assert_eq!(validate_url("http://example.com/a").unwrap(), "http://example.com/a");
        assert!(validate_url("").is_err());
        assert!(validate_url("ftp://example.com").is_err());
    }

    #[test]
    fn two_letter_codes() {
        assert_eq!(validate_country_code("US").unwrap(), "us");
        assert_eq!(validate_language_code(" en ").unwrap(), "en");
        assert!(validate_country_code("usa").is_err());
        assert!(validate_language_code("e1").is_err());
    }
}
