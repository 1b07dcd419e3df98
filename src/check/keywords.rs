//! Keyword presence checks on page bodies.

/// Result of a keyword scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordCheckResult {
    pub found: bool,
    pub missing_keyword: Option<String>,
    pub found_keywords: Vec<String>,
}

/// Requires every keyword, scanning in the given order.
///
/// Stops at the first keyword that is not a literal substring of `body` and
/// reports it together with the keywords found before it.
pub fn check_keywords(body: &str, keywords: &[String]) -> KeywordCheckResult {
    let mut found_keywords = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        if body.contains(keyword.as_str()) {
            found_keywords.push(keyword.clone());
        } else {
            return KeywordCheckResult {
                found: false,
                missing_keyword: Some(keyword.clone()),
                found_keywords,
            };
        }
    }
    KeywordCheckResult {
        found: true,
        missing_keyword: None,
        found_keywords,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_keywords_present() {
        let result = check_keywords("<h1>A</h1><p>B</p>", &kw(&["A", "B"]));
        assert!(result.found);
        assert_eq!(result.found_keywords, kw(&["A", "B"]));
        assert_eq!(result.missing_keyword, None);
    }

    #[test]
    fn test_second_keyword_missing() {
        let result = check_keywords("only A here", &kw(&["A", "B"]));
        assert!(!result.found);
        assert_eq!(result.missing_keyword.as_deref(), Some("B"));
        assert_eq!(result.found_keywords, kw(&["A"]));
    }

    #[test]
    fn test_first_keyword_missing_stops_scan() {
        let result = check_keywords("nothing relevant, not even B", &kw(&["A", "B"]));
        assert!(!result.found);
        assert_eq!(result.missing_keyword.as_deref(), Some("A"));
        assert!(result.found_keywords.is_empty());
    }

    #[test]
    fn test_empty_keyword_list_passes() {
        let result = check_keywords("anything", &[]);
        assert!(result.found);
        assert!(result.found_keywords.is_empty());
    }

    #[test]
    fn test_match_is_case_sensitive_literal() {
        let result = check_keywords("Welcome to the SHOP", &kw(&["shop"]));
        assert!(!result.found);
        let result = check_keywords("price: $10 (incl. tax)", &kw(&["$10 (incl."]));
        assert!(result.found);
    }

    #[test]
    fn test_non_ascii_keywords() {
        let result = check_keywords("<title>Главная страница</title>", &kw(&["Главная"]));
        assert!(result.found);
    }
}
