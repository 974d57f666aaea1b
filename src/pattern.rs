use crate::core::{EngineError, Result};
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

lazy_static::lazy_static! {
    // Memo cache for compiled format patterns; authorities reuse a small
    // set of patterns across many validations.
    static ref REGEX_LRU_CACHE: Arc<Mutex<LruCache<String, Arc<Regex>>>> =
        Arc::new(Mutex::new(LruCache::new(NonZeroUsize::new(128).unwrap())));
}

/// Substring test backing the predicate `Contains` operator.
#[inline]
pub fn contains_match(text: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    text.contains(needle)
}

fn get_or_compile(pattern: &str) -> Result<Arc<Regex>> {
    {
        let mut cache = REGEX_LRU_CACHE.lock()?;
        if let Some(regex) = cache.get(pattern) {
            return Ok(Arc::clone(regex));
        }
    }

    // Anchor so a format pattern must cover the whole value.
    let anchored = format!("^(?:{})$", pattern);
    let compiled = Regex::new(&anchored)
        .map_err(|e| EngineError::Execution(format!("Invalid format pattern: {}", e)))?;
    let compiled = Arc::new(compiled);

    {
        let mut cache = REGEX_LRU_CACHE.lock()?;
        cache.put(pattern.to_string(), Arc::clone(&compiled));
    }

    Ok(compiled)
}

/// Whole-value match against an authority's declared format pattern.
pub fn matches_format(value: &str, pattern: &str) -> Result<bool> {
    let regex = get_or_compile(pattern)?;
    Ok(regex.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        assert!(contains_match("Smithson", "Smith"));
        assert!(contains_match("Smith", ""));
        assert!(!contains_match("Jones", "Smith"));
    }

    #[test]
    fn test_format_is_anchored() {
        assert!(matches_format("12345", r"\d{5}").unwrap());
        assert!(!matches_format("123456", r"\d{5}").unwrap());
        assert!(!matches_format("a12345", r"\d{5}").unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        assert!(matches_format("x", "(unclosed").is_err());
    }
}
