//! Data tokenizer - shields sensitive values from context inspection
//!
//! Fields whose *names* match a configurable list of glob patterns have
//! their values swapped for opaque tokens; the originals are kept in a
//! per-instance token map so the substitution can be reversed on demand.
//! Tokenization matches by field name, detokenization by value (the token
//! string), since after tokenization the field name is preserved but the
//! value is now a token.

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Field-name glob patterns treated as sensitive by default
pub const DEFAULT_SENSITIVE_PATTERNS: &[&str] = &[
    "*password*",
    "*_pass",
    "*_pwd",
    "*secret*",
    "*token",
    "*api_key*",
    "*private_key*",
    "user_email",
    "billing_*",
    "payment_*",
    "credit_card*",
    "ssn",
    "social_security*",
];

/// Prefix of every minted token
const TOKEN_PREFIX: &str = "tok_";

/// Reversible tokenizer for sensitive fields in structured data
#[derive(Debug)]
pub struct DataTokenizer {
    /// Compiled field-name patterns
    patterns: Vec<Regex>,

    /// token -> original value, for the lifetime of this instance
    tokens: HashMap<String, Value>,
}

impl DataTokenizer {
    /// Create a tokenizer with the default sensitive-field patterns
    pub fn new() -> Self {
        Self::with_patterns(&[])
    }

    /// Create a tokenizer with the defaults plus caller-supplied globs
    pub fn with_patterns(extra: &[&str]) -> Self {
        let patterns = DEFAULT_SENSITIVE_PATTERNS
            .iter()
            .chain(extra.iter())
            .filter_map(|glob| compile_glob(glob))
            .collect();

        Self {
            patterns,
            tokens: HashMap::new(),
        }
    }

    /// Replace sensitive field values with freshly minted tokens.
    ///
    /// Walks arrays and objects; scalars pass through unchanged. Matching
    /// is on the field name, case-insensitive. A matching field's whole
    /// value is replaced, containers included.
    pub fn tokenize(&mut self, data: &Value) -> Value {
        match data {
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (field, value) in map {
                    if self.is_sensitive(field) {
                        out.insert(field.clone(), Value::String(self.mint(value.clone())));
                    } else {
                        out.insert(field.clone(), self.tokenize(value));
                    }
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.tokenize(item)).collect())
            }
            scalar => scalar.clone(),
        }
    }

    /// Restore original values for any token found in the data.
    ///
    /// Unmatched strings are treated as ordinary values and left as-is.
    pub fn detokenize(&self, data: &Value) -> Value {
        match data {
            Value::String(s) => match self.tokens.get(s) {
                Some(original) => original.clone(),
                None => data.clone(),
            },
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(field, value)| (field.clone(), self.detokenize(value)))
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.detokenize(item)).collect())
            }
            scalar => scalar.clone(),
        }
    }

    /// Check whether a field name matches any sensitive pattern
    pub fn is_sensitive(&self, field: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(field))
    }

    /// Discard the token map; outstanding tokens become irrecoverable
    pub fn clear(&mut self) {
        debug!("clearing {} tokens", self.tokens.len());
        self.tokens.clear();
    }

    /// Number of tokens currently held
    pub fn get_token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Mint a unique token and record the original value under it
    fn mint(&mut self, original: Value) -> String {
        let token = format!("{}{}", TOKEN_PREFIX, Uuid::new_v4().simple());
        self.tokens.insert(token.clone(), original);
        token
    }
}

impl Default for DataTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a glob into an anchored, case-insensitive regex.
///
/// Only `*` is special; everything else is matched literally.
fn compile_glob(glob: &str) -> Option<Regex> {
    let pattern = format!("^{}$", regex::escape(glob).replace(r"\*", ".*"));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokenize_password_field() {
        let mut tokenizer = DataTokenizer::new();
        let data = json!({"username": "admin", "password": "s3cr3t"});

        let tokenized = tokenizer.tokenize(&data);

        assert_eq!(tokenized["username"], json!("admin"));
        let token = tokenized["password"].as_str().unwrap();
        assert!(token.starts_with("tok_"));
        assert_ne!(token, "s3cr3t");
        assert_eq!(tokenizer.get_token_count(), 1);
    }

    #[test]
    fn test_detokenize_round_trip() {
        let mut tokenizer = DataTokenizer::new();
        let data = json!({"password": "s3cr3t"});

        let tokenized = tokenizer.tokenize(&data);
        let restored = tokenizer.detokenize(&tokenized);

        assert_eq!(restored, data);
    }

    #[test]
    fn test_detokenize_bare_token_anywhere() {
        let mut tokenizer = DataTokenizer::new();
        let tokenized = tokenizer.tokenize(&json!({"api_key": "abc123"}));
        let token = tokenized["api_key"].clone();

        // the token travels as a plain value inside another structure
        let carried = json!({"nested": {"values": [token]}});
        let restored = tokenizer.detokenize(&carried);
        assert_eq!(restored["nested"]["values"][0], json!("abc123"));
    }

    #[test]
    fn test_tokens_are_unique_per_call() {
        let mut tokenizer = DataTokenizer::new();
        let data = json!({"password": "same"});

        let first = tokenizer.tokenize(&data);
        let second = tokenizer.tokenize(&data);

        assert_ne!(first["password"], second["password"]);
        assert_eq!(tokenizer.get_token_count(), 2);
    }

    #[test]
    fn test_matching_is_case_insensitive_and_glob_aware() {
        let mut tokenizer = DataTokenizer::new();
        let data = json!({
            "User_Email": "a@b.com",
            "BILLING_address": "1 Main St",
            "api_key_secret": "k",
            "email_preferences": "weekly"
        });

        let tokenized = tokenizer.tokenize(&data);

        assert!(tokenized["User_Email"].as_str().unwrap().starts_with("tok_"));
        assert!(tokenized["BILLING_address"]
            .as_str()
            .unwrap()
            .starts_with("tok_"));
        assert!(tokenized["api_key_secret"]
            .as_str()
            .unwrap()
            .starts_with("tok_"));
        // no pattern matches a name that merely contains "email"
        assert_eq!(tokenized["email_preferences"], json!("weekly"));
    }

    #[test]
    fn test_nested_containers_recursed() {
        let mut tokenizer = DataTokenizer::new();
        let data = json!({
            "users": [
                {"name": "a", "password": "pw1"},
                {"name": "b", "credentials": {"ssh_private_key": "key"}}
            ]
        });

        let tokenized = tokenizer.tokenize(&data);

        assert!(tokenized["users"][0]["password"]
            .as_str()
            .unwrap()
            .starts_with("tok_"));
        assert!(tokenized["users"][1]["credentials"]["ssh_private_key"]
            .as_str()
            .unwrap()
            .starts_with("tok_"));
        assert_eq!(tokenized["users"][0]["name"], json!("a"));
    }

    #[test]
    fn test_matching_container_value_replaced_whole() {
        let mut tokenizer = DataTokenizer::new();
        let data = json!({"payment_details": {"number": "4111", "cvv": "123"}});

        let tokenized = tokenizer.tokenize(&data);
        assert!(tokenized["payment_details"].is_string());

        let restored = tokenizer.detokenize(&tokenized);
        assert_eq!(restored, data);
    }

    #[test]
    fn test_scalar_input_passes_through() {
        let mut tokenizer = DataTokenizer::new();
        assert_eq!(tokenizer.tokenize(&json!("plain")), json!("plain"));
        assert_eq!(tokenizer.tokenize(&json!(42)), json!(42));
        assert_eq!(tokenizer.tokenize(&Value::Null), Value::Null);
    }

    #[test]
    fn test_caller_supplied_patterns() {
        let mut tokenizer = DataTokenizer::with_patterns(&["internal_*"]);
        let data = json!({"internal_id": "x-1", "public_id": "y-2"});

        let tokenized = tokenizer.tokenize(&data);
        assert!(tokenized["internal_id"].as_str().unwrap().starts_with("tok_"));
        assert_eq!(tokenized["public_id"], json!("y-2"));
    }

    #[test]
    fn test_clear_discards_tokens() {
        let mut tokenizer = DataTokenizer::new();
        let tokenized = tokenizer.tokenize(&json!({"password": "pw"}));
        tokenizer.clear();

        assert_eq!(tokenizer.get_token_count(), 0);
        // the orphaned token is now an ordinary string
        assert_eq!(tokenizer.detokenize(&tokenized), tokenized);
    }

    #[test]
    fn test_token_suffix_patterns() {
        let mut tokenizer = DataTokenizer::new();
        let data = json!({"auth_token": "t", "db_pass": "p", "admin_pwd": "w"});

        let tokenized = tokenizer.tokenize(&data);
        for field in ["auth_token", "db_pass", "admin_pwd"] {
            assert!(
                tokenized[field].as_str().unwrap().starts_with("tok_"),
                "{} should be tokenized",
                field
            );
        }
    }
}
