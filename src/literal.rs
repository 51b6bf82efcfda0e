//! Quoted-literal shielding.
//!
//! Structural text transforms (collapsing whitespace in rendered values,
//! locating keys in a declaring document) must never look inside string
//! literals. [`shield`] swaps every quoted span for a numbered placeholder
//! token, the transform runs on the masked text, and [`Shielded::restore`]
//! puts the original spans back.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::err_msg;
use crate::errors::TesterError;

/// Delimiters recognised as quoting a literal.
pub const DELIMITERS: [char; 3] = ['`', '"', '\''];

static DEFAULT: Lazy<Tokenizer> = Lazy::new(|| Tokenizer {
    literal: Regex::new(&quote_pattern(&DELIMITERS)).expect("default literal pattern is valid"),
});

static DOUBLE_QUOTED: Lazy<Tokenizer> = Lazy::new(|| Tokenizer {
    literal: Regex::new(&quote_pattern(&['"'])).expect("double-quote literal pattern is valid"),
});

/// Builds a regex source matching one quoted literal for any of `delimiters`.
///
/// A literal is the delimiter, then any number of escaped pairs (a backslash
/// and the following character) or characters that are neither the delimiter,
/// a bare backslash nor a newline, then the same delimiter again. Each
/// delimiter gets its own alternative so the closing quote always matches the
/// opening one.
///
/// ```rust
/// use declaratest::literal::quote_pattern;
/// let re = regex::Regex::new(&quote_pattern(&['"'])).unwrap();
/// assert_eq!(re.find(r#"x = "a \" b" + 1"#).unwrap().as_str(), r#""a \" b""#);
/// ```
pub fn quote_pattern(delimiters: &[char]) -> String {
    let alternatives: Vec<String> = delimiters
        .iter()
        .map(|d| {
            let d = regex::escape(&d.to_string());
            format!(r"{d}(?:\\.|[^{d}\\\n])*{d}")
        })
        .collect();
    format!("(?:{})", alternatives.join("|"))
}

fn placeholder(index: usize) -> String {
    format!("'~{}~'", index)
}

/// Text with its literals swapped out for placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shielded {
    masked: String,
    literals: Vec<String>,
}

/// Finds quoted literals for a fixed set of delimiters.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    literal: Regex,
}

impl Tokenizer {
    pub fn new(delimiters: &[char]) -> Result<Self, TesterError> {
        if delimiters.is_empty() {
            return Err(err_msg!(Configuration, "at least one literal delimiter is required"));
        }
        let literal = Regex::new(&quote_pattern(delimiters))
            .map_err(|e| err_msg!(Configuration, "invalid literal delimiters {:?}: {}", delimiters, e))?;
        Ok(Self { literal })
    }

    /// Only `"` quotes a literal; `'` is left alone.
    pub fn double_quoted() -> Self {
        DOUBLE_QUOTED.clone()
    }

    /// Replaces every quoted literal in `text` with a numbered placeholder.
    pub fn shield(&self, text: &str) -> Shielded {
        let mut masked = String::with_capacity(text.len());
        let mut literals = Vec::new();
        let mut start = 0;
        for found in self.literal.find_iter(text) {
            masked.push_str(&text[start..found.start()]);
            masked.push_str(&placeholder(literals.len()));
            literals.push(found.as_str().to_string());
            start = found.end();
        }
        masked.push_str(&text[start..]);
        Shielded { masked, literals }
    }

    /// Applies `transform` to `text` with its literals shielded.
    pub fn sanitize<F>(&self, text: &str, transform: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        let shielded = self.shield(text);
        let output = transform(shielded.masked());
        shielded.restore(&output)
    }

    /// Fallible form of [`Tokenizer::sanitize`]; nothing is restored when `transform` fails.
    pub fn try_sanitize<F, E>(&self, text: &str, transform: F) -> Result<String, E>
    where
        F: FnOnce(&str) -> Result<String, E>,
    {
        let shielded = self.shield(text);
        let output = transform(shielded.masked())?;
        Ok(shielded.restore(&output))
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        DEFAULT.clone()
    }
}

/// [`Tokenizer::shield`] with the default delimiters.
pub fn shield(text: &str) -> Shielded {
    DEFAULT.shield(text)
}

impl Shielded {
    /// The text with placeholders in place of literals.
    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// The original literal spans, in order of appearance.
    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    /// Puts the original literals back into `output`.
    ///
    /// Placeholders are restored in order, each at its first occurrence at or
    /// after a cursor that advances past the previous restoration. A
    /// placeholder moved in front of the cursor is searched again from the
    /// start of the text; a deleted one is skipped.
    pub fn restore(&self, output: &str) -> String {
        let mut output = output.to_string();
        let mut cursor = 0;
        for (index, literal) in self.literals.iter().enumerate() {
            let token = placeholder(index);
            let at = output[cursor..]
                .find(&token)
                .map(|offset| cursor + offset)
                .or_else(|| output.find(&token));
            if let Some(at) = at {
                output.replace_range(at..at + token.len(), literal);
                cursor = at + literal.len();
            }
        }
        output
    }
}

/// [`Tokenizer::sanitize`] with the default delimiters.
///
/// ```rust
/// use declaratest::literal::sanitize;
/// let out = sanitize("{ a: '{ keep }' }", |t| t.replace("{ ", "{").replace(" }", "}"));
/// assert_eq!(out, "{a: '{ keep }'}");
/// ```
pub fn sanitize<F>(text: &str, transform: F) -> String
where
    F: FnOnce(&str) -> String,
{
    DEFAULT.sanitize(text, transform)
}

/// [`Tokenizer::try_sanitize`] with the default delimiters.
pub fn try_sanitize<F, E>(text: &str, transform: F) -> Result<String, E>
where
    F: FnOnce(&str) -> Result<String, E>,
{
    DEFAULT.try_sanitize(text, transform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_each_delimiter_kind() {
        let shielded = shield(r#"a "one" b 'two' c `three`"#);
        assert_eq!(shielded.masked(), "a '~0~' b '~1~' c '~2~'");
        assert_eq!(shielded.literals(), &[r#""one""#, "'two'", "`three`"]);
    }

    #[test]
    fn escaped_delimiters_stay_inside_the_literal() {
        let text = r#"x: "say \"hi\"", y: 'it\'s'"#;
        let shielded = shield(text);
        assert_eq!(shielded.masked(), "x: '~0~', y: '~1~'");
        assert_eq!(shielded.restore(shielded.masked()), text);
    }

    #[test]
    fn literals_do_not_span_lines() {
        let shielded = shield("a \"open\nclose\" b");
        assert!(shielded.literals().is_empty());
    }

    #[test]
    fn restores_relocated_placeholders() {
        let text = "first 'a' second 'b'";
        let out = sanitize(text, |masked| {
            let parts: Vec<&str> = masked.split(' ').rev().collect();
            parts.join(" ")
        });
        assert_eq!(out, "'b' second 'a' first");
    }

    #[test]
    fn duplicated_placeholder_keeps_first_copy_restored() {
        let out = sanitize("k: 'v'", |masked| format!("{masked} {masked}"));
        assert!(out.starts_with("k: 'v' k: "));
    }

    #[test]
    fn transform_cannot_touch_literal_content() {
        let out = sanitize("[ 'a [ b' ]", |t| t.replace("[ ", "[").replace(" ]", "]"));
        assert_eq!(out, "['a [ b']");
    }

    #[test]
    fn custom_delimiters_ignore_other_quotes() {
        let tokenizer = Tokenizer::new(&['"']).unwrap();
        let shielded = tokenizer.shield(r#"fn f<'a>(x: &'a str) -> &'a str { "it's" }"#);
        assert_eq!(shielded.literals(), &[r#""it's""#]);
        let shielded = Tokenizer::double_quoted().shield(r#"x<'a>("b", 'c')"#);
        assert_eq!(shielded.literals(), &[r#""b""#]);
    }

    #[test]
    fn empty_delimiter_set_is_rejected() {
        let err = Tokenizer::new(&[]).unwrap_err();
        assert_eq!(err.kind(), &crate::errors::ErrorKind::Configuration);
    }

    #[test]
    fn try_sanitize_propagates_errors() {
        let result: Result<String, &str> = try_sanitize("'x'", |_| Err("nope"));
        assert_eq!(result, Err("nope"));
    }
}
