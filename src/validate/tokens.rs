// src/validate/tokens.rs

//! Token-level XML file comparison
//!
//! Compares two XML files as normalized token streams: whitespace between
//! tags is insignificant, attribute order is insignificant, and
//! self-closing elements equal an open/close pair. The first divergence is
//! reported with its token position.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt;
use std::path::Path;

/// One normalized XML token
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Element start with its attributes sorted by name
    Open {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Close(String),
    Text(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open { name, attributes } => {
                write!(f, "<{}", name)?;
                for (key, value) in attributes {
                    write!(f, " {}=\"{}\"", key, value)?;
                }
                write!(f, ">")
            }
            Token::Close(name) => write!(f, "</{}>", name),
            Token::Text(text) => write!(f, "'{}'", text),
        }
    }
}

/// Result of a token comparison: verdict plus a human-readable diagnostic
#[derive(Debug, Clone)]
pub struct TokenComparison {
    pub matches: bool,
    pub message: String,
}

/// Compares two XML files token by token
pub fn compare_files(left: &Path, right: &Path) -> std::io::Result<TokenComparison> {
    let left_content = std::fs::read_to_string(left)?;
    let right_content = std::fs::read_to_string(right)?;
    Ok(compare_strings(&left_content, &right_content))
}

/// Compares two XML texts token by token
pub fn compare_strings(left: &str, right: &str) -> TokenComparison {
    let left_tokens = match tokenize(left) {
        Ok(tokens) => tokens,
        Err(detail) => {
            return TokenComparison {
                matches: false,
                message: format!("left file is not well-formed: {}", detail),
            }
        }
    };
    let right_tokens = match tokenize(right) {
        Ok(tokens) => tokens,
        Err(detail) => {
            return TokenComparison {
                matches: false,
                message: format!("right file is not well-formed: {}", detail),
            }
        }
    };

    for (position, (a, b)) in left_tokens.iter().zip(right_tokens.iter()).enumerate() {
        if a != b {
            return TokenComparison {
                matches: false,
                message: format!("token {} differs: {} vs {}", position + 1, a, b),
            };
        }
    }

    if left_tokens.len() != right_tokens.len() {
        let (longer, shorter) = if left_tokens.len() > right_tokens.len() {
            ("left", right_tokens.len())
        } else {
            ("right", left_tokens.len())
        };
        return TokenComparison {
            matches: false,
            message: format!(
                "{} file continues after token {}: {} vs {} tokens",
                longer,
                shorter,
                left_tokens.len(),
                right_tokens.len()
            ),
        };
    }

    TokenComparison {
        matches: true,
        message: format!("files are token-equivalent ({} tokens)", left_tokens.len()),
    }
}

fn tokenize(content: &str) -> Result<Vec<Token>, String> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut tokens = Vec::new();
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => tokens.push(open_token(&e)?),
            Event::Empty(e) => {
                // A self-closing element equals an open/close pair.
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                tokens.push(open_token(&e)?);
                tokens.push(Token::Close(name));
            }
            Event::End(e) => {
                tokens.push(Token::Close(
                    String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                ));
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|e| e.to_string())?;
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    tokens.push(Token::Text(trimmed.to_string()));
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                if !value.trim().is_empty() {
                    tokens.push(Token::Text(value.trim().to_string()));
                }
            }
            // Declarations, comments and processing instructions carry no
            // document content.
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }
    Ok(tokens)
}

fn open_token(element: &quick_xml::events::BytesStart<'_>) -> Result<Token, String> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| e.to_string())?
            .into_owned();
        attributes.push((key, value));
    }
    attributes.sort();
    Ok(Token::Open { name, attributes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_between_tags_is_ignored() {
        let a = "<root><child a=\"1\"/></root>";
        let b = "<root>\n  <child a=\"1\"/>\n</root>\n";
        assert!(compare_strings(a, b).matches);
    }

    #[test]
    fn test_attribute_order_is_ignored() {
        let a = r#"<root><child a="1" b="2"/></root>"#;
        let b = r#"<root><child b="2" a="1"/></root>"#;
        assert!(compare_strings(a, b).matches);
    }

    #[test]
    fn test_self_closing_equals_open_close_pair() {
        let a = "<root><child/></root>";
        let b = "<root><child></child></root>";
        assert!(compare_strings(a, b).matches);
    }

    #[test]
    fn test_value_difference_is_reported() {
        let a = r#"<root><child a="1"/></root>"#;
        let b = r#"<root><child a="2"/></root>"#;
        let result = compare_strings(a, b);
        assert!(!result.matches);
        assert!(result.message.contains("token 2 differs"), "{}", result.message);
    }

    #[test]
    fn test_text_content_compared_trimmed() {
        let a = "<root>  hello  </root>";
        let b = "<root>hello</root>";
        assert!(compare_strings(a, b).matches);

        let c = "<root>goodbye</root>";
        assert!(!compare_strings(a, c).matches);
    }

    #[test]
    fn test_extra_element_is_reported() {
        let a = "<root><child/></root>";
        let b = "<root><child/><child/></root>";
        let result = compare_strings(a, b);
        assert!(!result.matches);
        assert!(result.message.contains("continues after"), "{}", result.message);
    }

    #[test]
    fn test_malformed_input_is_reported() {
        let result = compare_strings("<root>", "<root/>");
        assert!(!result.matches);
    }

    #[test]
    fn test_files_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.xml");
        let b = dir.path().join("b.xml");
        std::fs::write(&a, "<root><x/></root>").unwrap();
        std::fs::write(&b, "<root>\n  <x></x>\n</root>").unwrap();

        let result = compare_files(&a, &b).unwrap();
        assert!(result.matches, "{}", result.message);
    }
}
