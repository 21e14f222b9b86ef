//! Message templates with named placeholders.
//!
//! A template such as `"sum={sum}, i={i}"` declares the fields of a call site
//! in order. `{{` and `}}` escape literal braces. `{}` is an anonymous
//! placeholder: it takes a value but cannot be queried by name.

use std::mem;

use crate::error::TemplateError;

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Index into the captured values.
    Field(usize),
}

/// A template split into literals and placeholder positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    segments: Vec<Segment>,
    names: Vec<String>,
}

impl ParsedTemplate {
    /// Parses a template, rejecting unbalanced or nested braces.
    ///
    /// # Examples
    ///
    /// ```
    /// # use replay_logger::template::ParsedTemplate;
    /// let parsed = ParsedTemplate::parse("sum={sum}, i={i}").unwrap();
    /// assert_eq!(parsed.names(), &["sum", "i"]);
    /// assert_eq!(parsed.index_of("i"), Some(1));
    /// ```
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut names = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some(&(_, '{'))) {
                        chars.next();
                        literal.push('{');
                        continue;
                    }

                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError::NestedPlaceholder { position }),
                            other => name.push(other),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::UnclosedPlaceholder { position });
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(names.len()));
                    names.push(name.trim().to_owned());
                }
                '}' => {
                    if matches!(chars.peek(), Some(&(_, '}'))) {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(TemplateError::UnmatchedBrace { position });
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments, names })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in order; anonymous placeholders are empty strings.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn placeholder_count(&self) -> usize {
        self.names.len()
    }

    /// Position of the first placeholder called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.names.iter().position(|candidate| candidate == name)
    }
}

/// Compile-time check used by the logging macros.
///
/// Accepts exactly the templates [`ParsedTemplate::parse`] accepts.
#[doc(hidden)]
pub const fn validate_template(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut in_brace = false;

    while i < bytes.len() {
        let next = if i + 1 < bytes.len() { bytes[i + 1] } else { 0 };
        match bytes[i] {
            b'{' => {
                if in_brace {
                    return false; // Nested braces not allowed
                }
                if next == b'{' {
                    i += 2;
                    continue;
                }
                in_brace = true;
            }
            b'}' => {
                if in_brace {
                    in_brace = false;
                } else if next == b'}' {
                    i += 2;
                    continue;
                } else {
                    return false; // Unmatched closing brace
                }
            }
            _ => {}
        }
        i += 1;
    }
    !in_brace
}
