//! Message templates
//!
//! A template is a literal string with `%s` placeholders and `%%` escapes
//! for a literal `%`. Templates are parsed once, up front, into the literal
//! runs between placeholders; binding values at log time is then pure
//! buffer appends with no parsing and no allocation.

use crate::error::{ FluxlogError, Result };

/// A parsed, immutable message template.
///
/// `literals` holds the runs between placeholders (escapes already
/// resolved), so a template with `n` placeholders has `n + 1` literals,
/// some possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    literals: Vec<String>,
}

impl Template {
    /// Parse a template string.
    ///
    /// Only `%s` and `%%` are recognized after a `%`; anything else is a
    /// malformed pattern.
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut literals = Vec::new();
        let mut current = String::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                current.push(c);
                continue;
            }
            match chars.next() {
                Some('s') => {
                    literals.push(std::mem::take(&mut current));
                }
                Some('%') => {
                    current.push('%');
                }
                Some(other) => {
                    return Err(
                        FluxlogError::pattern_misuse(
                            format!("Unknown placeholder %{other} in pattern {pattern:?}")
                        )
                    );
                }
                None => {
                    return Err(
                        FluxlogError::pattern_misuse(
                            format!("Dangling % at end of pattern {pattern:?}")
                        )
                    );
                }
            }
        }
        literals.push(current);

        Ok(Self { literals })
    }

    /// Number of `%s` placeholders
    #[inline]
    pub fn placeholder_count(&self) -> usize {
        self.literals.len() - 1
    }

    /// Literal run at the given index; index 0 precedes the first
    /// placeholder
    #[inline]
    pub(crate) fn literal(&self, index: usize) -> &str {
        &self.literals[index]
    }
}
