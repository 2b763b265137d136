const PLACEHOLDER_PREFIX: &str = "$placeholder-";

/// Generates unique mock substitution tokens for template pre-resolution.
///
/// Owns its counter: pass an instance by reference to call sites that need
/// fresh placeholders instead of sharing process-wide mutable state.
#[derive(Debug, Default)]
pub struct PlaceholderGenerator {
    index: usize,
}

impl PlaceholderGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unique placeholder string; the Nth call returns the
    /// placeholder for index N, starting at 0
    pub fn next_placeholder(&mut self) -> String {
        let placeholder = format!("{PLACEHOLDER_PREFIX}{}", self.index);
        self.index += 1;
        placeholder
    }

    /// Whether `s` is a placeholder this generator has already emitted
    pub fn is_placeholder(&self, s: &str) -> bool {
        let Some(suffix) = s.strip_prefix(PLACEHOLDER_PREFIX) else {
            return false;
        };
        match suffix.parse::<usize>() {
            Ok(index) => index < self.index,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_placeholder() {
        let mut generator = PlaceholderGenerator::new();
        assert_eq!(generator.next_placeholder(), format!("{PLACEHOLDER_PREFIX}0"));
        assert_eq!(generator.next_placeholder(), format!("{PLACEHOLDER_PREFIX}1"));
        assert_eq!(generator.next_placeholder(), format!("{PLACEHOLDER_PREFIX}2"));

        assert!(generator.is_placeholder(&format!("{PLACEHOLDER_PREFIX}0")));
        assert!(generator.is_placeholder(&format!("{PLACEHOLDER_PREFIX}1")));
        assert!(generator.is_placeholder(&format!("{PLACEHOLDER_PREFIX}2")));

        // Not emitted yet
        assert!(!generator.is_placeholder(&format!("{PLACEHOLDER_PREFIX}3")));
        // Malformed suffixes
        assert!(!generator.is_placeholder(&format!("{PLACEHOLDER_PREFIX}aa")));
        assert!(!generator.is_placeholder(&format!("{PLACEHOLDER_PREFIX}aa2")));
        assert!(!generator.is_placeholder("no-prefix-0"));
    }
}
