//! Class name lookup for multi-class detectors.
//!
//! YOLO exporters embed the class table as a `names` metadata entry shaped
//! like a Python dict literal: `{0: 'D00', 1: 'D10', 2: "Alligator crack"}`.

use std::collections::BTreeMap;

/// Ordered class names indexed by class id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Parses the exporter's `names` metadata value.
    ///
    /// Gaps in the id sequence are filled with `class_<id>`. Returns `None`
    /// when the text is not a dict of integer keys to quoted strings.
    pub fn parse_metadata(text: &str) -> Option<Self> {
        let body = text.trim().strip_prefix('{')?.strip_suffix('}')?;
        let mut chars = body.chars().peekable();
        let mut entries: BTreeMap<usize, String> = BTreeMap::new();

        loop {
            skip_whitespace(&mut chars);
            if chars.peek().is_none() {
                break;
            }

            let mut key = String::new();
            while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
                key.push(c);
                chars.next();
            }
            let id: usize = key.parse().ok()?;

            skip_whitespace(&mut chars);
            if chars.next()? != ':' {
                return None;
            }
            skip_whitespace(&mut chars);

            let quote = chars.next().filter(|c| *c == '\'' || *c == '"')?;
            let mut name = String::new();
            loop {
                match chars.next()? {
                    '\\' => name.push(chars.next()?),
                    c if c == quote => break,
                    c => name.push(c),
                }
            }
            entries.insert(id, name);

            skip_whitespace(&mut chars);
            match chars.next() {
                Some(',') => continue,
                None => break,
                Some(_) => return None,
            }
        }

        let len = entries.keys().next_back().map_or(0, |max| max + 1);
        let names = (0..len)
            .map(|id| entries.remove(&id).unwrap_or_else(|| fallback_name(id)))
            .collect();
        Some(Self { names })
    }

    /// Name for `class_id`, or `class_<id>` when the table is too short.
    pub fn label(&self, class_id: usize) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| fallback_name(class_id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn fallback_name(class_id: usize) -> String {
    format!("class_{class_id}")
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_rdd_table() {
        let names =
            ClassNames::parse_metadata("{0: 'D00', 1: 'D10', 2: 'D20', 3: 'D40'}").unwrap();
        assert_eq!(names.len(), 4);
        assert_eq!(names.label(0), "D00");
        assert_eq!(names.label(3), "D40");
    }

    #[test]
    fn test_parse_double_quotes_commas_and_escapes() {
        let names = ClassNames::parse_metadata(
            r#"{0: "Alligator crack", 1: 'Pothole, deep', 2: 'Driver\'s lane'}"#,
        )
        .unwrap();
        assert_eq!(names.label(0), "Alligator crack");
        assert_eq!(names.label(1), "Pothole, deep");
        assert_eq!(names.label(2), "Driver's lane");
    }

    #[test]
    fn test_parse_fills_gaps() {
        let names = ClassNames::parse_metadata("{0: 'Crack', 2: 'Pothole'}").unwrap();
        assert_eq!(names.len(), 3);
        assert_eq!(names.label(1), "class_1");
    }

    #[test]
    fn test_parse_empty_dict() {
        let names = ClassNames::parse_metadata("{}").unwrap();
        assert!(names.is_empty());
    }

    #[rstest]
    #[case::not_a_dict("['D00', 'D10']")]
    #[case::string_key("{'a': 'D00'}")]
    #[case::unquoted("{0: D00}")]
    #[case::unterminated("{0: 'D00}")]
    #[case::missing_comma("{0: 'D00' 1: 'D10'}")]
    fn test_parse_rejects(#[case] text: &str) {
        assert!(ClassNames::parse_metadata(text).is_none());
    }

    #[test]
    fn test_label_out_of_range_falls_back() {
        let names = ClassNames::new(vec!["Crack".to_string()]);
        assert_eq!(names.label(0), "Crack");
        assert_eq!(names.label(5), "class_5");
    }
}
