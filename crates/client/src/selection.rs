//! Index selection syntax for batch operations
//!
//! Operators pick items from a displayed listing with expressions such as
//! `3`, `1-5`, or `1-5,7,9-12`. Indices are one-based, match the numbers
//! printed next to each row, and always refer to the currently displayed
//! (filtered and sorted) view.

use std::collections::BTreeSet;

/// A validated, ordered, duplicate-free set of one-based indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSelection {
    indices: Vec<usize>,
}

impl BatchSelection {
    /// Parse `input` against a view of `max` items
    ///
    /// Reversed ranges (`5-3`) are normalised and duplicates collapse.
    /// Nothing is selected unless every part is valid.
    pub fn parse(input: &str, max: usize) -> Result<Self, SelectionError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SelectionError::Empty);
        }
        if max == 0 {
            return Err(SelectionError::NothingToSelect);
        }

        let mut indices = BTreeSet::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(SelectionError::Malformed(input.to_string()));
            }

            let (start, end) = match part.split_once('-') {
                Some((a, b)) => (parse_index(a, part)?, parse_index(b, part)?),
                None => {
                    let n = parse_index(part, part)?;
                    (n, n)
                }
            };
            let (low, high) = if start <= end { (start, end) } else { (end, start) };

            for index in [low, high] {
                if index == 0 || index > max {
                    return Err(SelectionError::OutOfRange { index, max });
                }
            }
            indices.extend(low..=high);
        }

        Ok(Self {
            indices: indices.into_iter().collect(),
        })
    }

    /// One-based indices in ascending order
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Items of `view` named by this selection, in index order
    pub fn resolve<'a, T>(&self, view: &'a [T]) -> Vec<&'a T> {
        self.indices
            .iter()
            .filter_map(|&i| view.get(i - 1))
            .collect()
    }
}

fn parse_index(text: &str, part: &str) -> Result<usize, SelectionError> {
    text.trim()
        .parse::<usize>()
        .map_err(|_| SelectionError::Malformed(part.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("No selection entered")]
    Empty,
    #[error("Invalid selection '{0}' (use numbers and ranges like 1-5,7,9-12)")]
    Malformed(String),
    #[error("Index {index} is out of range (1-{max})")]
    OutOfRange { index: usize, max: usize },
    #[error("Nothing to select")]
    NothingToSelect,
}

pub type SelectionResult<T> = Result<T, SelectionError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_ranges() {
        let sel = BatchSelection::parse("1-5,7,9-12", 12).unwrap();
        assert_eq!(sel.indices(), &[1, 2, 3, 4, 5, 7, 9, 10, 11, 12]);
        assert_eq!(BatchSelection::parse(" 3 ", 5).unwrap().indices(), &[3]);
    }

    #[test]
    fn test_duplicates_and_reversed_ranges() {
        let sel = BatchSelection::parse("5-3,4,4,1", 6).unwrap();
        assert_eq!(sel.indices(), &[1, 3, 4, 5]);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            BatchSelection::parse("2,7", 6),
            Err(SelectionError::OutOfRange { index: 7, max: 6 })
        );
        assert_eq!(
            BatchSelection::parse("0", 6),
            Err(SelectionError::OutOfRange { index: 0, max: 6 })
        );
    }

    #[test]
    fn test_malformed() {
        for input in ["a", "1,,2", "1-", "-3", "1-2-3", "2.5", "1;2"] {
            assert!(
                matches!(BatchSelection::parse(input, 10), Err(SelectionError::Malformed(_))),
                "{input} should be malformed"
            );
        }
        assert_eq!(BatchSelection::parse("  ", 10), Err(SelectionError::Empty));
        assert_eq!(BatchSelection::parse("1", 0), Err(SelectionError::NothingToSelect));
    }

    #[test]
    fn test_resolve_against_view() {
        let view = ["a", "b", "c", "d", "e", "f"];
        let sel = BatchSelection::parse("2,4-5", view.len()).unwrap();
        assert_eq!(sel.resolve(&view), vec![&"b", &"d", &"e"]);
    }
}
