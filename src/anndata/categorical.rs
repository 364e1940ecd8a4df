use std::collections::{BTreeSet, HashMap};

use super::ContainerError;

/// A categorical vector of strings.
///
/// Each element is a code into the categories, or `-1` for a missing value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Categorical {
    codes: Vec<i32>,
    categories: Vec<String>,
    ordered: bool,
}

impl Categorical {
    /// Create a new categorical from `codes` into `categories`.
    ///
    /// # Errors
    /// Returns [`ContainerError::InvalidCategorical`] if a code is out of range or the categories are not unique.
    pub fn new(codes: Vec<i32>, categories: Vec<String>, ordered: bool) -> Result<Self, ContainerError> {
        let unique: BTreeSet<&String> = categories.iter().collect();
        if unique.len() != categories.len() {
            return Err(ContainerError::InvalidCategorical(
                "categories are not unique".to_string(),
            ));
        }
        let num_categories = i64::try_from(categories.len()).unwrap_or(i64::MAX);
        if let Some(code) = codes
            .iter()
            .find(|&&code| code < -1 || i64::from(code) >= num_categories)
        {
            return Err(ContainerError::InvalidCategorical(format!(
                "code {code} is out of range for {num_categories} categories"
            )));
        }
        Ok(Self {
            codes,
            categories,
            ordered,
        })
    }

    /// Create an unordered categorical from `values`, with the sorted distinct values as categories.
    #[must_use]
    pub fn from_values(values: &[String]) -> Self {
        let categories: Vec<String> = values
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        let lookup: HashMap<&str, i32> = categories
            .iter()
            .zip(0..)
            .map(|(category, code)| (category.as_str(), code))
            .collect();
        let codes = values
            .iter()
            .map(|value| lookup.get(value.as_str()).copied().unwrap_or(-1))
            .collect();
        Self {
            codes,
            categories,
            ordered: false,
        }
    }

    /// Returns the codes.
    #[must_use]
    pub fn codes(&self) -> &[i32] {
        &self.codes
    }

    /// Returns the categories.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Returns true if the categories are ordered.
    #[must_use]
    pub fn ordered(&self) -> bool {
        self.ordered
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns true if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Returns the value of each element, or [`None`] if it is missing.
    pub fn values(&self) -> impl Iterator<Item = Option<&str>> {
        self.codes.iter().map(|&code| {
            usize::try_from(code)
                .ok()
                .and_then(|code| self.categories.get(code))
                .map(String::as_str)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorical_from_values() {
        let values: Vec<String> = ["b", "a", "b", "c"].map(String::from).to_vec();
        let categorical = Categorical::from_values(&values);
        assert_eq!(categorical.categories(), ["a", "b", "c"]);
        assert_eq!(categorical.codes(), [1, 0, 1, 2]);
        assert!(!categorical.ordered());
        assert_eq!(
            categorical.values().collect::<Vec<_>>(),
            [Some("b"), Some("a"), Some("b"), Some("c")]
        );
    }

    #[test]
    fn categorical_invalid() {
        let categories = vec!["a".to_string(), "b".to_string()];
        assert!(Categorical::new(vec![0, 1, -1], categories.clone(), true).is_ok());
        assert!(Categorical::new(vec![2], categories.clone(), false).is_err());
        assert!(Categorical::new(vec![-2], categories, false).is_err());
        assert!(Categorical::new(vec![], vec!["a".to_string(), "a".to_string()], false).is_err());
    }
}
