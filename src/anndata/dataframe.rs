use crate::elem::Elem;

use super::{Categorical, ContainerError};

/// The default name of the index of a [`DataFrame`].
pub const DEFAULT_INDEX_NAME: &str = "_index";

/// A table of one dimensional columns with a string row index.
///
/// Columns are [`Elem::Array`], [`Elem::StringArray`], or [`Elem::Categorical`] elements with one element per row, and are kept in insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct DataFrame {
    index_name: String,
    index: Vec<String>,
    columns: Vec<(String, Elem)>,
}

impl Default for DataFrame {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DataFrame {
    /// Create a data frame with a row `index` and no columns.
    #[must_use]
    pub fn new(index: Vec<String>) -> Self {
        Self {
            index_name: DEFAULT_INDEX_NAME.to_string(),
            index,
            columns: Vec::new(),
        }
    }

    /// Create a data frame with `n_rows` rows indexed `"0"`, `"1"`, ….
    #[must_use]
    pub fn with_default_index(n_rows: u64) -> Self {
        Self::new((0..n_rows).map(|row| row.to_string()).collect())
    }

    /// Set the name of the index.
    #[must_use]
    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    /// Returns the name of the index.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Returns the row index.
    #[must_use]
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> u64 {
        self.index.len() as u64
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the data frame has no rows and no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() && self.columns.is_empty()
    }

    /// Returns the columns.
    #[must_use]
    pub fn columns(&self) -> &[(String, Elem)] {
        &self.columns
    }

    /// Returns the column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the column `name`.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Elem> {
        self.columns
            .iter()
            .find_map(|(column, elem)| (column == name).then_some(elem))
    }

    /// Add the column `name`, or replace it if it exists.
    ///
    /// Returns the replaced column.
    ///
    /// # Errors
    /// Returns [`ContainerError::InvalidColumn`] if the column is named like the index, is not a one dimensional array, string array, or categorical, or does not have one element per row.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        column: Elem,
    ) -> Result<Option<Elem>, ContainerError> {
        let name = name.into();
        self.validate_column(&name, &column)?;
        if let Some((_, existing)) = self.columns.iter_mut().find(|(column, _)| *column == name) {
            return Ok(Some(std::mem::replace(existing, column)));
        }
        self.columns.push((name, column));
        Ok(None)
    }

    /// Add the column `name`, returning the data frame.
    ///
    /// # Errors
    /// See [`insert_column`](DataFrame::insert_column).
    pub fn with_column(mut self, name: impl Into<String>, column: Elem) -> Result<Self, ContainerError> {
        self.insert_column(name, column)?;
        Ok(self)
    }

    /// Remove the column `name`.
    pub fn remove_column(&mut self, name: &str) -> Option<Elem> {
        let position = self.columns.iter().position(|(column, _)| column == name)?;
        Some(self.columns.remove(position).1)
    }

    fn validate_column(&self, name: &str, column: &Elem) -> Result<(), ContainerError> {
        let invalid = |reason: String| ContainerError::InvalidColumn {
            column: name.to_string(),
            reason,
        };
        if name == self.index_name {
            return Err(invalid("the column has the name of the index".to_string()));
        }
        let len = match column {
            Elem::Array(array) if array.shape().len() == 1 => array.shape()[0],
            Elem::StringArray(strings) => strings.len() as u64,
            Elem::Categorical(categorical) => categorical.len() as u64,
            elem => {
                return Err(invalid(format!(
                    "a {} element is not a one dimensional column",
                    elem.encoding_type()
                )))
            }
        };
        if len != self.n_rows() {
            return Err(invalid(format!(
                "the column has {len} elements, expected {}",
                self.n_rows()
            )));
        }
        Ok(())
    }

    /// Convert every string column with fewer distinct values than rows into a categorical with sorted categories.
    pub fn strings_to_categoricals(&mut self) {
        for (name, column) in &mut self.columns {
            let Elem::StringArray(values) = column else {
                continue;
            };
            let categorical = Categorical::from_values(values);
            if categorical.categories().len() < values.len() {
                tracing::debug!(
                    "converting column {name} to a categorical with {} categories",
                    categorical.categories().len()
                );
                *column = Elem::Categorical(categorical);
            }
        }
    }
}
