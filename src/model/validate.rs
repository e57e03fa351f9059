use crate::error::ValidatorError;
use crate::value::{get_path, Map};

use super::Model;

/// Which declared paths `validate` looks at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PathSelection {
    #[default]
    All,
    Paths(Vec<String>),
}

impl From<&str> for PathSelection {
    /// Space separated list of paths.
    fn from(paths: &str) -> Self {
        PathSelection::Paths(paths.split_whitespace().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for PathSelection {
    fn from(paths: Vec<String>) -> Self {
        PathSelection::Paths(paths)
    }
}

impl From<&[&str]> for PathSelection {
    fn from(paths: &[&str]) -> Self {
        PathSelection::Paths(paths.iter().map(|p| p.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PathSelection {
    fn from(paths: [&str; N]) -> Self {
        PathSelection::Paths(paths.iter().map(|p| p.to_string()).collect())
    }
}

impl Model {
    /// Validates every declared path. `None` when everything passes.
    pub fn validate(&self) -> Option<Vec<ValidatorError>> {
        self.validate_paths(PathSelection::All)
    }

    pub fn validate_paths(&self, selection: impl Into<PathSelection>) -> Option<Vec<ValidatorError>> {
        let doc = self.raw();
        self.validate_doc(&doc, selection)
    }

    /// Validates `doc` against this model's schema, with this model as scope.
    pub fn validate_doc(
        &self,
        doc: &Map,
        selection: impl Into<PathSelection>,
    ) -> Option<Vec<ValidatorError>> {
        let schema = self.schema();
        let paths: Vec<String> = match selection.into() {
            PathSelection::All => schema.path_names().to_vec(),
            PathSelection::Paths(paths) => paths,
        };

        let mut errors = Vec::new();
        for path in &paths {
            let Some(ty) = schema.path(path) else {
                log::debug!("{}: skipping validation of undeclared path {}", self.cid(), path);
                continue;
            };
            let value = get_path(doc, path).cloned().unwrap_or_default();
            errors.extend(ty.do_validate(&value, self));
        }

        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }
}
