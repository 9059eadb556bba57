use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while building the scope registry.
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// A node in the hierarchical geographic taxonomy.
#[derive(Debug, Clone, Deserialize)]
pub struct Scope {
    pub id: i64,
    pub code: String,
    pub name: String,
    /// Parent scope code; `None` for top-level scopes.
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScopeFile {
    scopes: Vec<Scope>,
}

/// Immutable scope lookup table, built once at startup.
#[derive(Debug)]
pub struct ScopeRegistry {
    scopes: Vec<Scope>,
    by_id: HashMap<i64, usize>,
    by_code: HashMap<String, usize>,
}

impl ScopeRegistry {
    /// Build from a YAML scope file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScopeError> {
        let content = fs::read_to_string(path)?;
        let file: ScopeFile = serde_yaml::from_str(&content)?;
        Self::from_scopes(file.scopes)
    }

    /// Minimal registry with only the local country root. Used when no
    /// scope file is configured.
    pub fn default_local(local_code: &str) -> Self {
        Self::from_scopes(vec![Scope {
            id: 1,
            code: local_code.to_string(),
            name: local_code.to_string(),
            parent: None,
        }])
        .expect("single-scope registry is always valid")
    }

    pub fn from_scopes(scopes: Vec<Scope>) -> Result<Self, ScopeError> {
        let mut by_id = HashMap::with_capacity(scopes.len());
        let mut by_code = HashMap::with_capacity(scopes.len());

        for (idx, scope) in scopes.iter().enumerate() {
            if by_id.insert(scope.id, idx).is_some() {
                return Err(ScopeError::Validation(format!("duplicate scope id {}", scope.id)));
            }
            if by_code.insert(scope.code.clone(), idx).is_some() {
                return Err(ScopeError::Validation(format!(
                    "duplicate scope code {}",
                    scope.code
                )));
            }
        }

        for scope in &scopes {
            if let Some(parent) = &scope.parent {
                if !by_code.contains_key(parent) {
                    return Err(ScopeError::Validation(format!(
                        "scope {} references unknown parent {}",
                        scope.code, parent
                    )));
                }
            }
        }

        Ok(ScopeRegistry { scopes, by_id, by_code })
    }

    pub fn find_by_id(&self, id: i64) -> Option<&Scope> {
        self.by_id.get(&id).map(|&idx| &self.scopes[idx])
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Scope> {
        self.by_code.get(code).map(|&idx| &self.scopes[idx])
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// True when `ancestor` is `scope` itself or appears in its parent
    /// chain. Used to decide whether an address falls inside the local
    /// jurisdiction.
    pub fn ancestor_of(&self, ancestor: &Scope, scope: &Scope) -> bool {
        if ancestor.id == scope.id {
            return true;
        }
        let mut current = scope.parent.as_deref();
        while let Some(code) = current {
            let Some(parent) = self.find_by_code(code) else {
                return false;
            };
            if parent.id == ancestor.id {
                return true;
            }
            current = parent.parent.as_deref();
        }
        false
    }

    /// Contiguous id ranges covering every descendant of `root`, for
    /// callers filtering address pickers by the local subtree.
    pub fn descendant_id_ranges(&self, root: &Scope) -> Vec<(i64, i64)> {
        let mut ids: Vec<i64> = self
            .scopes
            .iter()
            .filter(|s| s.id != root.id && self.ancestor_of(root, s))
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();

        let mut ranges = Vec::new();
        let mut iter = ids.into_iter();
        let Some(first) = iter.next() else {
            return ranges;
        };

        let mut start = first;
        let mut prev = first;
        for id in iter {
            if id != prev + 1 {
                ranges.push((start, prev));
                start = id;
            }
            prev = id;
        }
        ranges.push((start, prev));
        ranges
    }
}
