//! token substitution for raw configuration text
//!
//! Tokens are written as `{token_name}` where the name is an identifier
//! (`[A-Za-z_][A-Za-z0-9_]*`). Substitution is a single left-to-right pass: replacement values are
//! copied into the output as-is and never scanned again, so a value that itself looks like a token
//! stays literal. Braces that do not enclose a known token are copied verbatim, which keeps
//! yaml/json/hcl syntax intact.
use crate::discovery::ConfigDocument;
use crate::rendered_config::{self, MissingFieldError, ParseError, ParseFailure, RenderedConfig};
use indexmap::IndexMap;
use std::path::PathBuf;

/// Placeholder token -> replacement value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionMap {
    tokens: IndexMap<String, String>,
}

impl SubstitutionMap {
    /// Adds a token. Returns the previous value if the token was already known.
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.tokens.insert(token.into(), value.into())
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubstitutionMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            tokens: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Replace every known `{token}` in `raw`
#[tracing::instrument(level = "trace", skip_all)]
pub fn substitute(raw: &str, substitutions: &SubstitutionMap) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        let token = after_open
            .find('}')
            .map(|close| &after_open[..close])
            .filter(|candidate| is_token_name(candidate));

        let Some(token) = token else {
            output.push('{');
            rest = after_open;
            continue;
        };

        match substitutions.get(token) {
            Some(value) => output.push_str(value),
            None => {
                tracing::warn!(token, "unknown substitution token left in place");
                output.push('{');
                output.push_str(token);
                output.push('}');
            }
        }

        rest = &after_open[token.len() + 1..];
    }

    output.push_str(rest);
    output
}

/// Substitute tokens in a document and parse the result
pub fn render(
    document: &ConfigDocument,
    substitutions: &SubstitutionMap,
) -> Result<RenderedConfig, RenderError> {
    let text = substitute(&document.raw_content, substitutions);

    rendered_config::parse(&document.path, &text).map_err(|failure| match failure {
        ParseFailure::Malformed(source) => RenderError::Malformed {
            path: document.path.clone(),
            source,
        },
        ParseFailure::MissingField(missing) => RenderError::MissingField(missing),
    })
}

fn is_token_name(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Malformed document {} after substitution", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),
}
