//! HTML templates
//!
//! Templates are embedded in the binary and parsed once at startup. Each one
//! declares the variables it reads; any declared variable the caller leaves
//! out renders as nil.

use std::collections::HashMap;

use liquid::model::{KString, Value};
use liquid::{Object, ParserBuilder, Template};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown template '{0}'")]
    Unknown(String),
    #[error("template '{name}': {source}")]
    Liquid {
        name: String,
        #[source]
        source: liquid::Error,
    },
}

/// name, source, variables
const SOURCES: &[(&str, &str, &[&str])] = &[
    ("hello.html", include_str!("../../templates/hello.html"), &["name"]),
    ("login.html", include_str!("../../templates/login.html"), &["error"]),
    ("upload_file.html", include_str!("../../templates/upload_file.html"), &["saved"]),
    ("color.html", include_str!("../../templates/color.html"), &["color_name", "form_url"]),
    ("be_a_color.html", include_str!("../../templates/be_a_color.html"), &[]),
    ("candie.html", include_str!("../../templates/candie.html"), &[]),
    ("not_acceptable.html", include_str!("../../templates/not_acceptable.html"), &["form_url"]),
];

/// Text interpolated into plain replies goes through the same filter
const ESCAPE_SOURCE: &str = "{{ text | escape }}";

struct Compiled {
    template: Template,
    variables: &'static [&'static str],
}

pub struct Templates {
    compiled: HashMap<&'static str, Compiled>,
    escaper: Template,
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort();
        f.debug_struct("Templates").field("names", &names).finish()
    }
}

impl Templates {
    /// Parse every embedded template
    pub fn load() -> Result<Self, TemplateError> {
        let parser = ParserBuilder::with_stdlib().build().map_err(|source| TemplateError::Liquid {
            name: "<parser>".to_string(),
            source,
        })?;

        let mut compiled = HashMap::with_capacity(SOURCES.len());
        for &(name, source, variables) in SOURCES {
            let template = parser.parse(source).map_err(|source| TemplateError::Liquid {
                name: name.to_string(),
                source,
            })?;
            compiled.insert(name, Compiled { template, variables });
        }
        let escaper = parser.parse(ESCAPE_SOURCE).map_err(|source| TemplateError::Liquid {
            name: "<escape>".to_string(),
            source,
        })?;
        Ok(Self { compiled, escaper })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.compiled.keys().copied()
    }

    /// HTML-escape `raw` with liquid's `escape` filter
    pub fn escape(&self, raw: &str) -> Result<String, TemplateError> {
        let mut globals = Object::new();
        globals.insert(KString::from_static("text"), Value::scalar(raw.to_string()));
        self.escaper.render(&globals).map_err(|source| TemplateError::Liquid {
            name: "<escape>".to_string(),
            source,
        })
    }

    /// Render `name` with the given string variables
    pub fn render(&self, name: &str, vars: &[(&str, Option<&str>)]) -> Result<String, TemplateError> {
        let compiled = self
            .compiled
            .get(name)
            .ok_or_else(|| TemplateError::Unknown(name.to_string()))?;

        let mut globals = Object::new();
        for variable in compiled.variables {
            globals.insert(KString::from_static(*variable), Value::Nil);
        }
        for (key, value) in vars {
            let value = value.map_or(Value::Nil, |v| Value::scalar(v.to_string()));
            globals.insert(KString::from_ref(key), value);
        }

        compiled
            .template
            .render(&globals)
            .map_err(|source| TemplateError::Liquid {
                name: name.to_string(),
                source,
            })
    }
}
