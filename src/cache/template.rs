//! Route templates with `{name}` placeholders.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use super::keys::normalize_uri;

/// Named path parameters captured from a concrete request path.
pub type PathParams = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("route template `{template}` must start with `/`")]
    NotAbsolute { template: String },
    #[error("route template `{template}` has an unbalanced placeholder")]
    Unbalanced { template: String },
    #[error("route template `{template}` repeats placeholder `{name}`")]
    DuplicatePlaceholder { template: String, name: String },
    #[error("route template `{template}` requires parameter `{name}`")]
    MissingParameter { template: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed path template such as `/v1/post/{post_id}/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl RouteTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if !raw.starts_with('/') {
            return Err(TemplateError::NotAbsolute {
                template: raw.to_string(),
            });
        }

        let mut segments = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        for part in normalize_uri(raw).split('/').skip(1) {
            let opens = part.matches('{').count();
            let closes = part.matches('}').count();
            if opens != closes || opens > 1 {
                return Err(TemplateError::Unbalanced {
                    template: raw.to_string(),
                });
            }
            if opens == 1 {
                let name = part
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| TemplateError::Unbalanced {
                        template: raw.to_string(),
                    })?;
                if seen.contains(&name) {
                    return Err(TemplateError::DuplicatePlaceholder {
                        template: raw.to_string(),
                        name: name.to_string(),
                    });
                }
                seen.push(name);
                segments.push(Segment::Placeholder(name.to_string()));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            trailing_slash: raw.len() > 1 && raw.ends_with('/'),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in declaration order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute `params` into the template.
    ///
    /// Extra parameters are ignored; a missing one is an error.
    pub fn render(&self, params: &PathParams) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value =
                        params
                            .get(name)
                            .ok_or_else(|| TemplateError::MissingParameter {
                                template: self.raw.clone(),
                                name: name.clone(),
                            })?;
                    out.push_str(value);
                }
            }
        }
        if self.trailing_slash || out.is_empty() {
            out.push('/');
        }
        Ok(out)
    }

    /// Capture placeholder values from a concrete path, ignoring a trailing `/`.
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let mut parts = normalize_uri(path).split('/').skip(1);
        let mut params = PathParams::new();
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(text) if text == part => {}
                Segment::Literal(_) => return None,
                Segment::Placeholder(_) if part.is_empty() => return None,
                Segment::Placeholder(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
