//! Route template parsing.
//!
//! A template such as `/users/{id}/posts` is split into alternating static and wildcard
//! segments: `Static("/users/")`, `Wildcard("id")`, `Static("/posts")`. A wildcard always covers
//! a whole path component.

/// One piece of a parsed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Static(&'a str),
    Wildcard(&'a str),
}

/// Why a template was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TemplateError {
    Empty,
    MissingLeadingSlash,
    /// A brace that does not enclose a whole path component, like `/user{id}`.
    PartialWildcard,
    /// `{}` or a name containing a brace.
    InvalidWildcardName,
}

impl TemplateError {
    pub(crate) fn reason(self) -> &'static str {
        match self {
            Self::Empty => "template is empty",
            Self::MissingLeadingSlash => "template must start with '/'",
            Self::PartialWildcard => "a wildcard must span a whole path segment",
            Self::InvalidWildcardName => "wildcard names must be non-empty and free of braces",
        }
    }
}

pub(crate) fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    if template.is_empty() {
        return Err(TemplateError::Empty);
    }
    if !template.starts_with('/') {
        return Err(TemplateError::MissingLeadingSlash);
    }

    let mut segments = Vec::new();
    let mut static_start = 0;
    // byte offset of the current component, just past its leading '/'
    let mut offset = 1;

    for component in template[1..].split('/') {
        if let Some(name) = component.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
            if name.is_empty() || name.contains(['{', '}']) {
                return Err(TemplateError::InvalidWildcardName);
            }
            if static_start < offset {
                segments.push(Segment::Static(&template[static_start..offset]));
            }
            segments.push(Segment::Wildcard(name));
            static_start = offset + component.len();
        } else if component.contains(['{', '}']) {
            return Err(TemplateError::PartialWildcard);
        }
        offset += component.len() + 1;
    }

    if static_start < template.len() {
        segments.push(Segment::Static(&template[static_start..]));
    }
    Ok(segments)
}
