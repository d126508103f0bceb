use std::fmt;

/// Selector strategies understood by every backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
    ClassName(String),
    Name(String),
    TagName(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn class_name(class: impl Into<String>) -> Self {
        Locator::ClassName(class.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Locator::Name(name.into())
    }

    pub fn tag_name(tag: impl Into<String>) -> Self {
        Locator::TagName(tag.into())
    }

    /// CSS form of the locator, if one exists.
    ///
    /// Drivers without native support for a strategy fall back to this.
    pub fn as_css(&self) -> Option<String> {
        match self {
            Locator::Css(s) => Some(s.clone()),
            Locator::Id(id) => Some(format!("[id='{}']", id)),
            Locator::ClassName(class) => Some(format!(".{}", class)),
            Locator::Name(name) => Some(format!("[name='{}']", name)),
            Locator::TagName(tag) => Some(tag.clone()),
            Locator::XPath(_) => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{}`", s),
            Locator::XPath(s) => write!(f, "xpath `{}`", s),
            Locator::Id(s) => write!(f, "id `{}`", s),
            Locator::ClassName(s) => write!(f, "class `{}`", s),
            Locator::Name(s) => write!(f, "name `{}`", s),
            Locator::TagName(s) => write!(f, "tag `{}`", s),
        }
    }
}

/// A live element handle returned by a backend lookup.
///
/// `id` is only meaningful to the backend that produced it and becomes stale
/// once the page navigates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
    pub status: u16, // generic status code (e.g. 200)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}
