//! Nut types
//!
//! Maps file extensions to the kind of resource a nut holds.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Kind of web resource held by a nut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NutType {
    /// HTML page
    Html,
    /// Embedded OpenType font
    Eot,
    /// OpenType font
    Otf,
    /// TrueType font
    Ttf,
    /// WOFF font
    Woff,
    /// WOFF2 font
    Woff2,
    /// SVG image
    Svg,
    /// Icon
    Ico,
    /// PNG image
    Png,
    /// JPEG image
    Jpg,
    /// GIF image
    Gif,
    /// Javascript
    Javascript,
    /// Stylesheet
    Css,
    /// Typescript source
    Typescript,
    /// JSX source
    Jsx,
    /// LESS stylesheet
    Less,
    /// Source map
    Map,
    /// HTML5 application cache manifest
    AppCache,
}

/// How browsers should load a given type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlHint {
    /// `<img>`-like resource
    Image,
    /// Font resource
    Font,
    /// `<script>` resource
    Script,
    /// `<link rel="stylesheet">` resource
    Stylesheet,
    /// Document
    Html,
}

impl NutType {
    /// Every known type
    pub const ALL: [NutType; 18] = [
        Self::Html,
        Self::Eot,
        Self::Otf,
        Self::Ttf,
        Self::Woff,
        Self::Woff2,
        Self::Svg,
        Self::Ico,
        Self::Png,
        Self::Jpg,
        Self::Gif,
        Self::Javascript,
        Self::Css,
        Self::Typescript,
        Self::Jsx,
        Self::Less,
        Self::Map,
        Self::AppCache,
    ];

    /// Extensions (with leading dot) mapped to this type
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Html => &[".html"],
            Self::Eot => &[".eot"],
            Self::Otf => &[".otf"],
            Self::Ttf => &[".ttf"],
            Self::Woff => &[".woff"],
            Self::Woff2 => &[".woff2"],
            Self::Svg => &[".svg"],
            Self::Ico => &[".ico"],
            Self::Png => &[".png"],
            Self::Jpg => &[".jpg", ".jpeg"],
            Self::Gif => &[".gif"],
            Self::Javascript => &[".js"],
            Self::Css => &[".css"],
            Self::Typescript => &[".ts"],
            Self::Jsx => &[".jsx"],
            Self::Less => &[".less"],
            Self::Map => &[".map"],
            Self::AppCache => &[".appcache"],
        }
    }

    /// MIME type served for this type
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Html => "text/html",
            Self::Eot => "application/vnd.ms-fontobject",
            Self::Otf => "font/opentype",
            Self::Ttf => "application/octet-stream",
            Self::Woff => "application/x-font-woff",
            Self::Woff2 => "application/font-woff2",
            Self::Svg => "image/svg+xml",
            Self::Ico => "image/x-icon",
            Self::Png => "image/png",
            Self::Jpg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Javascript => "text/javascript",
            Self::Css | Self::Less => "text/css",
            Self::Typescript => "text/x.typescript",
            Self::Jsx => "text/jsx",
            Self::Map => "application/json",
            Self::AppCache => "text/cache-manifest",
        }
    }

    /// Whether the content is text
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(
            self,
            Self::Html
                | Self::Svg
                | Self::Javascript
                | Self::Css
                | Self::Typescript
                | Self::Jsx
                | Self::Less
                | Self::Map
                | Self::AppCache
        )
    }

    /// Loading hint, if the type is directly loadable by a page
    #[must_use]
    pub const fn hint(self) -> Option<HtmlHint> {
        match self {
            Self::Svg | Self::Ico | Self::Png | Self::Jpg | Self::Gif => Some(HtmlHint::Image),
            Self::Eot | Self::Otf | Self::Ttf | Self::Woff | Self::Woff2 => Some(HtmlHint::Font),
            Self::Javascript => Some(HtmlHint::Script),
            Self::Css => Some(HtmlHint::Stylesheet),
            Self::Html => Some(HtmlHint::Html),
            Self::Typescript | Self::Jsx | Self::Less | Self::Map | Self::AppCache => None,
        }
    }

    /// Resolve a type from an extension, with or without the leading dot
    ///
    /// Text extensions are matched exactly; binary extensions also accept
    /// upper-case spellings (`.PNG`, `.JPEG`).
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let dotted = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{extension}")
        };

        Self::ALL.into_iter().find(|t| {
            t.extensions().iter().any(|ext| {
                *ext == dotted || (!t.is_text() && ext.eq_ignore_ascii_case(&dotted))
            })
        })
    }

    /// Resolve a type from the extension of a path
    #[must_use]
    pub fn for_path(path: &str) -> Option<Self> {
        let file = path.rsplit('/').next().unwrap_or(path);
        let dot = file.rfind('.')?;
        Self::from_extension(&file[dot..])
    }

    /// Primary extension (with leading dot)
    #[must_use]
    pub fn primary_extension(self) -> &'static str {
        self.extensions()[0]
    }
}

impl Display for NutType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary_extension().trim_start_matches('.').to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_common_extensions() {
        assert_eq!(NutType::from_extension(".js"), Some(NutType::Javascript));
        assert_eq!(NutType::from_extension("css"), Some(NutType::Css));
        assert_eq!(NutType::from_extension(".jpeg"), Some(NutType::Jpg));
        assert_eq!(NutType::from_extension(".woff2"), Some(NutType::Woff2));
        assert_eq!(NutType::from_extension(".unknown"), None);
    }

    #[test]
    fn binary_extensions_ignore_case_but_text_does_not() {
        assert_eq!(NutType::from_extension(".PNG"), Some(NutType::Png));
        assert_eq!(NutType::from_extension(".JS"), None);
    }

    #[test]
    fn path_resolution_uses_last_segment() {
        assert_eq!(NutType::for_path("css/foo.js"), Some(NutType::Javascript));
        assert_eq!(NutType::for_path("img.d/sprite.png"), Some(NutType::Png));
        assert_eq!(NutType::for_path("no-extension"), None);
        assert_eq!(NutType::for_path("dir.css/file"), None);
    }

    #[test]
    fn mime_and_text_flags() {
        assert_eq!(NutType::Less.mime_type(), "text/css");
        assert!(NutType::Svg.is_text());
        assert!(!NutType::Gif.is_text());
        assert_eq!(NutType::Css.hint(), Some(HtmlHint::Stylesheet));
        assert_eq!(NutType::Map.hint(), None);
    }

    #[test]
    fn every_type_has_an_extension_that_resolves_back() {
        for t in NutType::ALL {
            assert_eq!(NutType::from_extension(t.primary_extension()), Some(t));
        }
    }

    #[test]
    fn display_uses_extension_name() {
        assert_eq!(NutType::Javascript.to_string(), "JS");
        assert_eq!(NutType::AppCache.to_string(), "APPCACHE");
    }
}
