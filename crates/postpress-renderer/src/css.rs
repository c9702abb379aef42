//! Stylesheet generation for the class-based highlighter output.
//!
//! Highlighted blocks carry `syntax-` prefixed classes rather than inline
//! styles, so each theme needs one generated stylesheet. The CLI emits these
//! for the site to serve.

use crate::{CSS_PREFIX, RenderError, Theme};
use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, css_for_theme_with_class_style};

/// Stylesheet for a single theme.
pub fn stylesheet(theme: Theme) -> Result<String, RenderError> {
    let themes = ThemeSet::load_defaults();
    let name = theme.syntect_name();
    let syntect_theme = themes
        .themes
        .get(name)
        .ok_or_else(|| RenderError::ThemeUnavailable(name.to_owned()))?;
    Ok(css_for_theme_with_class_style(
        syntect_theme,
        ClassStyle::SpacedPrefixed { prefix: CSS_PREFIX },
    )?)
}

/// Both themes combined: light as the default, dark behind a
/// `prefers-color-scheme` media query.
pub fn combined_stylesheet() -> Result<String, RenderError> {
    let light = stylesheet(Theme::Light)?;
    let dark = stylesheet(Theme::Dark)?;

    let mut out = String::new();
    out.push_str("/* Syntax highlighting - Light Mode (default) */\n");
    out.push_str(&light);
    out.push_str("\n\n/* Syntax highlighting - Dark Mode */\n");
    out.push_str("@media (prefers-color-scheme: dark) {\n");
    out.push_str(&dark);
    out.push_str("}\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheets_target_prefixed_classes() {
        let css = stylesheet(Theme::Light).unwrap();
        assert!(css.contains(".syntax-"));
    }

    #[test]
    fn themes_generate_distinct_stylesheets() {
        let light = stylesheet(Theme::Light).unwrap();
        let dark = stylesheet(Theme::Dark).unwrap();
        assert_ne!(light, dark);
    }

    #[test]
    fn combined_stylesheet_scopes_dark_behind_media_query() {
        let css = combined_stylesheet().unwrap();
        assert!(css.contains("@media (prefers-color-scheme: dark)"));
        let light = stylesheet(Theme::Light).unwrap();
        assert!(css.contains(&light));
    }
}
