//! Archive filename rendering and sanitization.

use super::TemplateError;

/// Values substituted into a filename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameParts {
    /// Series title (`{Series}`).
    pub series: String,
    /// Chapter number or range label (`{Number}`).
    pub number: String,
    /// Chapter title (`{Title}`).
    pub title: String,
}

impl FilenameParts {
    /// Builds sanitized parts; the title also gets its whitespace collapsed.
    #[must_use]
    pub fn new(series: &str, number: &str, title: &str) -> Self {
        Self {
            series: sanitize_filename(series.trim()),
            number: sanitize_filename(number.trim()),
            title: sanitize_filename(&title.split_whitespace().collect::<Vec<_>>().join(" ")),
        }
    }
}

/// Renders `template`, replacing `{Series}`, `{Number}` and `{Title}`.
///
/// # Errors
///
/// Returns [`TemplateError`] for unknown or unclosed placeholders, or when
/// the result is empty.
pub fn render(template: &str, parts: &FilenameParts) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return Err(TemplateError::Unclosed {
                template: template.to_string(),
            });
        };
        let value = match &after[..close] {
            "Series" => &parts.series,
            "Number" => &parts.number,
            "Title" => &parts.title,
            other => {
                return Err(TemplateError::UnknownPlaceholder {
                    name: other.to_string(),
                    template: template.to_string(),
                });
            }
        };
        out.push_str(value);
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    let out = out.trim().to_string();
    if out.is_empty() {
        return Err(TemplateError::Empty {
            template: template.to_string(),
        });
    }
    Ok(out)
}

/// Formats a chapter number: integral values without decimals (`10`),
/// fractional ones with one decimal (`10.5`).
#[must_use]
pub fn format_chapter_number(number: f64) -> String {
    let formatted = format!("{number:.1}");
    match formatted.strip_suffix(".0") {
        Some(integral) => integral.to_string(),
        None => formatted,
    }
}

/// Replaces characters that break paths on common filesystems.
///
/// `/` and `\` become `_`, `:` becomes `;`, `?` becomes `¿`, `"` becomes `'`;
/// control characters become `_`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            ':' => ';',
            '?' => '¿',
            '"' => '\'',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FILENAME_TEMPLATE;

    #[test]
    fn test_render_default_template() {
        let parts = FilenameParts::new("One Piece", "10", "Romance  Dawn\n");
        assert_eq!(
            render(DEFAULT_FILENAME_TEMPLATE, &parts).unwrap(),
            "One Piece 10 - Romance Dawn"
        );
    }

    #[test]
    fn test_render_unknown_placeholder() {
        let parts = FilenameParts::new("S", "1", "T");
        let err = render("{Series} {Volume}", &parts).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownPlaceholder { ref name, .. } if name == "Volume"));
    }

    #[test]
    fn test_render_unclosed_placeholder() {
        let parts = FilenameParts::new("S", "1", "T");
        assert!(matches!(
            render("{Series", &parts).unwrap_err(),
            TemplateError::Unclosed { .. }
        ));
    }

    #[test]
    fn test_render_empty_result() {
        let parts = FilenameParts::new("", "", "");
        assert!(matches!(render("{Title}", &parts).unwrap_err(), TemplateError::Empty { .. }));
    }

    #[test]
    fn test_format_chapter_number() {
        assert_eq!(format_chapter_number(10.0), "10");
        assert_eq!(format_chapter_number(10.5), "10.5");
        assert_eq!(format_chapter_number(0.0), "0");
        assert_eq!(format_chapter_number(100.0), "100");
    }

    #[test]
    fn test_sanitize_filename_replacements() {
        assert_eq!(
            sanitize_filename(r#"a/b\c:d?e"f"#),
            "a_b_c;d¿e'f"
        );
    }

    #[test]
    fn test_parts_sanitize_every_component() {
        let parts = FilenameParts::new("Fate/Zero", "1", "Who?");
        assert_eq!(parts.series, "Fate_Zero");
        assert_eq!(parts.title, "Who¿");
    }
}
