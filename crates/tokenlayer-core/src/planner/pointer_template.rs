use crate::error::PipelineError;
use crate::pointer::JsonPointer;

/// Context available for expanding a source's pointer template.
#[derive(Clone, Debug, Default)]
pub struct PointerTemplateContext {
    pub relative: Option<String>,
    pub basename: Option<String>,
    pub stem: Option<String>,
    pub source: Option<String>,
}

/// Expands a template of literal segments plus `{relative, basename, stem, source}`
/// placeholders into a normalized [`JsonPointer`].
///
/// Fails with [`PipelineError::PointerTemplate`] naming the missing placeholder when the
/// context lacks a value a placeholder requires.
pub fn resolve_pointer_template(
    template: &str,
    context: &PointerTemplateContext,
) -> Result<JsonPointer, PipelineError> {
    let mut expanded = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '{' {
            expanded.push(c);
            continue;
        }

        let mut placeholder = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            placeholder.push(c);
        }
        if !closed {
            return Err(PipelineError::PointerTemplate {
                template: template.to_string(),
                placeholder: placeholder.clone(),
            });
        }

        let value = match placeholder.as_str() {
            "relative" => context.relative.as_deref(),
            "basename" => context.basename.as_deref(),
            "stem" => context.stem.as_deref(),
            "source" => context.source.as_deref(),
            other => {
                return Err(PipelineError::PointerTemplate {
                    template: template.to_string(),
                    placeholder: other.to_string(),
                });
            }
        };

        let Some(value) = value else {
            return Err(PipelineError::PointerTemplate {
                template: template.to_string(),
                placeholder,
            });
        };

        expanded.push_str(value);
    }

    let segments: Vec<&str> = expanded
        .split('/')
        .map(|segment| segment.trim())
        .filter(|segment| !segment.is_empty())
        .collect();

    Ok(JsonPointer::from_segments(segments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_static_and_placeholder_segments() {
        let context = PointerTemplateContext {
            stem: Some("spacing".into()),
            source: Some("base".into()),
            ..Default::default()
        };
        let pointer = resolve_pointer_template("tokens/{source}/{stem}", &context).unwrap();
        assert_eq!(pointer.as_str(), "/tokens/base/spacing");
    }

    #[test]
    fn fails_naming_the_missing_placeholder() {
        let context = PointerTemplateContext::default();
        let err = resolve_pointer_template("tokens/{stem}", &context).unwrap_err();
        match err {
            PipelineError::PointerTemplate { placeholder, .. } => {
                assert_eq!(placeholder, "stem");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_placeholder_names() {
        let context = PointerTemplateContext::default();
        let err = resolve_pointer_template("tokens/{unknown}", &context).unwrap_err();
        assert!(matches!(err, PipelineError::PointerTemplate { .. }));
    }
}
