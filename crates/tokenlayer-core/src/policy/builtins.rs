use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::token::TokenType;

use super::rule::{PolicyFactoryContext, PolicyHandler, PolicyInput, PolicyRule};
use super::violation::{PolicyViolation, Severity};

/// Extension namespace governance metadata (owner, and similar fields other rules may
/// add later) is nested under (§8 scenario 5).
const GOVERNANCE_NAMESPACE: &str = "net.lapidist.governance";

/// Requires every snapshot to carry a non-empty `owner` field in its
/// `net.lapidist.governance` extension (§4.7 built-in templates, §8 scenario 5).
/// Options: `{ severity?: "error" | "warning" | "info" }`, defaulting to `error`.
pub fn require_owner_extension(options: &JsonValue, _context: &PolicyFactoryContext) -> PolicyRule {
    let severity = severity_option(options, Severity::Error);
    PolicyRule::new("require-owner", move |_options: &JsonValue| {
        let severity = severity;
        Arc::new(move |input: &PolicyInput| -> Vec<PolicyViolation> {
            let has_owner = input
                .snapshot
                .metadata
                .as_ref()
                .and_then(|m| m.extensions.get(GOVERNANCE_NAMESPACE))
                .and_then(|governance| governance.get("owner"))
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if has_owner {
                Vec::new()
            } else {
                vec![PolicyViolation {
                    policy: "require-owner".to_string(),
                    pointer: input.snapshot.pointer.clone(),
                    severity,
                    message: format!("token is missing \"{GOVERNANCE_NAMESPACE}\".owner"),
                    details: None,
                }]
            }
        }) as Arc<dyn PolicyHandler>
    })
}

#[derive(Deserialize, Default)]
struct RequireTagOptions {
    tag: Option<String>,
    #[serde(default)]
    severity: Option<String>,
}

/// Requires every snapshot to carry a specific tag. Options: `{ tag, severity? }`.
pub fn require_tag(options: &JsonValue, _context: &PolicyFactoryContext) -> PolicyRule {
    let parsed: RequireTagOptions = serde_json::from_value(options.clone()).unwrap_or_default();
    let severity = parse_severity(parsed.severity.as_deref()).unwrap_or(Severity::Warning);
    let tag = parsed.tag.unwrap_or_default();

    PolicyRule::new("require-tag", move |_options: &JsonValue| {
        let severity = severity;
        let tag = tag.clone();
        Arc::new(move |input: &PolicyInput| -> Vec<PolicyViolation> {
            let has_tag = input
                .snapshot
                .metadata
                .as_ref()
                .and_then(|m| m.tags.as_ref())
                .map(|tags| tags.iter().any(|t| t == &tag))
                .unwrap_or(false);
            if tag.is_empty() || has_tag {
                Vec::new()
            } else {
                vec![PolicyViolation {
                    policy: "require-tag".to_string(),
                    pointer: input.snapshot.pointer.clone(),
                    severity,
                    message: format!("token is missing required tag \"{tag}\""),
                    details: None,
                }]
            }
        }) as Arc<dyn PolicyHandler>
    })
}

/// Requires a `replacement` extension on every deprecated token, so consumers have a
/// migration path (§4.7 built-in templates: deprecation replacement).
pub fn deprecation_replacement(_options: &JsonValue, _context: &PolicyFactoryContext) -> PolicyRule {
    PolicyRule::new("deprecation-replacement", move |_options: &JsonValue| {
        Arc::new(move |input: &PolicyInput| -> Vec<PolicyViolation> {
            let metadata = match &input.snapshot.metadata {
                Some(metadata) => metadata,
                None => return Vec::new(),
            };
            if metadata.deprecated != Some(true) {
                return Vec::new();
            }
            let has_replacement = metadata
                .extensions
                .get("replacement")
                .map(|v| !v.is_null())
                .unwrap_or(false);
            if has_replacement {
                Vec::new()
            } else {
                vec![PolicyViolation {
                    policy: "deprecation-replacement".to_string(),
                    pointer: input.snapshot.pointer.clone(),
                    severity: Severity::Error,
                    message: "deprecated token has no \"replacement\" extension".to_string(),
                    details: None,
                }]
            }
        }) as Arc<dyn PolicyHandler>
    })
}

/// Requires an override (a token whose provenance layer index is beyond the base layer)
/// to be accompanied by an `overrideApproved` context flag (§4.7 built-in templates:
/// require-override-approval).
pub fn require_override_approval(_options: &JsonValue, _context: &PolicyFactoryContext) -> PolicyRule {
    PolicyRule::new("require-override-approval", move |_options: &JsonValue| {
        Arc::new(move |input: &PolicyInput| -> Vec<PolicyViolation> {
            if input.snapshot.provenance.layer_index == 0 {
                return Vec::new();
            }
            let approved = input
                .context
                .get("overrideApproved")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            if approved {
                Vec::new()
            } else {
                vec![PolicyViolation {
                    policy: "require-override-approval".to_string(),
                    pointer: input.snapshot.pointer.clone(),
                    severity: Severity::Error,
                    message: format!(
                        "override from layer \"{}\" is missing approval",
                        input.snapshot.provenance.layer
                    ),
                    details: None,
                }]
            }
        }) as Arc<dyn PolicyHandler>
    })
}

#[derive(Deserialize)]
struct ContrastOptions {
    #[serde(default = "default_background")]
    background: String,
    #[serde(default = "default_minimum_ratio")]
    minimum_ratio: f64,
}

fn default_background() -> String {
    "#ffffff".to_string()
}

fn default_minimum_ratio() -> f64 {
    4.5
}

/// Checks every color token's WCAG contrast ratio against a configured background,
/// flagging anything below the minimum ratio (default 4.5, the AA body-text threshold)
/// (§4.7 built-in templates: WCAG contrast).
pub fn wcag_contrast(options: &JsonValue, _context: &PolicyFactoryContext) -> PolicyRule {
    let parsed: ContrastOptions = serde_json::from_value(options.clone()).unwrap_or(ContrastOptions {
        background: default_background(),
        minimum_ratio: default_minimum_ratio(),
    });
    let background_luminance = parse_hex_color(&parsed.background).map(relative_luminance);

    PolicyRule::new("wcag-contrast", move |_options: &JsonValue| {
        let background_luminance = background_luminance;
        let minimum_ratio = parsed.minimum_ratio;
        Arc::new(move |input: &PolicyInput| -> Vec<PolicyViolation> {
            if input.snapshot.token_type() != Some(TokenType::Color) {
                return Vec::new();
            }
            let Some(background_luminance) = background_luminance else {
                return Vec::new();
            };
            let Some(value) = input.snapshot.effective_value().and_then(JsonValue::as_str) else {
                return Vec::new();
            };
            let Some(rgb) = parse_hex_color(value) else {
                return Vec::new();
            };

            let ratio = contrast_ratio(relative_luminance(rgb), background_luminance);
            if ratio >= minimum_ratio {
                Vec::new()
            } else {
                vec![PolicyViolation {
                    policy: "wcag-contrast".to_string(),
                    pointer: input.snapshot.pointer.clone(),
                    severity: Severity::Warning,
                    message: format!(
                        "contrast ratio {ratio:.2} against {} is below the minimum {minimum_ratio:.2}",
                        parsed.background
                    ),
                    details: Some(serde_json::json!({ "ratio": ratio })),
                }]
            }
        }) as Arc<dyn PolicyHandler>
    })
}

fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

fn relative_luminance((r, g, b): (u8, u8, u8)) -> f64 {
    fn channel(value: u8) -> f64 {
        let normalized = value as f64 / 255.0;
        if normalized <= 0.03928 {
            normalized / 12.92
        } else {
            ((normalized + 0.055) / 1.055).powf(2.4)
        }
    }
    0.2126 * channel(r) + 0.7152 * channel(g) + 0.0722 * channel(b)
}

fn contrast_ratio(a: f64, b: f64) -> f64 {
    let (lighter, darker) = if a > b { (a, b) } else { (b, a) };
    (lighter + 0.05) / (darker + 0.05)
}

fn severity_option(options: &JsonValue, default: Severity) -> Severity {
    options
        .get("severity")
        .and_then(JsonValue::as_str)
        .and_then(parse_severity)
        .unwrap_or(default)
}

fn parse_severity(raw: Option<&str>) -> Option<Severity> {
    match raw {
        Some("error") => Some(Severity::Error),
        Some("warning") => Some(Severity::Warning),
        Some("info") => Some(Severity::Info),
        _ => None,
    }
}
