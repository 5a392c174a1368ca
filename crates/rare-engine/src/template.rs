use std::collections::BTreeMap;

use rare_core::errors::ErrorInfo;
use rare_core::RareError;

/// Substitutes `{name}` placeholders in `template`.
///
/// `{{` and `}}` produce literal braces. Unknown names and unterminated
/// placeholders are configuration errors.
pub fn render(template: &str, params: &BTreeMap<&str, String>) -> Result<String, RareError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    return Err(RareError::Config(
                        ErrorInfo::new("template-unterminated", "unterminated placeholder")
                            .with_context("placeholder", name),
                    ));
                }
                let key = name.trim();
                let value = params.get(key).ok_or_else(|| {
                    RareError::Config(
                        ErrorInfo::new("template-unknown", "unknown template placeholder")
                            .with_context("placeholder", key.to_string())
                            .with_hint(format!(
                                "available: {}",
                                params.keys().copied().collect::<Vec<_>>().join(", ")
                            )),
                    )
                })?;
                out.push_str(value);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Renders every argument of an argv list.
pub fn render_args(
    args: &[String],
    params: &BTreeMap<&str, String>,
) -> Result<Vec<String>, RareError> {
    args.iter().map(|arg| render(arg, params)).collect()
}

/// Formats a float the way restraint files expect: integral values keep one decimal.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
