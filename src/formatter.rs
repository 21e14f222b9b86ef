//! Text rendering of captured records.
//!
//! Placeholders are filled positionally: the n-th placeholder takes the n-th
//! captured value. A record whose value count differs from its template's
//! placeholder count is a [`RenderError`], never silently truncated.

use crate::call_site::CallSiteInfo;
use crate::clock::format_timestamp;
use crate::error::RenderError;
use crate::loggable::LogValue;
use crate::template::{ParsedTemplate, Segment};

/// Fills a parsed template with values.
pub fn render(
    template: &ParsedTemplate,
    source: &str,
    values: &[LogValue],
) -> Result<String, RenderError> {
    if template.placeholder_count() != values.len() {
        return Err(RenderError::ArityMismatch {
            template: source.to_owned(),
            placeholders: template.placeholder_count(),
            values: values.len(),
        });
    }

    let mut out = String::with_capacity(source.len() + 8 * values.len());
    for segment in template.segments() {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Field(index) => out.push_str(&values[*index].to_string()),
        }
    }
    Ok(out)
}

/// Parses and fills a template in one step.
///
/// # Examples
///
/// ```
/// # use replay_logger::formatter::render_template;
/// # use replay_logger::LogValue;
/// let text = render_template("sum={sum}, i={i}", &[LogValue::I32(10), LogValue::I32(1)]);
/// assert_eq!(text.unwrap(), "sum=10, i=1");
/// ```
pub fn render_template(template: &str, values: &[LogValue]) -> Result<String, RenderError> {
    let parsed = ParsedTemplate::parse(template).map_err(|source| RenderError::Template {
        template: template.to_owned(),
        source,
    })?;
    render(&parsed, template, values)
}

/// Renders the message of a record captured at `site`.
pub fn render_message(site: &CallSiteInfo, values: &[LogValue]) -> Result<String, RenderError> {
    render(site.parsed(), site.template(), values)
}

/// The full output line: `[SEVERITY] secs.micros file:line message`.
///
/// Categorized sites add the category after the severity, as in
/// `[WARN][net]`.
pub fn render_line(
    site: &CallSiteInfo,
    timestamp_micros: u64,
    values: &[LogValue],
) -> Result<String, RenderError> {
    let message = render_message(site, values)?;
    Ok(format!("{} {}", line_prefix(site, timestamp_micros), message))
}

/// Output line for a record that cannot be rendered.
///
/// Shows the raw template and the captured values so nothing is lost.
pub fn fallback_line(
    site: &CallSiteInfo,
    timestamp_micros: u64,
    values: &[LogValue],
    err: &RenderError,
) -> String {
    let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!(
        "{} {} [{}] ({})",
        line_prefix(site, timestamp_micros),
        site.template(),
        rendered.join(", "),
        err
    )
}

fn line_prefix(site: &CallSiteInfo, timestamp_micros: u64) -> String {
    let tag = match site.category() {
        Some(category) => format!("[{}][{}]", site.severity(), category),
        None => format!("[{}]", site.severity()),
    };
    format!(
        "{} {} {}:{}",
        tag,
        format_timestamp(timestamp_micros),
        site.file(),
        site.line()
    )
}
