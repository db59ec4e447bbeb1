//! Minimal HTML rendering helpers.
//!
//! Page rendering is deliberately bare: a shared document shell, an escaping
//! helper, and the error page. Anything resembling a template engine or a
//! component system is out of scope.

use std::fmt::Write;

use http::StatusCode;

/// Escapes text for safe inclusion in HTML content or attribute values.
///
/// # Examples
///
/// ```
/// use tally::html::escape;
///
/// assert_eq!(escape("a & <b>"), "a &#38; &#60;b&#62;");
/// ```
#[must_use]
pub fn escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => result.push_str("&#38;"),
            '<' => result.push_str("&#60;"),
            '>' => result.push_str("&#62;"),
            '"' => result.push_str("&#34;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

/// Wraps body markup in the shared document shell.
///
/// The title is escaped; the body is trusted markup and inserted verbatim.
#[must_use]
pub fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{} | Tally</title></head><body>{}</body></html>",
        escape(title),
        body
    )
}

/// Renders a one-time toast message, or nothing.
#[must_use]
pub fn toast(message: Option<&str>) -> String {
    match message {
        Some(message) => format!("<p class=\"toast\" role=\"status\">{}</p>", escape(message)),
        None => String::new(),
    }
}

/// Renders the generic error page.
///
/// `detail` is only ever passed in debug mode; production callers pass
/// `None` so no error text reaches the user.
#[must_use]
pub fn error_page(status: StatusCode, detail: Option<&str>) -> String {
    let mut body = String::new();
    write!(
        body,
        "<h1>Something went wrong</h1>\
         <p>We are very sorry. An unexpected error occurred. \
         Please try again or contact us if the problem persists.</p>"
    )
    .expect("writing to a String cannot fail");
    if let Some(detail) = detail {
        write!(
            body,
            "<pre class=\"error-detail\">{} {}</pre>",
            status.as_u16(),
            escape(detail)
        )
        .expect("writing to a String cannot fail");
    }
    page("Unexpected Error", &body)
}
