//! HTML document wrapped around the generated page.
//!
//! The pipeline produces a fragment; the browser needs a full document with
//! the visitor's language and a viewport for mobile layouts.

use evoweb_pipeline::fallback::escape;

/// Wrap `body` (already HTML) in a complete document.
pub fn render_document(locale: &str, body: &str) -> String {
    let lang = locale.split(['-', '_']).next().filter(|l| !l.is_empty()).unwrap_or("en");
    format!(
        "<!DOCTYPE html>\n<html lang=\"{lang}\">\n<head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>EvoWeb</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        lang = escape(lang),
    )
}
