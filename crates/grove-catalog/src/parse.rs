//! Streaming scanner for the package manager's HTML listing.
//!
//! The listing is one `<div class="section" id="package-name">` per
//! package, each holding a definition list whose `<dt>` terms label the
//! sibling `<dd>` data. Only the `Versions:` and `Description:` pairs are
//! of interest. The input is machine-generated and regular, so a
//! line-oriented scanner is enough; anything unrecognized is skipped.

use crate::PackageInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Versions,
    Description,
    Other,
}

/// Parse the raw HTML listing into packages, in listing order.
#[must_use]
pub fn parse_listing(html: &str) -> Vec<PackageInfo> {
    let mut packages: Vec<PackageInfo> = Vec::new();
    let mut field = Field::Other;
    let mut in_dd = false;
    let mut dd_text = String::new();

    for raw in html.lines() {
        let line = raw.trim();

        if let Some(name) = section_id(line) {
            packages.push(PackageInfo {
                name: unescape_entities(name),
                versions: Vec::new(),
                description: None,
            });
            field = Field::Other;
            in_dd = false;
            continue;
        }

        if in_dd {
            let (text, done) = match line.strip_suffix("</dd>") {
                Some(body) => (body, true),
                None => (line, false),
            };
            if !dd_text.is_empty() && !text.is_empty() {
                dd_text.push(' ');
            }
            dd_text.push_str(text);
            if done {
                in_dd = false;
                finish_field(&mut packages, field, &dd_text);
            }
            continue;
        }

        if let Some(term) = between(line, "<dt>", "</dt>") {
            field = match term.trim().trim_end_matches(':') {
                "Versions" => Field::Versions,
                "Description" => Field::Description,
                _ => Field::Other,
            };
        } else if let Some(rest) = line.strip_prefix("<dd>") {
            dd_text.clear();
            match rest.strip_suffix("</dd>") {
                Some(body) => finish_field(&mut packages, field, body),
                None => {
                    dd_text.push_str(rest);
                    in_dd = true;
                }
            }
        }
    }

    packages
}

fn finish_field(packages: &mut Vec<PackageInfo>, field: Field, text: &str) {
    let Some(package) = packages.last_mut() else {
        return;
    };
    let text = unescape_entities(strip_tags(text).trim());
    match field {
        Field::Versions => {
            package.versions = text
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect();
        }
        Field::Description => {
            if !text.is_empty() {
                package.description = Some(text);
            }
        }
        Field::Other => {}
    }
}

/// Package name from a `<div class="section" id="...">` line.
fn section_id(line: &str) -> Option<&str> {
    if !line.starts_with("<div") || !line.contains("class=\"section\"") {
        return None;
    }
    between(line, "id=\"", "\"")
}

fn between<'a>(line: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = line.find(open)? + open.len();
    let end = line[start..].find(close)? + start;
    Some(&line[start..end])
}

/// Drop inline markup such as the `<a>` links inside descriptions.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn unescape_entities(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
