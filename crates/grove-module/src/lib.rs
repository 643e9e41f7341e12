//! Translates Tcl environment-module files into environment manifests.
//!
//! The input is an shpc-style module file whose `module-whatis` lines
//! carry `Name:`, `Version:` and `Packages:` fields and whose
//! `ModulesHelp` procedure prints the description with `puts stderr`.
//! Translation is pure: bytes in, manifest bytes out, no I/O.

/// Convert a module file to manifest bytes.
///
/// `declared_name` seeds the environment name and is overridden by a
/// `module-whatis "Name: ..."` line when one is present. The resulting
/// manifest always lists `name@version` (or bare `name`) as its first
/// package, followed by any packages the whatis metadata declares.
#[must_use]
pub fn module_to_manifest(declared_name: &str, contents: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(contents);

    let mut in_help = false;
    let mut name = declared_name.to_string();
    let mut version = String::new();
    let mut packages: Vec<String> = Vec::new();
    let mut description = String::new();

    for raw in text.lines() {
        let line = raw.trim_start();
        if in_help {
            if line == "}" {
                in_help = false;
            } else if let Some(rest) = line.strip_prefix("puts stderr") {
                let unquoted = strip_quotes(&unescape(rest.trim_start(), true));
                description.push_str("  ");
                description.push_str(&unquoted);
                description.push('\n');
            }
        } else if line.starts_with("proc ModulesHelp") {
            in_help = true;
        } else if let Some(rest) = line.strip_prefix("module-whatis") {
            let whatis = strip_quotes(&unescape(rest.trim_start(), false));
            let whatis = whatis.trim_start();
            if let Some(nv) = whatis.strip_prefix("Name:") {
                if !nv.is_empty() {
                    let mut parts = nv
                        .split(':')
                        .filter_map(|part| part.split_whitespace().next());
                    if let Some(first) = parts.next() {
                        name = first.to_string();
                    }
                    if let Some(second) = parts.next() {
                        version = second.to_string();
                    }
                }
            } else if let Some(ver) = whatis.strip_prefix("Version:") {
                if let Some(first) = ver.split_whitespace().next() {
                    version = first.to_string();
                }
            } else if let Some(pkgs) = whatis.strip_prefix("Packages:") {
                packages = pkgs
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
    }

    if !version.is_empty() {
        name = format!("{name}@{version}");
    }
    packages.insert(0, name);

    let mut out = String::from("description: |\n");
    out.push_str(&description);
    out.push_str("packages:\n  - ");
    out.push_str(&packages.join("\n  - "));
    out.push('\n');
    out.into_bytes()
}

/// Render the README that accompanies an imported module, telling users
/// how to load it with the module command.
#[must_use]
pub fn generate_readme(module_path: &str) -> Vec<u8> {
    format!(
        "# Usage\n\nTo use this environment, run:\n\n\
         ```\nmodule load {module_path}\n```\n\n\
         This will usually add your desired software to your PATH.\n"
    )
    .into_bytes()
}

/// Resolve Tcl-style backslash escapes. `\n`, `\t`, `\"` and `\\` take
/// their usual meaning; when `dollar` is set `\$` becomes a literal `$`
/// (help text escapes shell variables), otherwise unknown escapes pass
/// through unchanged.
fn unescape(input: &str, dollar: bool) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('$') if dollar => out.push('$'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn strip_quotes(input: &str) -> String {
    let stripped = input.strip_prefix('"').unwrap_or(input);
    let stripped = stripped.strip_suffix('"').unwrap_or(stripped);
    stripped.to_string()
}
