//! Up-front checks for user-supplied prompt templates, run when the
//! configuration is built so a broken template fails before any request.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tera::Tera;

const MAX_TEMPLATE_BYTES: u64 = 1024 * 1024;
const REQUIRED_VARIABLES: [&str; 2] = ["goal", "body"];

/// Checks that `path` holds a usable prompt template.
///
/// The file must exist, be at most 1 MiB, not be blank, compile under Tera
/// and reference both `goal` and `body` inside a `{{ }}` or `{% %}` tag.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for a missing file and [`Error::Template`]
/// for the first failed check otherwise.
pub(crate) fn validate(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::not_found("template file", path),
        _ => Error::io(path, e),
    })?;

    let name = path.display().to_string();
    let fail = |message: String| Err(Error::template(name.clone(), message));

    if !metadata.is_file() {
        return fail("Path is not a file".to_string());
    }
    if metadata.len() > MAX_TEMPLATE_BYTES {
        return fail(format!(
            "Template file too large: {} bytes (max: {MAX_TEMPLATE_BYTES} bytes)",
            metadata.len()
        ));
    }

    let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    if source.trim().is_empty() {
        return fail("Template file is empty".to_string());
    }

    if let Err(e) = Tera::default().add_raw_template(&name, &source) {
        return fail(format!("Template syntax error: {e}"));
    }

    let missing: Vec<&str> = REQUIRED_VARIABLES
        .into_iter()
        .filter(|var| !references(&source, var))
        .collect();
    if !missing.is_empty() {
        return fail(format!(
            "missing required variables: {}",
            missing.join(", ")
        ));
    }

    Ok(())
}

/// True if `var` appears as an identifier inside an expression or statement tag.
fn references(source: &str, var: &str) -> bool {
    tag_contents(source, "{{", "}}")
        .chain(tag_contents(source, "{%", "%}"))
        .any(|tag| {
            tag.split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .any(|word| word == var)
        })
}

fn tag_contents<'a>(
    source: &'a str,
    open: &'a str,
    close: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    source
        .split(open)
        .skip(1)
        .filter_map(move |rest| rest.split_once(close).map(|(inside, _)| inside))
}
