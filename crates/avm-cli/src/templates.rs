//! Resolves the template variables an [`assemble`](avm_codegen::assemble)
//! call needs: an optional file in `avm_codegen::template`'s text format,
//! overlaid with `--template-var NAME=VALUE` arguments that win on
//! collision.

use std::collections::HashMap;
use std::path::Path;

use avm_codegen::template::{parse_template_text, TemplateValue};

use crate::error::DriverError;

pub fn resolve(
    file: Option<&Path>,
    overrides: &[String],
) -> Result<HashMap<String, TemplateValue>, DriverError> {
    let mut vars = match file {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| DriverError::ReadFile {
                path: path.display().to_string(),
                source,
            })?;
            parse_template_text(&text).map_err(|detail| DriverError::MalformedTemplateFile {
                path: path.display().to_string(),
                detail,
            })?
        }
        None => HashMap::new(),
    };

    for raw in overrides {
        let (name, value_text) = raw
            .split_once('=')
            .ok_or_else(|| DriverError::MalformedTemplateArg(raw.clone()))?;
        let line = format!("prefix=\"\"\n{}={}\n", name, value_text);
        let parsed = parse_template_text(&line).map_err(|_| DriverError::MalformedTemplateArg(raw.clone()))?;
        vars.extend(parsed);
    }

    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_override_wins_over_file_entry() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("avmc-template-test-{}.txt", std::process::id()));
        std::fs::write(&path, "TMPL_A=1\n").unwrap();
        let vars = resolve(Some(path.as_path()), &["TMPL_A=2".to_string()]).unwrap();
        assert_eq!(vars["TMPL_A"], TemplateValue::U64(2));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn override_without_file_still_resolves() {
        let vars = resolve(None, &["TMPL_N=9".to_string()]).unwrap();
        assert_eq!(vars["TMPL_N"], TemplateValue::U64(9));
    }

    #[test]
    fn malformed_override_is_an_error() {
        assert!(resolve(None, &["no_equals_sign".to_string()]).is_err());
    }
}
