//! Structural validation and `{name}` interpolation for pipeline definitions.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use taskforge_core::pipeline::{Pipeline, Stage};

use crate::variables;

static VAR_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap());

/// Replace every `{name}` in `input` with its value from `vars`,
/// substituting the empty string for names that aren't present.
fn interpolate(input: &str, vars: &HashMap<String, String>) -> String {
    VAR_REF
        .replace_all(input, |caps: &regex::Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Collect `"Missing variable: <name>"` for every `{name}` reference
/// in `input` whose name isn't in `vars`. Duplicate references produce
/// duplicate error lines, by design.
fn missing_variable_errors(input: &str, vars: &HashMap<String, String>) -> Vec<String> {
    VAR_REF
        .captures_iter(input)
        .filter_map(|caps| {
            let name = &caps[1];
            if vars.contains_key(name) {
                None
            } else {
                Some(format!("Missing variable: {name}"))
            }
        })
        .collect()
}

/// Validate one string field: if it has no missing-variable errors,
/// interpolate it in place and return no errors; otherwise leave it
/// untouched and return the errors.
fn validate_and_interpolate_field(field: &mut String, vars: &HashMap<String, String>) -> Vec<String> {
    let errors = missing_variable_errors(field, vars);
    if errors.is_empty() {
        *field = interpolate(field, vars);
    }
    errors
}

/// Validate a pipeline definition, interpolating `{name}` references
/// into its stage fields in place wherever that field's variables all
/// resolved. Returns the ordered list of validation errors; an empty
/// list means the pipeline (now interpolated) is ready to run.
///
/// `override_vars`, when present, is used as-is and `variable_file` is
/// ignored. Otherwise, if `variable_file` is set, it must exist on
/// disk and is loaded via [`variables::load`]. With neither, the
/// variable map is empty.
pub fn validate(pipeline: &mut Pipeline, override_vars: Option<&HashMap<String, String>>) -> Vec<String> {
    let mut errors = Vec::new();

    if pipeline.name.is_empty() {
        errors.push("Pipeline name is missing".to_string());
    }

    let vars = match override_vars {
        Some(vars) => vars.clone(),
        None => match &pipeline.variable_file {
            Some(path) if !path.is_empty() => {
                if !std::path::Path::new(path).exists() {
                    errors.push(format!("Variable file does not exist: {path}"));
                    HashMap::new()
                } else {
                    variables::load(path)
                }
            }
            _ => HashMap::new(),
        },
    };

    if pipeline.stages.is_empty() {
        errors.push("Pipeline has no stages".to_string());
    }

    let mut seen: HashSet<String> = HashSet::new();
    for (index, stage) in pipeline.stages.iter_mut().enumerate() {
        validate_stage(stage, index, &vars, &mut seen, &mut errors);
    }

    errors
}

fn validate_stage(
    stage: &mut Stage,
    index: usize,
    vars: &HashMap<String, String>,
    seen: &mut HashSet<String>,
    errors: &mut Vec<String>,
) {
    if stage.name.is_empty() {
        errors.push(format!("Stage name is missing at stage index {index}"));
    }

    if seen.contains(&stage.name) {
        errors.push(format!(
            "Duplicate stage name: {} at stage index {index}",
            stage.name
        ));
    } else {
        seen.insert(stage.name.clone());
    }

    if stage.task.is_empty() {
        errors.push(format!("{} ({index}) stage task is missing", stage.name));
    }

    for entry in &mut stage.env {
        if entry.trim().matches('=').count() != 1 {
            errors.push(format!("invalid env format: '{entry}'"));
            continue;
        }
        errors.extend(validate_and_interpolate_field(entry, vars));
    }

    errors.extend(validate_and_interpolate_field(&mut stage.task, vars));
    errors.extend(validate_and_interpolate_field(&mut stage.pwd, vars));
    for arg in &mut stage.args {
        errors.extend(validate_and_interpolate_field(arg, vars));
    }

    for dependency in &stage.depends_on {
        if dependency == &stage.name {
            errors.push(format!(
                "{} ({index}) listed self as dependency",
                stage.name
            ));
        } else if !seen.contains(dependency) {
            errors.push(format!(
                "{} ({index}) dependency '{dependency}' has not been defined",
                stage.name
            ));
        }
    }
}
