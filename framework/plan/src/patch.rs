use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{read_plan, PlanError, PlanResult};
use crate::inspect::is_scenario_group;
use crate::scan::start_tags;

/// Suffix added to the file stem of a patched plan.
pub const PATCHED_PLAN_SUFFIX: &str = "-mod";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// The patched document.
    pub document: String,
    /// Identifiers of the groups that are now enabled, in document order.
    pub enabled: Vec<String>,
    /// Identifiers of the groups that are now disabled, in document order.
    pub disabled: Vec<String>,
    /// Selected identifiers that did not match any group in the document.
    pub unmatched: Vec<String>,
}

/// Where [patch_plan] writes to when no output path is given: `<dir>/<stem>-mod.<ext>`.
pub fn patched_plan_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match source.extension() {
        Some(ext) => format!("{stem}{PATCHED_PLAN_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{PATCHED_PLAN_SUFFIX}"),
    };
    source.with_file_name(file_name)
}

/// Set the enabled flag of every scenario group so that exactly the `selected` ones are active.
///
/// Only the flag's value is touched. When a group has no flag, one is inserted at the end of its
/// start tag. Every other byte of the document is preserved.
pub fn patch_plan_text(document: &str, selected: &[String]) -> PatchOutcome {
    let selection = selected.iter().map(String::as_str).collect::<HashSet<_>>();
    let mut matched = HashSet::new();
    let mut enabled = Vec::new();
    let mut disabled = Vec::new();

    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    for tag in start_tags(document)
        .iter()
        .filter(|tag| is_scenario_group(tag.class()))
    {
        let identifier = tag.value("testname").unwrap_or_default();
        let activate = selection.contains(identifier.as_str());
        if activate {
            matched.insert(identifier.clone());
            enabled.push(identifier);
        } else {
            disabled.push(identifier);
        }

        match tag.attribute("enabled") {
            Some(flag) => edits.push((flag.value_span.clone(), activate.to_string())),
            None => edits.push((
                tag.insert_at..tag.insert_at,
                format!(" enabled=\"{activate}\""),
            )),
        }
    }

    // Apply back to front so earlier offsets stay valid.
    let mut patched = document.to_string();
    for (span, replacement) in edits.into_iter().rev() {
        patched.replace_range(span, &replacement);
    }

    let unmatched = selected
        .iter()
        .filter(|s| !matched.contains(s.as_str()))
        .cloned()
        .collect();

    PatchOutcome {
        document: patched,
        enabled,
        disabled,
        unmatched,
    }
}

/// Patch the plan at `source` and write the result to `output`, or to [patched_plan_path].
///
/// The source plan is never modified. Returns the path that was written.
pub fn patch_plan(source: &Path, selected: &[String], output: Option<&Path>) -> PlanResult<PathBuf> {
    let document = read_plan(source)?;
    let outcome = patch_plan_text(&document, selected);

    if !outcome.unmatched.is_empty() {
        log::warn!(
            "Selected scenario groups not found in {}: {}",
            source.display(),
            outcome.unmatched.join(", ")
        );
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| patched_plan_path(source));
    std::fs::write(&output, outcome.document).map_err(|source| PlanError::Write {
        path: output.clone(),
        source,
    })?;

    log::info!(
        "Wrote patched plan {} with {} enabled and {} disabled scenario groups",
        output.display(),
        outcome.enabled.len(),
        outcome.disabled.len()
    );

    Ok(output)
}
