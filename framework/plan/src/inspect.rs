use std::collections::HashSet;
use std::path::Path;

use jawa_summary_model::{SamplerRef, ScenarioGroup};

use crate::error::{read_plan, PlanResult};
use crate::scan::{start_tags, tags, StartTag, Tag};

/// Element classes that define a scenario group.
pub const SCENARIO_GROUP_CLASSES: &[&str] = &["ThreadGroup"];

/// Element classes that define a leaf request.
pub const SAMPLER_CLASSES: &[&str] = &[
    "HTTPSamplerProxy",
    "HTTPSampler",
    "JSR223Sampler",
    "JDBCSampler",
];

const UNNAMED_GROUP: &str = "Unnamed Thread Group";
const UNNAMED_SAMPLER: &str = "Unnamed Request";

pub(crate) fn is_scenario_group(class: &str) -> bool {
    SCENARIO_GROUP_CLASSES.contains(&class)
}

/// Read the scenario groups from the plan at `path`, in document order.
pub fn inspect_groups(path: &Path) -> PlanResult<Vec<ScenarioGroup>> {
    let document = read_plan(path)?;
    let groups = groups_in(&document);
    log::debug!("Found {} scenario groups in {}", groups.len(), path.display());
    Ok(groups)
}

/// Read the distinct, enabled samplers from the plan at `path`, in document order.
pub fn inspect_samplers(path: &Path) -> PlanResult<Vec<SamplerRef>> {
    let document = read_plan(path)?;
    let samplers = samplers_in(&document);
    log::debug!("Found {} samplers in {}", samplers.len(), path.display());
    Ok(samplers)
}

/// Read the distinct, enabled samplers that belong to an enabled scenario group of the plan at
/// `path`, in document order.
pub fn inspect_active_samplers(path: &Path) -> PlanResult<Vec<SamplerRef>> {
    let document = read_plan(path)?;
    let samplers = active_samplers_in(&document);
    log::debug!(
        "Found {} samplers in enabled scenario groups of {}",
        samplers.len(),
        path.display()
    );
    Ok(samplers)
}

pub fn groups_in(document: &str) -> Vec<ScenarioGroup> {
    start_tags(document)
        .into_iter()
        .filter(|tag| is_scenario_group(tag.class()))
        .map(|tag| {
            let identifier = tag.value("testname").unwrap_or_default();
            let name = if identifier.is_empty() {
                UNNAMED_GROUP.to_string()
            } else {
                identifier.clone()
            };
            ScenarioGroup {
                name,
                identifier,
                enabled: tag.is_enabled(),
            }
        })
        .collect()
}

pub fn samplers_in(document: &str) -> Vec<SamplerRef> {
    distinct_samplers(start_tags(document).iter().filter(|tag| is_sampler(tag)))
}

/// Samplers nested in the `<hashTree>` of an enabled scenario group.
///
/// A plan element's children live in the `<hashTree>` sibling that follows it, so a group's
/// samplers are the ones between the opening of that tree and its matching close.
pub fn active_samplers_in(document: &str) -> Vec<SamplerRef> {
    let tags = tags(document);
    let mut depth = 0usize;
    // Enabled flag of a group whose tree hasn't opened yet
    let mut pending_group: Option<bool> = None;
    // Depth and enabled flag of the group tree being walked
    let mut open_group: Option<(usize, bool)> = None;
    let mut samplers = Vec::new();

    for tag in &tags {
        match tag {
            Tag::Start(start) if start.name == HASH_TREE => {
                if start.self_closing {
                    if open_group.is_none() {
                        pending_group = None;
                    }
                    continue;
                }
                depth += 1;
                if open_group.is_none() {
                    if let Some(enabled) = pending_group.take() {
                        open_group = Some((depth, enabled));
                    }
                }
            }
            Tag::End { name } if *name == HASH_TREE => {
                if open_group.is_some_and(|(group_depth, _)| group_depth == depth) {
                    open_group = None;
                } else if open_group.is_none() {
                    // The group's parent tree closed before the group had one of its own
                    pending_group = None;
                }
                depth = depth.saturating_sub(1);
            }
            Tag::Start(start) if open_group.is_none() && is_scenario_group(start.class()) => {
                pending_group = Some(start.is_enabled());
            }
            Tag::Start(start) if is_sampler(start) => {
                if let Some((_, true)) = open_group {
                    samplers.push(start);
                }
            }
            _ => {}
        }
    }

    distinct_samplers(samplers.into_iter())
}

const HASH_TREE: &str = "hashTree";

fn is_sampler(tag: &StartTag<'_>) -> bool {
    SAMPLER_CLASSES.contains(&tag.class()) && tag.is_enabled()
}

fn distinct_samplers<'a, 'b: 'a>(tags: impl Iterator<Item = &'a StartTag<'b>>) -> Vec<SamplerRef> {
    let mut seen = HashSet::new();
    tags.map(|tag| {
        tag.value("testname")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNNAMED_SAMPLER.to_string())
    })
    .filter(|name| seen.insert(name.clone()))
    .map(|name| SamplerRef { name })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PLAN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<jmeterTestPlan version="1.2" properties="5.0" jmeter="5.6.3">
  <hashTree>
    <TestPlan guiclass="TestPlanGui" testclass="TestPlan" testname="Shop" enabled="true"/>
    <hashTree>
      <ThreadGroup guiclass="ThreadGroupGui" testclass="ThreadGroup" testname="Checkout">
        <intProp name="ThreadGroup.num_threads">1</intProp>
      </ThreadGroup>
      <hashTree>
        <HTTPSamplerProxy guiclass="HttpTestSampleGui" testclass="HTTPSamplerProxy" testname="Pay" enabled="true"/>
        <HTTPSamplerProxy guiclass="HttpTestSampleGui" testclass="HTTPSamplerProxy" testname="Pay" enabled="true"/>
        <JSR223Sampler guiclass="TestBeanGUI" testclass="JSR223Sampler" testname="Legacy" enabled="false"/>
      </hashTree>
      <ThreadGroup guiclass="ThreadGroupGui" testclass="ThreadGroup" testname="Signup" enabled="false"/>
      <hashTree>
        <JDBCSampler guiclass="TestBeanGUI" testclass="JDBCSampler" testname="Insert user" enabled="true"/>
        <HTTPSamplerProxy guiclass="HttpTestSampleGui" testclass="HTTPSamplerProxy" enabled="true"/>
      </hashTree>
      <ThreadGroup guiclass="ThreadGroupGui" testclass="ThreadGroup" enabled="true"/>
    </hashTree>
  </hashTree>
</jmeterTestPlan>
"#;

    #[test]
    fn lists_groups_in_document_order() {
        let groups = groups_in(PLAN);
        assert_eq!(
            vec![
                ScenarioGroup {
                    name: "Checkout".to_string(),
                    identifier: "Checkout".to_string(),
                    enabled: true,
                },
                ScenarioGroup {
                    name: "Signup".to_string(),
                    identifier: "Signup".to_string(),
                    enabled: false,
                },
                ScenarioGroup {
                    name: "Unnamed Thread Group".to_string(),
                    identifier: "".to_string(),
                    enabled: true,
                },
            ],
            groups
        );
    }

    #[test]
    fn lists_distinct_enabled_samplers() {
        let names = samplers_in(PLAN)
            .into_iter()
            .map(|s| s.name)
            .collect::<Vec<_>>();
        assert_eq!(vec!["Pay", "Insert user", "Unnamed Request"], names);
    }

    #[test]
    fn active_samplers_skip_disabled_groups() {
        let names = active_samplers_in(PLAN)
            .into_iter()
            .map(|s| s.name)
            .collect::<Vec<_>>();
        // Signup is disabled, and the unnamed group has no tree
        assert_eq!(vec!["Pay"], names);
    }

    #[test]
    fn active_samplers_follow_the_group_tree() {
        let plan = r#"<hashTree>
  <ThreadGroup testclass="ThreadGroup" testname="Checkout" enabled="true"/>
  <hashTree>
    <GenericController testclass="GenericController" testname="Steps"/>
    <hashTree>
      <HTTPSamplerProxy testclass="HTTPSamplerProxy" testname="Pay"/>
      <hashTree/>
    </hashTree>
    <HTTPSamplerProxy testclass="HTTPSamplerProxy" testname="Receipt"/>
    <hashTree/>
  </hashTree>
  <ThreadGroup testclass="ThreadGroup" testname="Signup" enabled="false"/>
  <hashTree>
    <HTTPSamplerProxy testclass="HTTPSamplerProxy" testname="Register"/>
    <hashTree/>
  </hashTree>
  <HTTPSamplerProxy testclass="HTTPSamplerProxy" testname="Outside"/>
</hashTree>
"#;
        let names = active_samplers_in(plan)
            .into_iter()
            .map(|s| s.name)
            .collect::<Vec<_>>();
        assert_eq!(vec!["Pay", "Receipt"], names);
        assert_eq!(4, samplers_in(plan).len());
    }

    #[test]
    fn missing_plan_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = inspect_groups(&dir.path().join("main.jmx")).unwrap_err();
        assert!(matches!(err, crate::PlanError::NotFound { .. }));
    }
}
