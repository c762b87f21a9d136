//! Index of `define`d templates across a chart and its dependency charts,
//! used to resolve `include` calls.

use crate::analyzer::AnalyzeError;
use crate::chart::Chart;
use crate::template::{parse_file, Tree};

use std::collections::{BTreeMap, HashSet};

use log::{debug, warn};

/// A defined template: its globally unique name, origin file, and body.
#[derive(Clone, Debug)]
pub struct TemplateDef {
    pub name: String,
    pub file: String,
    pub tree: Tree,
}

/// Lookup of defined templates by name. Built once per chart, read-only
/// afterwards.
#[derive(Debug, Default)]
pub struct TemplateIndex {
    by_name: BTreeMap<String, TemplateDef>,
}

impl TemplateIndex {
    pub fn get(&self, name: &str) -> Option<&TemplateDef> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Template names are globally unique across the chart tree; a duplicate
    /// registration asserts in strict mode and keeps the first definition
    /// otherwise.
    fn add(&mut self, def: TemplateDef, strict: bool) {
        if self.by_name.contains_key(&def.name) {
            let msg = format!("duplicate template name: {}", def.name);
            if strict {
                panic!("{}", msg);
            }
            warn!("{}", msg);
            return;
        }
        self.by_name.insert(def.name.clone(), def);
    }

    /// Parses every template file in the chart and its transitive
    /// dependencies, collecting each `define` under its name. Dependency
    /// files are registered with a `charts/<dep>/` file prefix.
    pub fn build(chart: &Chart, strict: bool) -> Result<TemplateIndex, AnalyzeError> {
        let mut index = TemplateIndex::default();
        let mut seen = HashSet::new();
        index.add_chart(chart, "", &mut seen, strict)?;
        debug!("built template index with {} templates", index.len());
        Ok(index)
    }

    fn add_chart(
        &mut self,
        chart: &Chart,
        prefix: &str,
        seen: &mut HashSet<String>,
        strict: bool,
    ) -> Result<(), AnalyzeError> {
        if !seen.insert(chart.name.clone()) {
            debug!("skipping already-indexed chart {}", chart.name);
            return Ok(());
        }
        for template in &chart.templates {
            let file = format!("{}{}", prefix, template.name);
            let source =
                std::str::from_utf8(&template.data).map_err(|_| AnalyzeError::NonUtf8Template {
                    file: file.clone(),
                })?;
            for tree in parse_file(&file, source)? {
                if let Some(name) = tree.define_name.clone() {
                    self.add(
                        TemplateDef {
                            name,
                            file: file.clone(),
                            tree,
                        },
                        strict,
                    );
                }
            }
        }
        for dep in &chart.dependencies {
            let dep_prefix = format!("{}charts/{}/", prefix, dep.name);
            self.add_chart(dep, &dep_prefix, seen, strict)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod index_tests {
    use super::*;
    use crate::chart::ChartFile;

    fn chart_with(templates: Vec<(&str, &str)>) -> Chart {
        Chart {
            name: "test-chart".to_string(),
            templates: templates
                .into_iter()
                .map(|(name, data)| ChartFile::new(name, data.as_bytes()))
                .collect(),
            raw: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn collects_defines_and_skips_file_trees() {
        let chart = chart_with(vec![
            (
                "templates/_helpers.tpl",
                r#"{{ define "chart.name" }}{{ .Values.name }}{{ end }}"#,
            ),
            ("templates/cm.yaml", "kind: ConfigMap"),
        ]);
        let index = TemplateIndex::build(&chart, true).unwrap();
        assert_eq!(index.len(), 1);
        let def = index.get("chart.name").unwrap();
        assert_eq!(def.file, "templates/_helpers.tpl");
    }

    #[test]
    fn dependency_templates_get_a_file_prefix() {
        let mut chart = chart_with(vec![]);
        chart.dependencies.push(Chart {
            name: "common".to_string(),
            templates: vec![ChartFile::new(
                "templates/_lib.tpl",
                r#"{{ define "common.labels" }}x{{ end }}"#.as_bytes(),
            )],
            raw: Vec::new(),
            dependencies: Vec::new(),
        });
        let index = TemplateIndex::build(&chart, true).unwrap();
        let def = index.get("common.labels").unwrap();
        assert_eq!(def.file, "charts/common/templates/_lib.tpl");
    }

    #[test]
    fn grandchild_dependencies_nest_their_prefixes() {
        let grandchild = Chart {
            name: "base".to_string(),
            templates: vec![ChartFile::new(
                "templates/_base.tpl",
                r#"{{ define "base.name" }}x{{ end }}"#.as_bytes(),
            )],
            ..Chart::default()
        };
        let child = Chart {
            name: "common".to_string(),
            dependencies: vec![grandchild],
            ..Chart::default()
        };
        let mut chart = chart_with(vec![]);
        chart.dependencies.push(child);
        let index = TemplateIndex::build(&chart, true).unwrap();
        let def = index.get("base.name").unwrap();
        assert_eq!(def.file, "charts/common/charts/base/templates/_base.tpl");
    }

    #[test]
    fn repeated_chart_names_are_visited_once() {
        let dep = Chart {
            name: "dup".to_string(),
            templates: vec![ChartFile::new(
                "templates/_d.tpl",
                r#"{{ define "dup.name" }}x{{ end }}"#.as_bytes(),
            )],
            ..Chart::default()
        };
        let mut chart = chart_with(vec![]);
        chart.dependencies.push(dep.clone());
        chart.dependencies.push(dep);
        // The second visit is skipped, so the duplicate define never lands.
        let index = TemplateIndex::build(&chart, true).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    #[should_panic(expected = "duplicate template name")]
    fn duplicate_define_across_files_panics_in_strict_mode() {
        let chart = chart_with(vec![
            ("templates/a.tpl", r#"{{ define "x" }}a{{ end }}"#),
            ("templates/b.tpl", r#"{{ define "x" }}b{{ end }}"#),
        ]);
        let _ = TemplateIndex::build(&chart, true);
    }

    #[test]
    fn duplicate_define_keeps_the_first_in_production_mode() {
        let chart = chart_with(vec![
            ("templates/a.tpl", r#"{{ define "x" }}a{{ end }}"#),
            ("templates/b.tpl", r#"{{ define "x" }}b{{ end }}"#),
        ]);
        let index = TemplateIndex::build(&chart, false).unwrap();
        assert_eq!(index.get("x").unwrap().file, "templates/a.tpl");
    }

    #[test]
    fn parse_failures_abort_the_build() {
        let chart = chart_with(vec![("templates/bad.yaml", "{{ if }}")]);
        assert!(TemplateIndex::build(&chart, true).is_err());
    }
}
