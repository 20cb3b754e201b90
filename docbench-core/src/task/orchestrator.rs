use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use snafu::ResultExt;
use tracing::*;

use crate::{
    analysis::matcher::{MatchSet, Matcher},
    config::{EvalConfig, TaskEntry},
    consts::RESULT_FILE_SUFFIX,
    error::{EvalError, IoWriteSnafu, JsonSnafu},
    layout::{
        category::CategoryProfiles,
        element::{ContentKind, Element},
    },
    metrics::{Metric, MetricInput},
    registry::Registries,
    task::report::{CategoryReport, TaskReport, TaskState},
};

/// A task that went through loading and matching and is ready to be scored.
pub struct MatchedTask {
    save_name: String,
    report: TaskReport,
    metrics: Vec<Box<dyn Metric>>,
    content: Option<ContentKind>,
    profiles: CategoryProfiles,
    categories: BTreeMap<String, MatchSet>,
    groups: BTreeMap<String, BTreeMap<String, MatchSet>>,
}

impl MatchedTask {
    pub fn save_name(&self) -> &str {
        &self.save_name
    }

    /// Content payload `category` is scored on: fixed by the task, else the
    /// category profile, else whatever the elements themselves carry.
    fn category_content(&self, category: &str, set: &MatchSet) -> Option<ContentKind> {
        if self.content.is_some() {
            return self.content;
        }
        match self.profiles.rule(category) {
            Some(rule) => rule.kind(),
            None => set
                .paired
                .iter()
                .map(|pair| &pair.gt)
                .chain(&set.unmatched_gt)
                .chain(&set.unmatched_pred)
                .find_map(Element::content_kind),
        }
    }

    fn score_category(&self, category: &str, set: &MatchSet) -> CategoryReport {
        let input = MetricInput {
            category,
            content: self.category_content(category, set),
            matches: set,
        };
        let mut report = CategoryReport {
            gt: set.gt_count(),
            pred: set.pred_count(),
            ..Default::default()
        };
        for metric in &self.metrics {
            match metric.score(&input) {
                Ok(scores) => {
                    report.metrics.insert(metric.name().to_string(), scores);
                }
                Err(err) => {
                    warn!("{}", err);
                    report.failures.insert(metric.name().to_string(), err.to_string());
                }
            }
        }
        report
    }
}

/// Runs configured tasks against a fixed set of registries.
#[derive(Debug)]
pub struct Orchestrator {
    registries: Registries,
    output_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(registries: Registries) -> Self {
        Self {
            registries,
            output_dir: None,
        }
    }

    /// Write every task report as `<dir>/<save_name>_metric_result.json`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Runs every task in declaration order. A failing task is reported and
    /// the next one still runs.
    pub fn run_all(&self, config: &EvalConfig) -> Vec<TaskReport> {
        config.tasks.iter().map(|entry| self.run_task(entry)).collect()
    }

    pub fn run_task(&self, entry: &TaskEntry) -> TaskReport {
        let _span = info_span!("task", name = %entry.name).entered();
        match self.prepare(entry) {
            Ok(matched) => self.score(matched),
            Err(err) => self.fail(entry, &err),
        }
    }

    /// Report for a task whose preparation failed.
    pub fn fail(&self, entry: &TaskEntry, err: &EvalError) -> TaskReport {
        error!("Task `{}` failed: {}", entry.name, err);
        TaskReport::failed(&entry.name, err)
    }

    /// Pending to Matched: resolves the task's components, loads its dataset
    /// and matches every sample pair.
    pub fn prepare(&self, entry: &TaskEntry) -> Result<MatchedTask, EvalError> {
        let config = entry.parse()?;
        let task_name = config.task.as_deref().unwrap_or(&entry.name);
        let task = self.registries.tasks.create(task_name)?;
        let dataset = self
            .registries
            .datasets
            .create(&config.dataset.dataset_name)?;
        let metrics = config
            .metrics
            .iter()
            .map(|name| self.registries.metrics.create(name))
            .collect::<Result<Vec<_>, _>>()?;
        let matcher = Matcher::new(config.dataset.matcher_config(&entry.name)?);

        let mut profiles = CategoryProfiles::default();
        profiles.extend(&config.categories);

        let save_name = config.dataset.save_name();
        let mut report = TaskReport::new(&entry.name);
        report.save_name = Some(save_name.clone());
        report.match_method = Some(matcher.config().method.to_string());

        let loaded = dataset.load(&config.dataset)?;
        report.state = TaskState::Loaded;
        report.samples = loaded.pairs.len();
        report.skipped = loaded.skipped.iter().map(ToString::to_string).collect();
        info!(
            "Dataset `{}` loaded {} sample pairs, {} skipped",
            dataset.name(),
            loaded.pairs.len(),
            loaded.skipped.len()
        );

        let in_scope = |element: &&Element| task.accepts(profiles.content_kind(element));
        let mut categories: BTreeMap<String, MatchSet> = BTreeMap::new();
        let mut groups: BTreeMap<String, BTreeMap<String, MatchSet>> = BTreeMap::new();
        for pair in &loaded.pairs {
            let sample_match = matcher.match_elements(
                pair.gt.layout_dets.iter().filter(in_scope),
                pair.pred.layout_dets.iter().filter(in_scope),
            );
            let labels = pair.gt.attribute_labels();
            for (category, set) in sample_match.categories {
                for label in &labels {
                    groups
                        .entry(label.clone())
                        .or_default()
                        .entry(category.clone())
                        .or_default()
                        .extend(set.clone());
                }
                categories.entry(category).or_default().extend(set);
            }
        }
        report.state = TaskState::Matched;
        debug!(
            "Task `{}` matched {} categories with {}",
            task.name(),
            categories.len(),
            matcher.config().method
        );

        Ok(MatchedTask {
            save_name,
            report,
            metrics,
            content: task.content(),
            profiles,
            categories,
            groups,
        })
    }

    /// Matched to Reported: runs every metric on every category and writes
    /// the report when an output directory is set.
    pub fn score(&self, matched: MatchedTask) -> TaskReport {
        let categories = matched
            .categories
            .iter()
            .map(|(category, set)| (category.clone(), matched.score_category(category, set)))
            .collect();
        let groups = matched
            .groups
            .iter()
            .map(|(label, sets)| {
                let scored = sets
                    .iter()
                    .map(|(category, set)| (category.clone(), matched.score_category(category, set)))
                    .collect();
                (label.clone(), scored)
            })
            .collect();

        let mut report = matched.report;
        report.categories = categories;
        report.groups = groups;
        report.state = TaskState::Scored;
        info!(
            "Scored {} categories, {} metric failures",
            report.categories.len(),
            report.failure_count()
        );

        report.state = TaskState::Reported;
        if let Some(dir) = &self.output_dir {
            match write_report(dir, &matched.save_name, &report) {
                Ok(path) => info!("Wrote {}", path.display()),
                Err(err) => {
                    error!("{}", err);
                    report.state = TaskState::Failed(err.to_string());
                }
            }
        }
        report
    }
}

fn write_report(dir: &Path, save_name: &str, report: &TaskReport) -> Result<PathBuf, EvalError> {
    std::fs::create_dir_all(dir).context(IoWriteSnafu {
        path: dir.display().to_string(),
    })?;
    let path = dir.join(format!("{save_name}{RESULT_FILE_SUFFIX}"));
    let display = path.display().to_string();
    let json = serde_json::to_string_pretty(report).context(JsonSnafu { path: &display })?;
    std::fs::write(&path, json).context(IoWriteSnafu { path: &display })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::matcher::MatchedPair;

    fn matched(content: Option<ContentKind>, categories: BTreeMap<String, MatchSet>) -> MatchedTask {
        MatchedTask {
            save_name: "gt".to_string(),
            report: TaskReport::new("layout_detection"),
            metrics: vec![Box::new(crate::metrics::EditDistance)],
            content,
            profiles: CategoryProfiles::default(),
            categories,
            groups: BTreeMap::new(),
        }
    }

    #[test]
    fn test_category_content_resolution() {
        let unknown = MatchSet {
            unmatched_gt: vec![Element::new("sidebar").with_content(ContentKind::Text, "x")],
            ..Default::default()
        };
        let task = matched(None, BTreeMap::new());
        assert_eq!(task.category_content("table", &MatchSet::default()), Some(ContentKind::Html));
        assert_eq!(task.category_content("figure", &MatchSet::default()), None);
        assert_eq!(task.category_content("sidebar", &unknown), Some(ContentKind::Text));

        let task = matched(Some(ContentKind::Latex), BTreeMap::new());
        assert_eq!(task.category_content("table", &MatchSet::default()), Some(ContentKind::Latex));
    }

    #[test]
    fn test_score_records_partial_failure() {
        let text = Element::new("title").with_content(ContentKind::Text, "Intro");
        let categories = BTreeMap::from([
            ("figure".to_string(), MatchSet {
                unmatched_gt: vec![Element::new("figure")],
                ..Default::default()
            }),
            ("title".to_string(), MatchSet {
                paired: vec![MatchedPair {
                    gt: text.clone(),
                    pred: text,
                    iou: None,
                }],
                ..Default::default()
            }),
        ]);
        let orchestrator = Orchestrator::new(Registries::empty());
        let report = orchestrator.score(matched(None, categories));

        assert_eq!(report.state, TaskState::Reported);
        assert!(report.categories["figure"].failures.contains_key("Edit_dist"));
        assert_eq!(report.categories["title"].metrics["Edit_dist"]["edit_dist"], 0.0);
        assert_eq!(report.failure_count(), 1);
    }
}
