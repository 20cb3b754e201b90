use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    str::FromStr,
};

use derive_builder::Builder;
use serde::Serialize;
use tracing::*;

use crate::{
    analysis::bbox::Bbox,
    consts::{DEFAULT_IOU_THRESHOLD, DEFAULT_MATCH_METHOD},
    error::EvalError,
    layout::{element::Element, page::Sample},
};

/// How predicted elements are aligned to ground-truth elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Pair by `anno_id` when both sides share the same ids, otherwise by geometry.
    #[default]
    QuickMatch,
    /// Pair by `anno_id` equality only.
    AnnoIdMatch,
    /// Pair by greedy maximum IoU only.
    IouMatch,
}

impl MatchMethod {
    pub const fn name(&self) -> &'static str {
        match self {
            MatchMethod::QuickMatch => "quick_match",
            MatchMethod::AnnoIdMatch => "anno_id_match",
            MatchMethod::IouMatch => "iou_match",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MatchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            DEFAULT_MATCH_METHOD => Ok(MatchMethod::QuickMatch),
            "anno_id_match" => Ok(MatchMethod::AnnoIdMatch),
            "iou_match" => Ok(MatchMethod::IouMatch),
            other => Err(format!(
                "unknown match method `{other}`, expected one of quick_match, anno_id_match, iou_match"
            )),
        }
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct MatcherConfig {
    pub method: MatchMethod,
    pub iou_threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            method: MatchMethod::default(),
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

/// A ground-truth element and the prediction aligned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub gt: Element,
    pub pred: Element,
    /// Overlap of the two boxes; `None` when either side has no usable geometry.
    pub iou: Option<f32>,
}

/// Matching outcome for one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSet {
    pub paired: Vec<MatchedPair>,
    pub unmatched_gt: Vec<Element>,
    pub unmatched_pred: Vec<Element>,
}

impl MatchSet {
    pub fn extend(&mut self, other: MatchSet) {
        self.paired.extend(other.paired);
        self.unmatched_gt.extend(other.unmatched_gt);
        self.unmatched_pred.extend(other.unmatched_pred);
    }

    pub fn gt_count(&self) -> usize {
        self.paired.len() + self.unmatched_gt.len()
    }

    pub fn pred_count(&self) -> usize {
        self.paired.len() + self.unmatched_pred.len()
    }
}

/// Per-category matching outcome of one sample pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleMatch {
    pub categories: BTreeMap<String, MatchSet>,
}

impl SampleMatch {
    /// Every category folded into a single set, in category order.
    pub fn all(&self) -> MatchSet {
        let mut all = MatchSet::default();
        for set in self.categories.values() {
            all.extend(set.clone());
        }
        all
    }
}

/// Aligns predicted layout elements with ground-truth elements of one page.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn match_samples(&self, gt: &Sample, pred: &Sample) -> SampleMatch {
        self.match_elements(&gt.layout_dets, &pred.layout_dets)
    }

    /// Matches two element lists category by category.
    ///
    /// Elements flagged `ignore` are dropped before anything else and never
    /// show up in the result. Cross-category pairs are never produced.
    pub fn match_elements<'a, G, P>(&self, gt: G, pred: P) -> SampleMatch
    where
        G: IntoIterator<Item = &'a Element>,
        P: IntoIterator<Item = &'a Element>,
    {
        let mut groups: BTreeMap<&str, (Vec<&Element>, Vec<&Element>)> = BTreeMap::new();
        for element in gt.into_iter().filter(|e| !e.is_ignored()) {
            groups
                .entry(element.category_type.as_str())
                .or_default()
                .0
                .push(element);
        }
        for element in pred.into_iter().filter(|e| !e.is_ignored()) {
            groups
                .entry(element.category_type.as_str())
                .or_default()
                .1
                .push(element);
        }

        let categories = groups
            .into_iter()
            .map(|(category, (gt, pred))| {
                let set = self.match_category(category, &gt, &pred);
                (category.to_string(), set)
            })
            .collect();

        SampleMatch { categories }
    }

    fn match_category(&self, category: &str, gt: &[&Element], pred: &[&Element]) -> MatchSet {
        match self.config.method {
            MatchMethod::AnnoIdMatch => match_by_anno_id(gt, pred),
            MatchMethod::IouMatch => self.match_by_iou(gt, pred),
            MatchMethod::QuickMatch if anno_ids_aligned(gt, pred) => {
                debug!("Category `{}` paired by anno_id", category);
                match_by_anno_id(gt, pred)
            }
            MatchMethod::QuickMatch => {
                debug!("Category `{}` paired by geometry", category);
                self.match_by_iou(gt, pred)
            }
        }
    }

    /// Greedy maximum-IoU assignment.
    ///
    /// Candidates are visited by IoU descending; ties go to the ground truth
    /// with the lower `anno_id` (unset ids last, then list order) and then to
    /// the earlier prediction.
    fn match_by_iou(&self, gt: &[&Element], pred: &[&Element]) -> MatchSet {
        let gt_boxes: Vec<Option<Bbox>> = gt.iter().map(|e| usable_bbox(e)).collect();
        let pred_boxes: Vec<Option<Bbox>> = pred.iter().map(|e| usable_bbox(e)).collect();

        let mut candidates = Vec::new();
        for (gi, gt_box) in gt_boxes.iter().enumerate() {
            let Some(gt_box) = gt_box else { continue };
            for (pj, pred_box) in pred_boxes.iter().enumerate() {
                let Some(pred_box) = pred_box else { continue };
                let iou = gt_box.iou(pred_box);
                if iou > 0.0 && iou >= self.config.iou_threshold {
                    candidates.push((iou, gi, pj));
                }
            }
        }

        let gt_rank = |gi: usize| (gt[gi].anno_id().unwrap_or(i64::MAX), gi);
        candidates.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| gt_rank(a.1).cmp(&gt_rank(b.1)))
                .then_with(|| a.2.cmp(&b.2))
        });

        let mut gt_used = vec![false; gt.len()];
        let mut pred_used = vec![false; pred.len()];
        let mut paired = Vec::new();
        for (iou, gi, pj) in candidates {
            if gt_used[gi] || pred_used[pj] {
                continue;
            }
            gt_used[gi] = true;
            pred_used[pj] = true;
            paired.push(MatchedPair {
                gt: gt[gi].clone(),
                pred: pred[pj].clone(),
                iou: Some(iou),
            });
        }

        MatchSet {
            paired,
            unmatched_gt: leftovers(gt, &gt_used),
            unmatched_pred: leftovers(pred, &pred_used),
        }
    }
}

/// True when every element on both sides has an id, ids are unique per side,
/// and both sides carry exactly the same ids.
fn anno_ids_aligned(gt: &[&Element], pred: &[&Element]) -> bool {
    let unique_ids = |elements: &[&Element]| -> Option<BTreeSet<i64>> {
        let ids = elements
            .iter()
            .map(|e| e.anno_id())
            .collect::<Option<Vec<_>>>()?;
        let set: BTreeSet<i64> = ids.iter().copied().collect();
        (set.len() == ids.len()).then_some(set)
    };

    match (unique_ids(gt), unique_ids(pred)) {
        (Some(gt_ids), Some(pred_ids)) => !gt_ids.is_empty() && gt_ids == pred_ids,
        _ => false,
    }
}

/// Pairs by `anno_id` equality. Elements with a malformed poly are never
/// paired, even when their id lines up.
fn match_by_anno_id(gt: &[&Element], pred: &[&Element]) -> MatchSet {
    let pred_malformed: Vec<bool> = pred.iter().map(|e| is_malformed(e)).collect();
    let mut by_id: HashMap<i64, usize> = HashMap::new();
    for (pj, element) in pred.iter().enumerate() {
        if pred_malformed[pj] {
            continue;
        }
        if let Some(id) = element.anno_id() {
            by_id.entry(id).or_insert(pj);
        }
    }

    let mut pred_used = vec![false; pred.len()];
    let mut set = MatchSet::default();
    for element in gt {
        if is_malformed(element) {
            set.unmatched_gt.push((*element).clone());
            continue;
        }
        let counterpart = element
            .anno_id()
            .and_then(|id| by_id.get(&id).copied())
            .filter(|pj| !pred_used[*pj]);
        match counterpart {
            Some(pj) => {
                pred_used[pj] = true;
                let iou = usable_bbox(element)
                    .zip(usable_bbox(pred[pj]))
                    .map(|(a, b)| a.iou(&b));
                set.paired.push(MatchedPair {
                    gt: (*element).clone(),
                    pred: pred[pj].clone(),
                    iou,
                });
            }
            None => set.unmatched_gt.push((*element).clone()),
        }
    }
    set.unmatched_pred = leftovers(pred, &pred_used);
    set
}

/// Box of an element, or `None` for degenerate or malformed geometry.
fn usable_bbox(element: &Element) -> Option<Bbox> {
    if element.is_degenerate() {
        return None;
    }
    match element.bbox() {
        Ok(bbox) => Some(bbox),
        Err(err) => {
            warn_unmatched(element, &err);
            None
        }
    }
}

/// A poly that is neither degenerate nor a valid quadrilateral.
fn is_malformed(element: &Element) -> bool {
    if element.is_degenerate() {
        return false;
    }
    match element.bbox() {
        Ok(_) => false,
        Err(err) => {
            warn_unmatched(element, &err);
            true
        }
    }
}

fn warn_unmatched(element: &Element, err: &EvalError) {
    warn!(
        "Element `{}` (anno_id {:?}) left unmatched: {}",
        element.category_type,
        element.anno_id(),
        err
    );
}

fn leftovers(elements: &[&Element], used: &[bool]) -> Vec<Element> {
    elements
        .iter()
        .zip(used)
        .filter(|(_, used)| !**used)
        .map(|(element, _)| (*element).clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::page::PageInfo;

    fn square(x: f64, y: f64, size: f64) -> Vec<f64> {
        vec![x, y, x + size, y, x + size, y + size, x, y + size]
    }

    fn table(id: i64, poly: Vec<f64>) -> Element {
        Element::new("table").with_anno_id(id).with_poly(poly)
    }

    fn iou_matcher() -> Matcher {
        Matcher::new(
            MatcherConfigBuilder::default()
                .method(MatchMethod::IouMatch)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_match_method_parse() {
        assert_eq!("quick_match".parse(), Ok(MatchMethod::QuickMatch));
        assert_eq!("anno_id_match".parse(), Ok(MatchMethod::AnnoIdMatch));
        assert_eq!("iou_match".parse(), Ok(MatchMethod::IouMatch));
        assert!("fuzzy".parse::<MatchMethod>().is_err());
        assert_eq!(MatchMethod::default().to_string(), "quick_match");
    }

    #[test]
    fn test_identical_tables_pair() {
        let gt = vec![Element::new("table").with_poly(square(0.0, 0.0, 100.0))];
        let pred = vec![Element::new("table").with_poly(square(0.0, 0.0, 100.0))];
        let result = Matcher::default().match_elements(&gt, &pred).all();

        assert_eq!(result.paired.len(), 1);
        assert_eq!(result.paired[0].iou, Some(1.0));
        assert!(result.unmatched_gt.is_empty());
        assert!(result.unmatched_pred.is_empty());
    }

    #[test]
    fn test_missing_prediction_is_unmatched_gt() {
        let gt = vec![
            table(0, square(0.0, 0.0, 100.0)),
            table(1, square(500.0, 500.0, 50.0)),
        ];
        let pred = vec![table(7, square(0.0, 0.0, 100.0))];
        let result = Matcher::default().match_elements(&gt, &pred).all();

        assert_eq!(result.paired.len(), 1);
        assert_eq!(result.paired[0].gt.anno_id(), Some(0));
        assert_eq!(result.unmatched_gt.len(), 1);
        assert_eq!(result.unmatched_gt[0].anno_id(), Some(1));
        assert!(result.unmatched_pred.is_empty());
        assert!(
            result
                .paired
                .iter()
                .all(|pair| pair.gt.anno_id() != Some(1))
        );
    }

    #[test]
    fn test_cross_category_never_paired() {
        let gt = vec![Element::new("table").with_poly(square(0.0, 0.0, 10.0))];
        let pred = vec![Element::new("figure").with_poly(square(0.0, 0.0, 10.0))];
        let matched = Matcher::default().match_elements(&gt, &pred);

        assert_eq!(matched.categories.len(), 2);
        assert_eq!(matched.categories["table"].unmatched_gt.len(), 1);
        assert_eq!(matched.categories["figure"].unmatched_pred.len(), 1);
        assert!(matched.all().paired.is_empty());
    }

    #[test]
    fn test_ignored_elements_never_appear() {
        let gt = vec![
            table(0, square(0.0, 0.0, 10.0)).ignored(),
            table(1, square(50.0, 50.0, 10.0)).ignored(),
            table(2, square(100.0, 100.0, 10.0)),
        ];
        let pred = vec![
            table(0, square(0.0, 0.0, 10.0)),
            table(3, square(300.0, 300.0, 10.0)).ignored(),
        ];
        for method in [
            MatchMethod::QuickMatch,
            MatchMethod::AnnoIdMatch,
            MatchMethod::IouMatch,
        ] {
            let matcher = Matcher::new(MatcherConfig {
                method,
                ..Default::default()
            });
            let result = matcher.match_elements(&gt, &pred).all();
            let seen_ignored = result
                .paired
                .iter()
                .flat_map(|pair| [&pair.gt, &pair.pred])
                .chain(&result.unmatched_gt)
                .chain(&result.unmatched_pred)
                .any(|element| element.is_ignored());
            assert!(!seen_ignored, "{method} leaked an ignored element");
        }
    }

    #[test]
    fn test_anno_id_and_geometry_agree() {
        let gt = vec![
            table(0, square(0.0, 0.0, 100.0)),
            table(1, square(200.0, 0.0, 100.0)),
            table(2, square(0.0, 200.0, 100.0)),
        ];
        let pred = vec![
            table(2, square(2.0, 201.0, 100.0)),
            table(0, square(1.0, 0.0, 100.0)),
            table(1, square(200.0, 3.0, 100.0)),
        ];
        let by_id = Matcher::new(MatcherConfig {
            method: MatchMethod::AnnoIdMatch,
            ..Default::default()
        })
        .match_elements(&gt, &pred)
        .all();
        let by_geometry = iou_matcher().match_elements(&gt, &pred).all();

        let ids = |set: &MatchSet| {
            let mut ids: Vec<_> = set
                .paired
                .iter()
                .map(|pair| (pair.gt.anno_id(), pair.pred.anno_id()))
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&by_id), ids(&by_geometry));
        assert!(
            by_id
                .paired
                .iter()
                .all(|pair| pair.gt.anno_id() == pair.pred.anno_id())
        );
        assert!(by_id.paired.iter().all(|pair| pair.iou.unwrap() > 0.9));
    }

    #[test]
    fn test_quick_match_prefers_anno_id() {
        // Same ids on both sides: geometry is not consulted at all.
        let gt = vec![table(0, square(0.0, 0.0, 10.0)), table(1, square(0.0, 0.0, 10.0))];
        let pred = vec![table(1, square(0.0, 0.0, 10.0)), table(0, square(90.0, 90.0, 5.0))];
        let result = Matcher::default().match_elements(&gt, &pred).all();

        assert_eq!(result.paired.len(), 2);
        for pair in &result.paired {
            assert_eq!(pair.gt.anno_id(), pair.pred.anno_id());
        }
        assert_eq!(result.paired[0].iou, Some(0.0));
    }

    #[test]
    fn test_greedy_iou_is_deterministic_with_ties() {
        // Two ground-truth boxes equally overlapping one prediction: the lower
        // anno_id wins the tie.
        let gt = vec![
            table(5, square(0.0, 0.0, 10.0)),
            table(3, square(0.0, 0.0, 10.0)),
        ];
        let pred = vec![
            Element::new("table").with_poly(square(0.0, 0.0, 10.0)),
            Element::new("table").with_poly(square(0.0, 0.0, 10.0)),
        ];
        let first = iou_matcher().match_elements(&gt, &pred);
        let second = iou_matcher().match_elements(&gt, &pred);
        assert_eq!(first, second);

        let pairs = first.all().paired;
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].gt.anno_id(), Some(3));
        assert_eq!(pairs[1].gt.anno_id(), Some(5));
        // The earlier prediction goes to the tie winner.
        assert_eq!(pairs[0].pred, pred[0]);
    }

    #[test]
    fn test_greedy_iou_picks_best_overlap_first() {
        let gt = vec![table(0, square(0.0, 0.0, 100.0))];
        let pred = vec![
            Element::new("table").with_poly(square(30.0, 0.0, 100.0)),
            Element::new("table").with_poly(square(5.0, 0.0, 100.0)),
        ];
        let result = iou_matcher().match_elements(&gt, &pred).all();
        assert_eq!(result.paired.len(), 1);
        assert_eq!(result.paired[0].pred, pred[1]);
        assert_eq!(result.unmatched_pred, vec![pred[0].clone()]);
    }

    #[test]
    fn test_iou_threshold_is_configurable() {
        // IoU of these boxes is 1/3
        let gt = vec![Element::new("table").with_poly(square(0.0, 0.0, 10.0))];
        let pred = vec![Element::new("table").with_poly(vec![
            5.0, 0.0, 15.0, 0.0, 15.0, 10.0, 5.0, 10.0,
        ])];
        let strict = Matcher::default().match_elements(&gt, &pred).all();
        assert!(strict.paired.is_empty());

        let loose = Matcher::new(
            MatcherConfigBuilder::default()
                .iou_threshold(0.3)
                .build()
                .unwrap(),
        )
        .match_elements(&gt, &pred)
        .all();
        assert_eq!(loose.paired.len(), 1);
    }

    #[test]
    fn test_degenerate_poly_only_pairs_by_anno_id() {
        let gt = vec![Element::new("figure").with_anno_id(4)];
        let pred = vec![Element::new("figure").with_anno_id(4)];
        let by_id = Matcher::default().match_elements(&gt, &pred).all();
        assert_eq!(by_id.paired.len(), 1);
        assert_eq!(by_id.paired[0].iou, None);

        let by_geometry = iou_matcher().match_elements(&gt, &pred).all();
        assert!(by_geometry.paired.is_empty());
        assert_eq!(by_geometry.unmatched_gt.len(), 1);
        assert_eq!(by_geometry.unmatched_pred.len(), 1);
    }

    #[test]
    fn test_malformed_poly_is_unmatched_not_fatal() {
        let gt = vec![
            Element::new("table").with_poly(vec![1.0, 2.0, 3.0]),
            Element::new("table").with_poly(square(0.0, 0.0, 10.0)),
        ];
        let pred = vec![Element::new("table").with_poly(square(0.0, 0.0, 10.0))];
        let result = Matcher::default().match_elements(&gt, &pred).all();
        assert_eq!(result.paired.len(), 1);
        assert_eq!(result.unmatched_gt.len(), 1);
        assert_eq!(result.unmatched_gt[0].poly().len(), 3);
    }

    #[test]
    fn test_malformed_poly_never_pairs_by_anno_id() {
        let gt = vec![table(1, vec![1.0, 2.0, 3.0]), table(2, square(0.0, 0.0, 10.0))];
        let pred = vec![table(1, vec![1.0, 2.0, 3.0]), table(2, square(0.0, 0.0, 10.0))];
        for method in [MatchMethod::QuickMatch, MatchMethod::AnnoIdMatch] {
            let result = Matcher::new(MatcherConfig {
                method,
                ..Default::default()
            })
            .match_elements(&gt, &pred)
            .all();
            assert_eq!(result.paired.len(), 1);
            assert_eq!(result.paired[0].gt.anno_id(), Some(2));
            assert_eq!(result.unmatched_gt.len(), 1);
            assert_eq!(result.unmatched_gt[0].anno_id(), Some(1));
            assert_eq!(result.unmatched_pred.len(), 1);
            assert_eq!(result.unmatched_pred[0].anno_id(), Some(1));
        }
    }

    #[test]
    fn test_match_samples_uses_layout_dets() {
        let gt = Sample::new(
            PageInfo::new("page.png"),
            vec![table(0, square(0.0, 0.0, 100.0)), Element::new("title").with_anno_id(5)],
        );
        let pred = Sample::new(PageInfo::new("page.png"), vec![table(0, square(0.0, 0.0, 100.0))]);
        let result = Matcher::default().match_samples(&gt, &pred);

        assert_eq!(result.categories.keys().collect::<Vec<_>>(), vec!["table", "title"]);
        assert_eq!(result.categories["table"].paired.len(), 1);
        assert_eq!(result.categories["title"].unmatched_gt.len(), 1);
    }

    #[test]
    fn test_anno_id_match_leaves_unknown_ids_unmatched() {
        let gt = vec![table(0, square(0.0, 0.0, 10.0)), table(1, square(0.0, 0.0, 10.0))];
        let pred = vec![table(1, square(0.0, 0.0, 10.0)), table(9, square(0.0, 0.0, 10.0))];
        let result = Matcher::new(MatcherConfig {
            method: MatchMethod::AnnoIdMatch,
            ..Default::default()
        })
        .match_elements(&gt, &pred)
        .all();
        assert_eq!(result.paired.len(), 1);
        assert_eq!(result.unmatched_gt[0].anno_id(), Some(0));
        assert_eq!(result.unmatched_pred[0].anno_id(), Some(9));
    }
}
