//! Confusion-matrix derived classification metrics.

use ndarray::{Array2, ArrayView2, Axis};

/// Accuracy, precision, recall and F1 of a set of predictions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// The binary confusion counts of a single label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelCounts {
    pub tp: usize,
    pub fp: usize,
    pub fn_count: usize,
    pub tn: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 { num as f64 / den as f64 } else { 0.0 }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Counts every `(gold, predicted)` pair.
///
/// # Returns
/// A `(num_classes, num_classes)` matrix, rows indexed by the gold class and columns by
/// the predicted one.
///
/// # Panics
/// If `gold` and `pred` differ in length or hold a class out of range.
pub fn confusion_matrix(gold: &[usize], pred: &[usize], num_classes: usize) -> Array2<usize> {
    assert_eq!(gold.len(), pred.len(), "gold and pred must have same length");

    let mut matrix = Array2::zeros((num_classes, num_classes));
    for (&g, &p) in gold.iter().zip(pred) {
        matrix[[g, p]] += 1;
    }

    matrix
}

/// Computes the accuracy and the macro averaged precision, recall and F1 of a
/// single-label confusion matrix.
///
/// Classes that were never predicted (or never present) score 0 precision (or recall).
pub fn macro_metrics(matrix: ArrayView2<usize>) -> ClassificationMetrics {
    let classes = matrix.nrows();
    if classes == 0 {
        return ClassificationMetrics::default();
    }

    let gold_totals = matrix.sum_axis(Axis(1));
    let pred_totals = matrix.sum_axis(Axis(0));
    let correct: usize = matrix.diag().sum();

    let (mut precision, mut recall, mut f1_sum) = (0.0, 0.0, 0.0);
    for c in 0..classes {
        let p = ratio(matrix[[c, c]], pred_totals[c]);
        let r = ratio(matrix[[c, c]], gold_totals[c]);
        precision += p;
        recall += r;
        f1_sum += f1(p, r);
    }

    let n = classes as f64;
    ClassificationMetrics {
        accuracy: ratio(correct, matrix.sum()),
        precision: precision / n,
        recall: recall / n,
        f1: f1_sum / n,
    }
}

/// Counts the hits and misses of every label of a multilabel prediction.
///
/// # Arguments
/// * `gold` - The `(examples, labels)` gold label set.
/// * `pred` - The `(examples, labels)` predicted label set.
pub fn label_counts(gold: ArrayView2<bool>, pred: ArrayView2<bool>) -> Vec<LabelCounts> {
    assert_eq!(gold.dim(), pred.dim(), "gold and pred must have same shape");

    gold.axis_iter(Axis(1))
        .zip(pred.axis_iter(Axis(1)))
        .map(|(g, p)| {
            let mut counts = LabelCounts::default();
            for (&g, &p) in g.iter().zip(&p) {
                match (p, g) {
                    (true, true) => counts.tp += 1,
                    (true, false) => counts.fp += 1,
                    (false, true) => counts.fn_count += 1,
                    (false, false) => counts.tn += 1,
                }
            }
            counts
        })
        .collect()
}

/// Computes the exact-match accuracy and the micro averaged precision, recall and F1 of a
/// multilabel prediction.
pub fn micro_metrics(gold: ArrayView2<bool>, pred: ArrayView2<bool>) -> ClassificationMetrics {
    let counts = label_counts(gold, pred);
    let tp: usize = counts.iter().map(|c| c.tp).sum();
    let fp: usize = counts.iter().map(|c| c.fp).sum();
    let fn_count: usize = counts.iter().map(|c| c.fn_count).sum();

    let exact = gold
        .axis_iter(Axis(0))
        .zip(pred.axis_iter(Axis(0)))
        .filter(|(g, p)| g == p)
        .count();

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_count);

    ClassificationMetrics {
        accuracy: ratio(exact, gold.nrows()),
        precision,
        recall,
        f1: f1(precision, recall),
    }
}

/// The fraction of `(example, label)` pairs predicted wrong.
pub fn hamming_loss(gold: ArrayView2<bool>, pred: ArrayView2<bool>) -> f64 {
    let wrong = gold.iter().zip(&pred).filter(|(g, p)| g != p).count();
    ratio(wrong, gold.len())
}
