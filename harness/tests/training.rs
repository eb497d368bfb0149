mod common;

use std::{cell::RefCell, collections::VecDeque, fs, path::Path};

use common::{mk_config, mk_dataset, mk_dir, mk_model, mk_multilabel_split, mk_optimizer};
use datasets::DatasetName;
use harness::{
    HarnessErr, Result,
    evaluation::{DiffTokenEvaluator, Evaluator, Scores},
    training::{DiffTokenTrainer, Trainer, TrainerFactory, TrainerState},
};
use machine_learning::arch::{HrCnn, Model, Persist};

/// Reports a scripted sequence of dev F1 values, one per call.
struct Scripted {
    f1s: RefCell<VecDeque<f64>>,
}

impl Scripted {
    fn new(f1s: &[f64]) -> Self {
        Self {
            f1s: RefCell::new(f1s.iter().copied().collect()),
        }
    }
}

impl Evaluator for Scripted {
    fn get_scores(&self, _: &dyn Model, _: Option<&Path>) -> Result<Scores> {
        let f1 = self.f1s.borrow_mut().pop_front().unwrap_or(0.0);
        Ok(Scores {
            values: vec![f1],
            names: vec!["f1"],
        })
    }
}

/// Counts how many times it is asked to score.
struct Counting<'a>(&'a RefCell<usize>);

impl Evaluator for Counting<'_> {
    fn get_scores(&self, _: &dyn Model, _: Option<&Path>) -> Result<Scores> {
        *self.0.borrow_mut() += 1;
        Ok(Scores {
            values: vec![0.0],
            names: vec!["f1"],
        })
    }
}

#[test]
fn stops_after_patience_non_improving_evaluations() {
    let (train, _, _) = mk_dataset();
    let dir = mk_dir("patience");
    let model = mk_model(3);
    let optimizer = mk_optimizer(&model);

    let mut trainer = DiffTokenTrainer::new(
        DatasetName::VulasDiff,
        model,
        optimizer,
        &train,
        mk_config(dir.clone(), 2),
        None,
        Box::new(Scripted::new(&[0.5, 0.6, 0.4, 0.6, 0.55, 0.9])),
    )
    .unwrap();

    let report = trainer.train(10).unwrap();

    assert_eq!(report.outcome, TrainerState::EarlyStopped);
    assert_eq!(trainer.state(), TrainerState::EarlyStopped);
    assert_eq!(report.epochs_run, 5);
    assert_eq!(report.best_epoch, Some(2));
    assert_eq!(report.best_dev_f1, 0.6);

    let improved: Vec<_> = report.history.iter().map(|e| e.improved).collect();
    assert_eq!(improved, vec![true, true, false, false, false]);

    let snapshot = trainer.snapshot_path();
    assert!(snapshot.is_file());
    assert!(snapshot.starts_with(dir.join("VulasDiff")));
    assert_eq!(snapshot.extension().unwrap(), "safetensors");

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn runs_every_epoch_while_improving() {
    let (train, _, _) = mk_dataset();
    let dir = mk_dir("completed");
    let model = mk_model(3);
    let optimizer = mk_optimizer(&model);

    let mut trainer = DiffTokenTrainer::new(
        DatasetName::VulasDiff,
        model,
        optimizer,
        &train,
        mk_config(dir.clone(), 0),
        None,
        Box::new(Scripted::new(&[0.1, 0.2, 0.3])),
    )
    .unwrap();

    assert_eq!(trainer.state(), TrainerState::Idle);
    let report = trainer.train(3).unwrap();

    assert_eq!(report.outcome, TrainerState::Completed);
    assert_eq!(report.epochs_run, 3);
    assert_eq!(report.best_epoch, Some(3));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn train_evaluator_runs_only_when_asked() {
    let (train, _, _) = mk_dataset();

    for evaluate_train in [false, true] {
        let dir = mk_dir(&format!("evaluate_train_{evaluate_train}"));
        let calls = RefCell::new(0);
        let model = mk_model(3);
        let optimizer = mk_optimizer(&model);
        let mut config = mk_config(dir.clone(), 5);
        config.evaluate_train = evaluate_train;

        let mut trainer = DiffTokenTrainer::new(
            DatasetName::VulasDiff,
            model,
            optimizer,
            &train,
            config,
            Some(Box::new(Counting(&calls))),
            Box::new(Scripted::new(&[0.1, 0.2])),
        )
        .unwrap();
        trainer.train(2).unwrap();
        drop(trainer);

        assert_eq!(*calls.borrow(), if evaluate_train { 2 } else { 0 });
        fs::remove_dir_all(dir).unwrap();
    }
}

#[test]
fn non_finite_losses_are_fatal() {
    let (train, _, _) = mk_dataset();
    let dir = mk_dir("non_finite");
    let mut model = mk_model(3);
    let fc = model.layout().get("fc.weight").unwrap().range();
    model.params_mut()[fc].fill(f32::NAN);
    let optimizer = mk_optimizer(&model);

    let mut trainer = DiffTokenTrainer::new(
        DatasetName::VulasDiff,
        model,
        optimizer,
        &train,
        mk_config(dir.clone(), 1),
        None,
        Box::new(Scripted::new(&[0.5])),
    )
    .unwrap();

    let err = trainer.train(1).unwrap_err();
    assert!(matches!(err, HarnessErr::NonFiniteLoss { epoch: 1, batch: 1 }));

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn unwritable_snapshot_directory_fails_before_training() {
    let (train, _, _) = mk_dataset();
    let dir = mk_dir("unwritable");
    fs::create_dir_all(&dir).unwrap();
    let blocker = dir.join("file");
    fs::write(&blocker, b"not a directory").unwrap();

    let model = mk_model(3);
    let optimizer = mk_optimizer(&model);
    let result = DiffTokenTrainer::new(
        DatasetName::VulasDiff,
        model,
        optimizer,
        &train,
        mk_config(blocker, 1),
        None,
        Box::new(Scripted::new(&[])),
    );

    assert!(matches!(result, Err(HarnessErr::Snapshot { .. })));
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn training_requires_a_dev_evaluator() {
    let (train, _, _) = mk_dataset();
    let model = mk_model(3);
    let optimizer = mk_optimizer(&model);

    let err = TrainerFactory::get_trainer(
        "VulasDiff",
        model,
        optimizer,
        &train,
        mk_config(mk_dir("no_dev"), 1),
        None,
        None,
    )
    .err()
    .unwrap();

    assert!(matches!(err, HarnessErr::InvalidConfig(_)));
}

#[test]
fn zero_batch_size_is_rejected() {
    let (train, _, _) = mk_dataset();
    let model = mk_model(3);
    let optimizer = mk_optimizer(&model);
    let mut config = mk_config(mk_dir("zero_batch"), 1);
    config.batch_size = 0;

    let result = DiffTokenTrainer::new(
        DatasetName::VulasDiff,
        model,
        optimizer,
        &train,
        config,
        None,
        Box::new(Scripted::new(&[])),
    );

    assert!(matches!(result, Err(HarnessErr::InvalidConfig(_))));
}

#[test]
fn zero_epochs_is_rejected() {
    let (train, _, _) = mk_dataset();
    let dir = mk_dir("zero_epochs");
    let model = mk_model(3);
    let optimizer = mk_optimizer(&model);

    let mut trainer = DiffTokenTrainer::new(
        DatasetName::VulasDiff,
        model,
        optimizer,
        &train,
        mk_config(dir.clone(), 1),
        None,
        Box::new(Scripted::new(&[0.5])),
    )
    .unwrap();

    let err = trainer.train(0).unwrap_err();
    assert!(matches!(err, HarnessErr::InvalidConfig(_)));
    assert_eq!(trainer.state(), TrainerState::Idle);
    assert!(!trainer.snapshot_path().exists());

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn trainers_sharing_a_directory_get_their_own_snapshot() {
    let (train, _, _) = mk_dataset();
    let dir = mk_dir("shared_dir");

    let mk_trainer = || {
        let model = mk_model(3);
        let optimizer = mk_optimizer(&model);
        DiffTokenTrainer::new(
            DatasetName::VulasDiff,
            model,
            optimizer,
            &train,
            mk_config(dir.clone(), 1),
            None,
            Box::new(Scripted::new(&[])),
        )
        .unwrap()
    };

    let first = mk_trainer();
    let second = mk_trainer();
    assert_ne!(first.snapshot_path(), second.snapshot_path());

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn multilabel_training_uses_binary_cross_entropy() {
    let train = mk_multilabel_split("train", 40, 0);
    let dev = mk_multilabel_split("dev", 10, 40);
    let dir = mk_dir("multilabel");
    let mut config = mk_config(dir.clone(), 2);
    config.is_multilabel = true;
    let eval_config = config.evaluator_config();

    let model = mk_model(5);
    let optimizer = mk_optimizer(&model);
    let dev_eval = DiffTokenEvaluator::new(&dev, 10, eval_config).unwrap();

    let mut trainer = DiffTokenTrainer::new(
        DatasetName::VulasDiff,
        model,
        optimizer,
        &train,
        config,
        None,
        Box::new(DiffTokenEvaluator::new(&dev, 10, eval_config).unwrap()),
    )
    .unwrap();

    let report = trainer.train(2).unwrap();

    assert!(report.history.iter().all(|e| e.train_loss.is_finite() && e.train_loss > 0.0));
    assert_eq!(report.history[0].batches, 4);
    assert_eq!(
        report.history[0].dev.names,
        vec!["accuracy", "precision", "recall", "f1", "hamming_loss", "avg_loss"]
    );
    assert!(report.best_epoch.is_some());

    let best = HrCnn::load(trainer.snapshot_path()).unwrap();
    let scores = dev_eval.get_scores(&best, None).unwrap();
    assert_eq!(scores.get("f1"), Some(report.best_dev_f1));

    fs::remove_dir_all(dir).unwrap();
}
