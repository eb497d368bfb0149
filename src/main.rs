mod args;
mod config;
mod device;

use std::path::Path;

use anyhow::{Context, ensure};
use clap::Parser;
use datasets::{DataSplit, DatasetName};
use harness::{evaluation::EvaluatorFactory, training::TrainerFactory};
use log::info;
use machine_learning::{
    arch::{HrCnn, Model, Persist},
    initialization::UnkVecCache,
    optimization::Adam,
};
use rand::{SeedableRng, rngs::StdRng};

use args::Args;
use config::RunConfig;
use device::Device;

fn load_model(path: &Path, config: &RunConfig) -> anyhow::Result<HrCnn> {
    let model =
        HrCnn::load(path).with_context(|| format!("cannot load model from {}", path.display()))?;

    ensure!(
        model.config().words_num == config.words_num,
        "{} was trained over {} words but the vocabulary has {}",
        path.display(),
        model.config().words_num,
        config.words_num
    );
    ensure!(
        model.num_classes() == config.target_class,
        "{} scores {} classes but {} has {}",
        path.display(),
        model.num_classes(),
        config.dataset,
        config.target_class
    );

    info!("loaded model from {}", path.display());
    Ok(model)
}

fn evaluate_dataset(
    split_name: &str,
    split: &DataSplit,
    model: &HrCnn,
    config: &RunConfig,
) -> anyhow::Result<()> {
    let evaluator = EvaluatorFactory::get_evaluator(
        &config.args.dataset,
        split,
        config.args.batch_size,
        config.evaluator_config(),
    )?;

    let output = config.args.matrix_path.join(split_name);
    let scores = evaluator.get_scores(model, Some(&output))?;

    println!("Evaluation metrics for {split_name}");
    println!("{:?}", scores.names);
    println!("{:?}", scores.values);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut unk = UnkVecCache::new(args.seed);

    let device = Device::requested(args.cuda, args.gpu).resolve();
    info!("running on {device}");

    let dataset: DatasetName = args.dataset.parse()?;
    let splits = dataset
        .load(&args.data_dir, &args.load_options(), &mut unk)
        .with_context(|| format!("cannot load {dataset} from {}", args.data_dir.display()))?;

    println!("Dataset: {}", args.dataset);
    println!("No. of target classes: {}", dataset.num_classes());
    println!("No. of train instances: {}", splits.train.len());
    println!("No. of dev instances: {}", splits.dev.len());
    println!("No. of test instances: {}", splits.test.len());

    let config = RunConfig::new(args, dataset, &splits);

    let best = match &config.args.trained_model {
        Some(path) => load_model(path, &config)?,
        None => {
            let model = match &config.args.resume_snapshot {
                Some(path) => load_model(path, &config)?,
                None => HrCnn::new(
                    config.model_config(),
                    splits.embedding.as_ref().map(|table| table.view()),
                    &mut rng,
                )?,
            };

            let optimizer = Adam::new(
                model.layout().trainable_ranges(),
                model.size(),
                config.args.lr,
                config.args.weight_decay,
            );

            let name = config.args.dataset.as_str();
            let batch_size = config.args.batch_size;
            let eval_config = config.evaluator_config();
            let train_evaluator =
                EvaluatorFactory::get_evaluator(name, &splits.train, batch_size, eval_config)?;
            let dev_evaluator =
                EvaluatorFactory::get_evaluator(name, &splits.dev, batch_size, eval_config)?;

            let mut trainer = TrainerFactory::get_trainer(
                name,
                model,
                optimizer,
                &splits.train,
                config.trainer_config(),
                Some(train_evaluator),
                Some(dev_evaluator),
            )?;

            let report = trainer.train(config.args.epochs)?;
            info!(
                "finished after {} epochs ({:?}), best dev f1 {:.4} at epoch {:?}",
                report.epochs_run,
                report.outcome,
                report.best_dev_f1,
                report.best_epoch
            );

            ensure!(
                report.best_epoch.is_some(),
                "training never produced a snapshot to evaluate"
            );
            load_model(trainer.snapshot_path(), &config)?
        }
    };

    evaluate_dataset("dev", &splits.dev, &best, &config)?;
    evaluate_dataset("test", &splits.test, &best, &config)?;

    Ok(())
}
