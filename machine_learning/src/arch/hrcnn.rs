use std::{collections::HashMap, fs, path::Path};

use ndarray::prelude::*;
use rand::{Rng, rngs::StdRng};
use safetensors::{Dtype, SafeTensors, tensor::TensorView};
use serde::{Deserialize, Serialize};

use super::{
    Model, Persist,
    layers::{Conv1d, ConvTrace, Dense, Dropout, Embedding},
    loss::LossFn,
};
use crate::{
    MlErr, Result,
    initialization::ParamInit,
    params::{GradCursor, ParamCursor, ParamLayout},
};

const CONFIG_KEY: &str = "config";
const EMBEDDING_INIT: ParamInit = ParamInit::Uniform {
    low: -0.25,
    high: 0.25,
};

/// Whether the word embeddings are updated during training.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingMode {
    #[default]
    Static,
    NonStatic,
}

/// Hyperparameters of an `HrCnn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrCnnConfig {
    /// Vocabulary size.
    pub words_num: usize,
    /// Word embedding size.
    pub words_dim: usize,
    /// Output channels of every convolution.
    pub output_channel: usize,
    /// Window widths, one convolution per width at each level.
    pub kernel_sizes: Vec<usize>,
    /// Amount of classes.
    pub target_class: usize,
    /// Dropout probability applied to the document features.
    pub dropout: f32,
    pub mode: EmbeddingMode,
}

impl Default for HrCnnConfig {
    fn default() -> Self {
        Self {
            words_num: 2,
            words_dim: 300,
            output_channel: 100,
            kernel_sizes: vec![3, 4, 5],
            target_class: 2,
            dropout: 0.5,
            mode: EmbeddingMode::Static,
        }
    }
}

impl HrCnnConfig {
    /// Returns the size of both the line and the document feature vectors.
    pub fn feature_dim(&self) -> usize {
        self.kernel_sizes.len() * self.output_channel
    }

    /// Checks every size is positive and the dropout probability lies in `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("words_num", self.words_num),
            ("words_dim", self.words_dim),
            ("output_channel", self.output_channel),
            ("target_class", self.target_class),
        ];

        if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(MlErr::InvalidConfig(format!("{name} must be greater than 0")));
        }

        if self.kernel_sizes.is_empty() || self.kernel_sizes.contains(&0) {
            return Err(MlErr::InvalidConfig(format!(
                "kernel sizes must be a non-empty list of positive widths, got {:?}",
                self.kernel_sizes
            )));
        }

        if !(0.0..1.0).contains(&self.dropout) {
            return Err(MlErr::InvalidConfig(format!(
                "dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }

        Ok(())
    }
}

/// Hierarchical convolutional classifier.
///
/// Every line of a document is embedded token by token and encoded by a bank of
/// convolutions max-pooled over time. The resulting line vectors are encoded the same
/// way by a second bank of convolutions, and the document vector goes through dropout
/// and a fully connected layer producing one logit per class.
#[derive(Debug, Clone)]
pub struct HrCnn {
    config: HrCnnConfig,
    embedding: Embedding,
    sentence_convs: Vec<Conv1d>,
    document_convs: Vec<Conv1d>,
    dropout: Dropout,
    fc: Dense,
    layout: ParamLayout,
    params: Vec<f32>,
}

/// The parameter (or gradient) chunk of every layer.
struct Parts<T> {
    embedding: T,
    sentence: Vec<T>,
    document: Vec<T>,
    fc: T,
}

struct DocTrace {
    sentences: Vec<Vec<ConvTrace>>,
    convs: Vec<ConvTrace>,
    features: Array1<f32>,
}

impl HrCnn {
    /// Creates a new randomly initialized `HrCnn`.
    ///
    /// # Arguments
    /// * `config` - The model's hyperparameters.
    /// * `pretrained` - An optional `(words_num, words_dim)` embedding matrix to start from.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// The model, or an error if the config is invalid or the embedding has the wrong shape.
    pub fn new<R: Rng + ?Sized>(
        config: HrCnnConfig,
        pretrained: Option<ArrayView2<f32>>,
        rng: &mut R,
    ) -> Result<Self> {
        let (mut model, inits) = Self::build(config)?;

        for (slot, init) in model.layout.slots().iter().zip(inits) {
            init.fill(rng, &mut model.params[slot.range()])?;
        }

        if let Some(table) = pretrained {
            model.set_embedding(table)?;
        }

        Ok(model)
    }

    /// Lays out the layers of the model with zeroed parameters.
    ///
    /// # Returns
    /// The model and the initialization of every slot, in layout order.
    fn build(config: HrCnnConfig) -> Result<(Self, Vec<ParamInit>)> {
        config.validate()?;

        let feat = config.feature_dim();
        let channels = config.output_channel;
        let embedding = Embedding::new(config.words_num, config.words_dim);
        let sentence_convs: Vec<_> = config
            .kernel_sizes
            .iter()
            .map(|&k| Conv1d::new(k, config.words_dim, channels))
            .collect();
        let document_convs: Vec<_> = config
            .kernel_sizes
            .iter()
            .map(|&k| Conv1d::new(k, feat, channels))
            .collect();
        let fc = Dense::new((feat, config.target_class));

        let mut layout = ParamLayout::new();
        let mut inits = Vec::new();

        layout.push(
            "embedding",
            &[config.words_num, config.words_dim],
            config.mode == EmbeddingMode::NonStatic,
        );
        inits.push(EMBEDDING_INIT);

        let banks = [("sentence_conv", &sentence_convs), ("document_conv", &document_convs)];
        for (prefix, convs) in banks {
            for (i, conv) in convs.iter().enumerate() {
                let (w_shape, b_shape) = conv.param_shapes();
                layout.push(format!("{prefix}{i}.weight"), &w_shape, true);
                layout.push(format!("{prefix}{i}.bias"), &b_shape, true);
                inits.push(ParamInit::LecunUniform { fan_in: w_shape[0] });
                inits.push(ParamInit::Const { value: 0.0 });
            }
        }

        layout.push("fc.weight", &[feat, config.target_class], true);
        layout.push("fc.bias", &[config.target_class], true);
        inits.push(ParamInit::XavierUniform {
            fan_in: feat,
            fan_out: config.target_class,
        });
        inits.push(ParamInit::Const { value: 0.0 });

        let model = Self {
            dropout: Dropout::new(config.dropout),
            params: vec![0.0; layout.size()],
            config,
            embedding,
            sentence_convs,
            document_convs,
            fc,
            layout,
        };

        Ok((model, inits))
    }

    pub fn config(&self) -> &HrCnnConfig {
        &self.config
    }

    /// Overwrites the embedding table.
    pub fn set_embedding(&mut self, table: ArrayView2<f32>) -> Result<()> {
        let expected = (self.config.words_num, self.config.words_dim);
        if table.dim() != expected {
            return Err(MlErr::SizeMismatch {
                what: "pretrained embedding rows",
                got: table.nrows(),
                expected: expected.0,
            });
        }

        let range = self.layout.get("embedding")?.range();
        for (p, &v) in self.params[range].iter_mut().zip(table.iter()) {
            *p = v;
        }

        Ok(())
    }

    /// Serializes the model into the safetensors format, its config stored as metadata.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let config = serde_json::to_string(&self.config)?;
        let metadata = HashMap::from([(CONFIG_KEY.to_string(), config)]);

        let tensors = self
            .layout
            .slots()
            .iter()
            .map(|slot| {
                let data: &[u8] = bytemuck::cast_slice(&self.params[slot.range()]);
                let view = TensorView::new(Dtype::F32, slot.shape().to_vec(), data)?;
                Ok((slot.name().to_string(), view))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(safetensors::serialize(tensors, &Some(metadata))?)
    }

    /// Deserializes a model written with `to_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (_, metadata) = SafeTensors::read_metadata(bytes)?;
        let config = metadata
            .metadata()
            .as_ref()
            .and_then(|m| m.get(CONFIG_KEY))
            .ok_or_else(|| MlErr::Snapshot("the snapshot carries no model config".into()))?;
        let config: HrCnnConfig = serde_json::from_str(config)?;

        let (mut model, _) = Self::build(config)?;
        let tensors = SafeTensors::deserialize(bytes)?;
        let Self { layout, params, .. } = &mut model;

        for slot in layout.slots() {
            let view = tensors
                .tensor(slot.name())
                .map_err(|_| MlErr::MissingParam(slot.name().to_string()))?;

            if view.dtype() != Dtype::F32 || view.shape() != slot.shape() {
                return Err(MlErr::Snapshot(format!(
                    "`{}` should be an F32 tensor of shape {:?}, got {:?} of shape {:?}",
                    slot.name(),
                    slot.shape(),
                    view.dtype(),
                    view.shape()
                )));
            }

            for (p, chunk) in params[slot.range()]
                .iter_mut()
                .zip(view.data().chunks_exact(4))
            {
                *p = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
        }

        Ok(model)
    }

    fn split_params<'p>(&self, params: &'p [f32]) -> Result<Parts<&'p [f32]>> {
        let mut cursor = ParamCursor::new(params);

        Ok(Parts {
            embedding: cursor.take(self.embedding.size())?,
            sentence: self
                .sentence_convs
                .iter()
                .map(|conv| cursor.take(conv.size()))
                .collect::<Result<_>>()?,
            document: self
                .document_convs
                .iter()
                .map(|conv| cursor.take(conv.size()))
                .collect::<Result<_>>()?,
            fc: cursor.take(self.fc.size())?,
        })
    }

    fn split_grad<'g>(&self, grad: &'g mut [f32]) -> Result<Parts<&'g mut [f32]>> {
        let mut cursor = GradCursor::new(grad);

        Ok(Parts {
            embedding: cursor.take(self.embedding.size())?,
            sentence: self
                .sentence_convs
                .iter()
                .map(|conv| cursor.take(conv.size()))
                .collect::<Result<_>>()?,
            document: self
                .document_convs
                .iter()
                .map(|conv| cursor.take(conv.size()))
                .collect::<Result<_>>()?,
            fc: cursor.take(self.fc.size())?,
        })
    }

    fn encode(&self, parts: &Parts<&[f32]>, doc: ArrayView2<u32>) -> Result<DocTrace> {
        if doc.is_empty() {
            return Err(MlErr::SizeMismatch {
                what: "document tokens",
                got: 0,
                expected: 1,
            });
        }

        let channels = self.config.output_channel;
        let mut lines = Array2::zeros((doc.nrows(), self.config.feature_dim()));
        let mut sentences = Vec::with_capacity(doc.nrows());

        for (row, ids) in doc.axis_iter(Axis(0)).enumerate() {
            let embedded = self.embedding.forward(parts.embedding, ids)?;
            let mut traces = Vec::with_capacity(self.sentence_convs.len());

            for (i, (conv, p)) in self.sentence_convs.iter().zip(&parts.sentence).enumerate() {
                let (h, trace) = conv.forward(p, embedded.view())?;
                lines
                    .slice_mut(s![row, i * channels..(i + 1) * channels])
                    .assign(&h);
                traces.push(trace);
            }

            sentences.push(traces);
        }

        let mut features = Array1::zeros(self.config.feature_dim());
        let mut convs = Vec::with_capacity(self.document_convs.len());

        for (i, (conv, p)) in self.document_convs.iter().zip(&parts.document).enumerate() {
            let (h, trace) = conv.forward(p, lines.view())?;
            features
                .slice_mut(s![i * channels..(i + 1) * channels])
                .assign(&h);
            convs.push(trace);
        }

        Ok(DocTrace {
            sentences,
            convs,
            features,
        })
    }

    fn backprop_document(
        &self,
        parts: &Parts<&[f32]>,
        grads: &mut Parts<&mut [f32]>,
        doc: ArrayView2<u32>,
        trace: &DocTrace,
        dfeatures: ArrayView1<f32>,
    ) -> Result<()> {
        let channels = self.config.output_channel;
        let mut dlines = Array2::zeros((doc.nrows(), self.config.feature_dim()));

        for (i, (conv, conv_trace)) in self.document_convs.iter().zip(&trace.convs).enumerate() {
            let dh = dfeatures.slice(s![i * channels..(i + 1) * channels]);
            dlines += &conv.backward(parts.document[i], &mut *grads.document[i], conv_trace, dh)?;
        }

        let trainable = self.config.mode == EmbeddingMode::NonStatic;

        for ((ids, dline), traces) in doc
            .axis_iter(Axis(0))
            .zip(dlines.axis_iter(Axis(0)))
            .zip(&trace.sentences)
        {
            let mut dembedded = Array2::zeros((ids.len(), self.config.words_dim));

            for (i, (conv, conv_trace)) in self.sentence_convs.iter().zip(traces).enumerate() {
                let dh = dline.slice(s![i * channels..(i + 1) * channels]);
                dembedded +=
                    &conv.backward(parts.sentence[i], &mut *grads.sentence[i], conv_trace, dh)?;
            }

            if trainable {
                self.embedding
                    .backward(&mut *grads.embedding, ids, dembedded.view())?;
            }
        }

        Ok(())
    }
}

impl Model for HrCnn {
    fn size(&self) -> usize {
        self.layout.size()
    }

    fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    fn num_classes(&self) -> usize {
        self.config.target_class
    }

    fn forward(&self, docs: &[ArrayView2<u32>]) -> Result<Array2<f32>> {
        let parts = self.split_params(&self.params)?;
        let mut features = Array2::zeros((docs.len(), self.config.feature_dim()));

        for (mut row, doc) in features.axis_iter_mut(Axis(0)).zip(docs) {
            row.assign(&self.encode(&parts, doc.view())?.features);
        }

        self.fc.forward(parts.fc, features.view())
    }

    fn backprop(
        &self,
        docs: &[ArrayView2<u32>],
        y: ArrayView2<f32>,
        loss_fn: &dyn LossFn,
        grad: &mut [f32],
        rng: &mut StdRng,
    ) -> Result<f32> {
        if y.dim() != (docs.len(), self.config.target_class) {
            return Err(MlErr::SizeMismatch {
                what: "label rows",
                got: y.nrows(),
                expected: docs.len(),
            });
        }

        grad.fill(0.0);
        let parts = self.split_params(&self.params)?;
        let mut grads = self.split_grad(grad)?;

        let feat = self.config.feature_dim();
        let mut features = Array2::zeros((docs.len(), feat));
        let mut traces = Vec::with_capacity(docs.len());
        let mut masks = Vec::with_capacity(docs.len());

        for (mut row, doc) in features.axis_iter_mut(Axis(0)).zip(docs) {
            let trace = self.encode(&parts, doc.view())?;
            let mask = self.dropout.mask(rng, feat);
            row.assign(&(&trace.features * &mask));
            traces.push(trace);
            masks.push(mask);
        }

        let logits = self.fc.forward(parts.fc, features.view())?;
        let loss = loss_fn.loss(logits.view(), y);
        let d = loss_fn.loss_prime(logits.view(), y);
        let dfeatures = self
            .fc
            .backward(parts.fc, &mut *grads.fc, features.view(), d.view())?;

        for (((doc, trace), mask), dfeat) in docs
            .iter()
            .zip(&traces)
            .zip(&masks)
            .zip(dfeatures.axis_iter(Axis(0)))
        {
            let dfeat = &dfeat * mask;
            self.backprop_document(&parts, &mut grads, doc.view(), trace, dfeat.view())?;
        }

        Ok(loss)
    }
}

impl Persist for HrCnn {
    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        log::debug!("saved {} parameters to {}", self.size(), path.display());
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arch::loss::{BceWithLogits, CrossEntropy},
        optimization::{Adam, Optimizer},
    };
    use rand::SeedableRng;

    fn tiny_config(mode: EmbeddingMode) -> HrCnnConfig {
        HrCnnConfig {
            words_num: 6,
            words_dim: 4,
            output_channel: 3,
            kernel_sizes: vec![1, 2],
            target_class: 2,
            dropout: 0.0,
            mode,
        }
    }

    fn tiny_docs() -> Vec<Array2<u32>> {
        vec![
            array![[2, 3, 0], [3, 3, 2]],
            array![[4, 5, 5], [5, 4, 0], [4, 0, 0]],
            array![[2, 2, 3]],
            array![[5, 5, 4], [4, 4, 0]],
        ]
    }

    #[test]
    fn layout_covers_every_layer() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = HrCnn::new(tiny_config(EmbeddingMode::Static), None, &mut rng).unwrap();

        let layout = model.layout();
        assert_eq!(layout.slots().len(), 1 + 4 + 4 + 2);
        assert!(!layout.get("embedding").unwrap().trainable());
        assert_eq!(layout.get("document_conv1.weight").unwrap().shape(), &[12, 3]);
        assert_eq!(layout.trainable_size(), model.size() - 6 * 4);
    }

    #[test]
    fn forward_scores_every_document() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = HrCnn::new(tiny_config(EmbeddingMode::Static), None, &mut rng).unwrap();
        let docs = tiny_docs();
        let views: Vec<_> = docs.iter().map(|d| d.view()).collect();

        let logits = model.forward(&views).unwrap();
        assert_eq!(logits.dim(), (4, 2));
        assert!(logits.iter().all(|z| z.is_finite()));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut rng = StdRng::seed_from_u64(0);

        let mut config = tiny_config(EmbeddingMode::Static);
        config.kernel_sizes.clear();
        assert!(HrCnn::new(config, None, &mut rng).is_err());

        let mut config = tiny_config(EmbeddingMode::Static);
        config.dropout = 1.0;
        assert!(HrCnn::new(config, None, &mut rng).is_err());
    }

    #[test]
    fn pretrained_embedding_must_match_vocabulary() {
        let mut rng = StdRng::seed_from_u64(0);
        let table = Array2::ones((5, 4));
        let config = tiny_config(EmbeddingMode::Static);
        assert!(HrCnn::new(config, Some(table.view()), &mut rng).is_err());
    }

    #[test]
    fn static_embedding_gets_no_gradient() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = HrCnn::new(tiny_config(EmbeddingMode::Static), None, &mut rng).unwrap();
        let docs = tiny_docs();
        let views: Vec<_> = docs.iter().map(|d| d.view()).collect();
        let y = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];

        let mut grad = vec![1.0; model.size()];
        model
            .backprop(&views, y.view(), &CrossEntropy, &mut grad, &mut rng)
            .unwrap();

        let range = model.layout().get("embedding").unwrap().range();
        assert!(grad[range].iter().all(|&g| g == 0.0));
        let fc = model.layout().get("fc.bias").unwrap().range();
        assert!(grad[fc].iter().any(|&g| g != 0.0));
    }

    #[test]
    fn fc_gradient_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut model = HrCnn::new(tiny_config(EmbeddingMode::NonStatic), None, &mut rng).unwrap();
        let docs = tiny_docs();
        let views: Vec<_> = docs.iter().map(|d| d.view()).collect();
        let y = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];

        let mut grad = vec![0.0; model.size()];
        model
            .backprop(&views, y.view(), &CrossEntropy, &mut grad, &mut rng)
            .unwrap();

        // the classifier head is smooth in its own parameters
        let range = model.layout().get("fc.weight").unwrap().range();
        let eps = 1e-2;
        for i in range {
            let saved = model.params()[i];

            model.params_mut()[i] = saved + eps;
            let plus = CrossEntropy.loss(model.forward(&views).unwrap().view(), y.view());
            model.params_mut()[i] = saved - eps;
            let minus = CrossEntropy.loss(model.forward(&views).unwrap().view(), y.view());
            model.params_mut()[i] = saved;

            let numeric = (plus - minus) / (2.0 * eps);
            assert!((numeric - grad[i]).abs() < 1e-3, "{i}: {numeric} vs {}", grad[i]);
        }
    }

    #[test]
    fn training_lowers_the_loss() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut model = HrCnn::new(tiny_config(EmbeddingMode::NonStatic), None, &mut rng).unwrap();
        let docs = tiny_docs();
        let views: Vec<_> = docs.iter().map(|d| d.view()).collect();
        let y = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];

        let before = CrossEntropy.loss(model.forward(&views).unwrap().view(), y.view());

        let mut optimizer = Adam::new(model.layout().trainable_ranges(), model.size(), 0.05, 0.0);
        let mut grad = vec![0.0; model.size()];
        for _ in 0..50 {
            model
                .backprop(&views, y.view(), &CrossEntropy, &mut grad, &mut rng)
                .unwrap();
            optimizer.update_params(&grad, model.params_mut()).unwrap();
        }

        let after = CrossEntropy.loss(model.forward(&views).unwrap().view(), y.view());
        assert!(after < before, "{after} >= {before}");
    }

    #[test]
    fn multilabel_loss_backpropagates() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = HrCnn::new(tiny_config(EmbeddingMode::NonStatic), None, &mut rng).unwrap();
        let docs = tiny_docs();
        let views: Vec<_> = docs.iter().map(|d| d.view()).collect();
        let y = array![[1.0, 1.0], [0.0, 1.0], [0.0, 0.0], [1.0, 0.0]];

        let mut grad = vec![0.0; model.size()];
        let loss = model
            .backprop(&views, y.view(), &BceWithLogits, &mut grad, &mut rng)
            .unwrap();

        assert!(loss.is_finite());
        assert!(grad.iter().any(|&g| g != 0.0));
    }

    #[test]
    fn snapshot_round_trip_restores_parameters() {
        let mut rng = StdRng::seed_from_u64(9);
        let model = HrCnn::new(tiny_config(EmbeddingMode::NonStatic), None, &mut rng).unwrap();

        let restored = HrCnn::from_bytes(&model.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.config(), model.config());
        assert_eq!(restored.params(), model.params());
    }

    #[test]
    fn garbage_snapshot_fails() {
        assert!(HrCnn::from_bytes(b"not a snapshot").is_err());
    }
}
