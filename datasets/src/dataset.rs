/// A single tokenized document and its gold label.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    lines: Vec<Vec<u32>>,
    label: Vec<f32>,
}

impl Example {
    /// Creates a new example.
    ///
    /// # Arguments
    /// * `lines` - The token ids of every line of the document.
    /// * `label` - The one-hot (or multi-hot) gold label.
    ///
    /// # Panics
    /// - if `lines` is empty
    /// - if any line is empty
    pub fn new(lines: Vec<Vec<u32>>, label: Vec<f32>) -> Self {
        assert!(!lines.is_empty(), "a document must have at least one line");
        assert!(
            lines.iter().all(|line| !line.is_empty()),
            "a line must have at least one token"
        );
        Self { lines, label }
    }

    #[inline]
    pub fn lines(&self) -> &[Vec<u32>] {
        &self.lines
    }

    #[inline]
    pub fn label(&self) -> &[f32] {
        &self.label
    }

    /// Returns the length of the longest line.
    #[inline]
    pub fn max_tokens(&self) -> usize {
        self.lines.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// One split (train, dev or test) of a dataset, fully held in memory.
#[derive(Debug, Clone)]
pub struct DataSplit {
    name: String,
    examples: Vec<Example>,
    num_classes: usize,
    is_multilabel: bool,
}

impl DataSplit {
    /// Creates a new split.
    ///
    /// # Panics
    /// If the label of any example is not `num_classes` long.
    pub fn new(
        name: impl Into<String>,
        examples: Vec<Example>,
        num_classes: usize,
        is_multilabel: bool,
    ) -> Self {
        assert!(
            examples.iter().all(|ex| ex.label().len() == num_classes),
            "every label must have num_classes entries"
        );

        Self {
            name: name.into(),
            examples,
            num_classes,
            is_multilabel,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    #[inline]
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Returns the example at `idx` (panics if out of bounds).
    #[inline]
    pub fn get(&self, idx: usize) -> &Example {
        &self.examples[idx]
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    #[inline]
    pub fn is_multilabel(&self) -> bool {
        self.is_multilabel
    }
}
