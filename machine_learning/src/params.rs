use std::ops::Range;

use crate::{MlErr, Result};

/// A named tensor living inside a flat parameter buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSlot {
    name: String,
    shape: Vec<usize>,
    offset: usize,
    trainable: bool,
}

impl ParamSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len()
    }

    pub fn trainable(&self) -> bool {
        self.trainable
    }
}

/// Describes how a model's parameters are laid out in a single `f32` buffer.
///
/// Slots are stored back to back in insertion order, so the layout of a model
/// is fully determined by the order in which its layers register themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamLayout {
    slots: Vec<ParamSlot>,
    size: usize,
}

impl ParamLayout {
    /// Creates a new empty `ParamLayout`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new slot at the end of the buffer.
    ///
    /// # Arguments
    /// * `name` - The unique name of the tensor.
    /// * `shape` - The shape of the tensor.
    /// * `trainable` - Whether the optimizer is allowed to update this tensor.
    ///
    /// # Returns
    /// The range this slot occupies in the flat buffer.
    pub fn push(&mut self, name: impl Into<String>, shape: &[usize], trainable: bool) -> Range<usize> {
        let slot = ParamSlot {
            name: name.into(),
            shape: shape.to_vec(),
            offset: self.size,
            trainable,
        };

        let range = slot.range();
        self.size = range.end;
        self.slots.push(slot);
        range
    }

    /// Returns the total amount of parameters.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    /// Looks up a slot by name.
    pub fn get(&self, name: &str) -> Result<&ParamSlot> {
        self.slots
            .iter()
            .find(|slot| slot.name == name)
            .ok_or_else(|| MlErr::MissingParam(name.to_string()))
    }

    /// Returns the ranges of the buffer the optimizer may update.
    pub fn trainable_ranges(&self) -> Vec<Range<usize>> {
        self.slots
            .iter()
            .filter(|slot| slot.trainable)
            .map(ParamSlot::range)
            .collect()
    }

    /// Returns the amount of parameters the optimizer may update.
    pub fn trainable_size(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.trainable)
            .map(ParamSlot::len)
            .sum()
    }
}

/// Walks a flat buffer front to back handing out consecutive chunks.
pub struct ParamCursor<'a> {
    rest: &'a [f32],
}

impl<'a> ParamCursor<'a> {
    pub fn new(params: &'a [f32]) -> Self {
        Self { rest: params }
    }

    /// Takes the next `n` parameters.
    ///
    /// # Returns
    /// The chunk or a `SizeMismatch` error if there are not enough parameters left.
    pub fn take(&mut self, n: usize) -> Result<&'a [f32]> {
        if n > self.rest.len() {
            return Err(MlErr::SizeMismatch {
                what: "parameter buffer",
                got: self.rest.len(),
                expected: n,
            });
        }

        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }
}

/// Mutable counterpart of `ParamCursor`, used for walking gradient buffers.
pub struct GradCursor<'a> {
    rest: &'a mut [f32],
}

impl<'a> GradCursor<'a> {
    pub fn new(grad: &'a mut [f32]) -> Self {
        Self { rest: grad }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a mut [f32]> {
        if n > self.rest.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient buffer",
                got: self.rest.len(),
                expected: n,
            });
        }

        let rest = std::mem::take(&mut self.rest);
        let (head, tail) = rest.split_at_mut(n);
        self.rest = tail;
        Ok(head)
    }
}
