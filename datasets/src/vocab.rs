use std::collections::HashMap;

pub const PAD: &str = "<pad>";
pub const UNK: &str = "<unk>";
pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;

/// A bidirectional mapping between tokens and their ids.
///
/// Id 0 is always the padding token and id 1 the unknown token.
#[derive(Debug, Clone)]
pub struct Vocab {
    itos: Vec<String>,
    stoi: HashMap<String, u32>,
}

impl Vocab {
    /// Builds a vocabulary out of every token seen at least `min_freq` times.
    ///
    /// Tokens are ordered by decreasing frequency, ties broken alphabetically, so the
    /// same corpus always yields the same ids.
    pub fn build<'t, I>(tokens: I, min_freq: usize) -> Self
    where
        I: IntoIterator<Item = &'t str>,
    {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in tokens {
            *counts.entry(token).or_default() += 1;
        }

        let mut counted: Vec<_> = counts
            .into_iter()
            .filter(|&(token, count)| count >= min_freq.max(1) && token != PAD && token != UNK)
            .collect();
        counted.sort_by(|(a, ca), (b, cb)| cb.cmp(ca).then_with(|| a.cmp(b)));

        let itos: Vec<String> = [PAD, UNK]
            .into_iter()
            .chain(counted.into_iter().map(|(token, _)| token))
            .map(str::to_string)
            .collect();

        let stoi = itos
            .iter()
            .enumerate()
            .map(|(i, token)| (token.clone(), i as u32))
            .collect();

        Self { itos, stoi }
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    /// Returns the id of `token`, or the unknown id if it is not part of the vocabulary.
    pub fn id(&self, token: &str) -> u32 {
        self.stoi.get(token).copied().unwrap_or(UNK_ID)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.itos.get(id as usize).map(String::as_str)
    }

    pub fn tokens(&self) -> &[String] {
        &self.itos
    }
}
