use crate::features::Features;
use crate::transforms::Transform;
use anyhow::{anyhow, ensure, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tch::Tensor;
use tokenizers::models::bpe::{BpeTrainerBuilder, BPE};
use tokenizers::normalizers::NormalizerWrapper;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;
use tokenizers::processors::PostProcessorWrapper;
use tokenizers::{AddedToken, Tokenizer, TokenizerBuilder, TokenizerImpl};
use tracing::{debug, info};

pub const PAD_ID: i64 = 0;
pub const BOS_ID: i64 = 1;
pub const EOS_ID: i64 = 2;

pub const PAD_TOKEN: &str = "[PAD]";
pub const BOS_TOKEN: &str = "[BOS]";
pub const EOS_TOKEN: &str = "[EOS]";

/// Field holding token ids. Every other field is treated as a mask.
pub const INPUT_IDS: &str = "input_ids";
pub const ATTENTION_MASK: &str = "attention_mask";

/// Turns a batch of target strings into per-field token sequences.
///
/// The result maps a field name (at least `"input_ids"`) to one sequence per target, in input
/// order. Boundary tokens are not expected here; [`TokenizeTargets`] adds them.
pub trait TargetTokenizer: Send + Sync {
    fn tokenize(&self, targets: &[String]) -> Result<BTreeMap<String, Vec<Vec<i64>>>>;
}

impl TargetTokenizer for Tokenizer {
    fn tokenize(&self, targets: &[String]) -> Result<BTreeMap<String, Vec<Vec<i64>>>> {
        let encodings = self
            .encode_batch(targets.to_vec(), false)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let convert = |data: &[u32]| data.iter().map(|&x| i64::from(x)).collect::<Vec<_>>();
        let ids = encodings.iter().map(|e| convert(e.get_ids())).collect();
        let mask = encodings
            .iter()
            .map(|e| convert(e.get_attention_mask()))
            .collect();

        Ok(BTreeMap::from([
            (INPUT_IDS.to_string(), ids),
            (ATTENTION_MASK.to_string(), mask),
        ]))
    }
}

/// Clears any padding or truncation stored in a tokenizer artifact.
///
/// [`TokenizeTargets`] appends `[EOS]` after the last id, so sequences must come back at their
/// natural length. Padding to the batch maximum happens after the boundary tokens are added.
pub fn unpadded(mut tokenizer: Tokenizer) -> Result<Tokenizer> {
    if tokenizer.get_padding().is_some() || tokenizer.get_truncation().is_some() {
        debug!("Clearing padding and truncation configured in the tokenizer");
    }
    tokenizer
        .with_padding(None)
        .with_truncation(None)
        .map_err(|e| anyhow!("Failed to clear tokenizer truncation: {}", e))?;
    Ok(tokenizer)
}

/// ===========================================================================
/// Tokenizes all targets of a batch in one call and wraps each sequence in boundary tokens.
///
/// `"input_ids"` sequences become `[BOS] ids.. [EOS]`; every other field gets a `1` on both
/// ends so the mask covers the boundary tokens. Output is one [`Features`] per target, still
/// unpadded.
///
/// # Example
/// ```ignore
/// let tokenizer = Tokenizer::from_file("tokenizer.json")?;
/// let features = TokenizeTargets::new(&tokenizer).apply(vec!["x^2".into()])?;
/// // input_ids: [1, 4, 5, 6, 2]
/// ```
pub struct TokenizeTargets<'a> {
    tokenizer: &'a dyn TargetTokenizer,
}

impl<'a> TokenizeTargets<'a> {
    pub fn new(tokenizer: &'a dyn TargetTokenizer) -> Self {
        Self { tokenizer }
    }
}

impl Transform<Vec<String>, Vec<Features>> for TokenizeTargets<'_> {
    fn apply(&self, targets: Vec<String>) -> Result<Vec<Features>> {
        let fields = self.tokenizer.tokenize(&targets)?;
        ensure!(
            fields.contains_key(INPUT_IDS),
            "Tokenizer output has no '{}' field",
            INPUT_IDS
        );

        let mut per_sample: Vec<Features> = (0..targets.len())
            .map(|_| Features::new(Default::default()))
            .collect();

        for (name, sequences) in fields {
            ensure!(
                sequences.len() == targets.len(),
                "Tokenizer returned {} '{}' sequences for {} targets",
                sequences.len(),
                name,
                targets.len()
            );
            let (start, end) = if name == INPUT_IDS {
                (BOS_ID, EOS_ID)
            } else {
                (1, 1)
            };
            for (features, seq) in per_sample.iter_mut().zip(sequences) {
                let mut wrapped = Vec::with_capacity(seq.len() + 2);
                wrapped.push(start);
                wrapped.extend(seq);
                wrapped.push(end);
                features
                    .features
                    .insert(name.clone(), Tensor::from_slice(&wrapped));
            }
        }
        Ok(per_sample)
    }
}

/// Trains a byte-level BPE tokenizer on a line-per-target file and writes it to `output`.
///
/// `[PAD]`, `[BOS]` and `[EOS]` are registered first, so they receive ids 0, 1 and 2.
pub fn generate_tokenizer(targets: &Path, output: &Path, vocab_size: usize) -> Result<()> {
    ensure!(
        vocab_size > 3,
        "vocab_size must leave room beyond the special tokens (got {})",
        vocab_size
    );
    let mut trainer = BpeTrainerBuilder::new()
        .show_progress(true)
        .vocab_size(vocab_size)
        .min_frequency(0)
        .special_tokens(vec![
            AddedToken::from(PAD_TOKEN, true),
            AddedToken::from(BOS_TOKEN, true),
            AddedToken::from(EOS_TOKEN, true),
        ])
        .build();

    let mut tokenizer: TokenizerImpl<
        BPE,
        NormalizerWrapper,
        ByteLevel,
        PostProcessorWrapper,
        ByteLevel,
    > = TokenizerBuilder::new()
        .with_model(BPE::default())
        .with_normalizer(None)
        .with_pre_tokenizer(Some(ByteLevel::default().add_prefix_space(false)))
        .with_post_processor(None)
        .with_decoder(Some(ByteLevel::default()))
        .build()
        .map_err(|e| anyhow!("Failed to assemble tokenizer: {}", e))?;

    tokenizer
        .train_from_files(&mut trainer, vec![targets.to_string_lossy().into_owned()])
        .map_err(|e| anyhow!("Failed to train tokenizer on {}: {}", targets.display(), e))?
        .save(output, false)
        .map_err(|e| anyhow!("Failed to save tokenizer to {}: {}", output.display(), e))?;

    info!(
        vocab = tokenizer.get_vocab_size(true),
        output = %output.display(),
        "Trained tokenizer"
    );
    Ok(())
}
