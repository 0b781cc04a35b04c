/// Human-readable names for members that did not choose one
use markov_namegen::{CharacterChainGenerator, RandomTextGenerator};

/// Woodland and meadow names used to train the chain
const TRAINING_NAMES: &[&str] = &[
    "Bramble", "Clover", "Thistle", "Hazel", "Burdock", "Sorrel", "Tansy", "Yarrow",
    "Fennel", "Nettle", "Primrose", "Sedge", "Heather", "Bracken", "Teasel", "Betony",
    "Pipkin", "Hollin", "Dandelion", "Barley", "Marigold", "Rowan", "Tumble", "Wicket",
    "Mallow", "Furrow", "Tillage", "Loam", "Delver", "Moss", "Rootle", "Hedgerow",
];

const MAX_NAME_LEN: usize = 12;

fn create_name_generator() -> CharacterChainGenerator {
    CharacterChainGenerator::builder()
        .with_order(2)
        .with_prior(0.01)
        .train(TRAINING_NAMES.iter().copied())
        .build()
}

/// Generate a pronounceable display name such as "Brackel" or "Furrose"
///
/// Only alphanumeric names up to 12 characters are returned so the same
/// text can double as a keyexpr chunk.
pub fn generate_display_name() -> String {
    let mut generator = create_name_generator();
    loop {
        let name = generator.generate_one();
        if !name.is_empty()
            && name.len() <= MAX_NAME_LEN
            && name.chars().all(|c| c.is_alphanumeric())
        {
            return name;
        }
    }
}

/// Generate a display name with a numeric suffix, e.g. "Sorrin_317"
pub fn generate_unique_name() -> String {
    let suffix: u16 = rand::random::<u16>() % 1000;
    format!("{}_{}", generate_display_name(), suffix)
}
