use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::HashSet;

const ADJECTIVES: &[&str] = &[
    "attractive", "bald", "beautiful", "chubby", "clean", "dazzling", "drab", "elegant", "fancy",
    "fit", "flabby", "glamorous", "gorgeous", "handsome", "long", "magnificent", "muscular",
    "plain", "plump", "quaint", "scruffy", "shapely", "short", "skinny", "stocky", "unkempt",
    "zealous", "amazing", "sly",
];

const ANIMALS: &[&str] = &[
    "chameleon", "panda", "raccoon", "tapir", "elephant", "tiger", "lion", "penguin", "alpaca",
    "badger", "eagle", "hedgehog", "falcon", "otter", "beaver", "axolotl", "aardvark", "capybara",
    "platypus", "koala", "sloth", "walrus", "narwhal", "pangolin", "wombat", "lemur", "ocelot",
    "puffin", "meerkat", "okapi", "quokka", "tanuki", "kakapo", "manatee", "mongoose", "ibis",
];

/// Hands out unique `adjective_animal` names for detectors that were
/// configured without one.
#[derive(Debug)]
pub struct NameBuilder {
    rng: StdRng,
    in_use: HashSet<String>,
}

impl NameBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            in_use: HashSet::new(),
        }
    }

    /// Mark a configured name as taken.
    pub fn reserve(&mut self, name: &str) {
        self.in_use.insert(name.to_string());
    }

    pub fn name(&mut self) -> String {
        let combinations = ADJECTIVES.len() * ANIMALS.len();
        loop {
            let adjective = ADJECTIVES.choose(&mut self.rng).copied().unwrap_or("plain");
            let animal = ANIMALS.choose(&mut self.rng).copied().unwrap_or("raccoon");
            let mut name = format!("{adjective}_{animal}");
            if self.in_use.len() >= combinations {
                name = format!("{name}_{}", self.in_use.len());
            }
            if self.in_use.insert(name.clone()) {
                return name;
            }
        }
    }
}

impl Default for NameBuilder {
    fn default() -> Self {
        Self::new(0)
    }
}
