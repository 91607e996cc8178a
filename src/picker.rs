//! Random game selection for the pick-game command
//!
//! Arguments are read as `game weight` pairs when there is an even number of
//! them and every second token is numeric; otherwise every token is a game
//! name and the pick is uniform.

use crate::error::CommandError;
use crate::utils::is_number;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

/// Parsed pick-game arguments
#[derive(Debug, Clone)]
pub struct GameChoices {
    games: Vec<String>,
    weights: Option<WeightedIndex<f64>>,
}

impl GameChoices {
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, CommandError> {
        if args.is_empty() {
            return Err(CommandError::EmptyChoices);
        }

        let weighted = args.len() % 2 == 0
            && args.chunks(2).all(|pair| is_number(pair[1].as_ref()));

        if !weighted {
            return Ok(Self {
                games: args.iter().map(|a| a.as_ref().to_string()).collect(),
                weights: None,
            });
        }

        let mut games = Vec::with_capacity(args.len() / 2);
        let mut weights = Vec::with_capacity(args.len() / 2);
        for pair in args.chunks(2) {
            let weight: f64 = pair[1]
                .as_ref()
                .parse()
                .map_err(|_| CommandError::InvalidWeight)?;
            if weight <= 0.0 {
                return Err(CommandError::InvalidWeight);
            }
            games.push(pair[0].as_ref().to_string());
            weights.push(weight);
        }

        // Each weight is finite but their sum can still overflow
        if !weights.iter().sum::<f64>().is_finite() {
            return Err(CommandError::InvalidWeight);
        }

        let dist = WeightedIndex::new(&weights).map_err(|_| CommandError::InvalidWeight)?;
        Ok(Self {
            games,
            weights: Some(dist),
        })
    }

    pub fn games(&self) -> &[String] {
        &self.games
    }

    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    /// The final pick, weighted when weights were given
    pub fn draw<R: Rng>(&self, rng: &mut R) -> String {
        let index = match &self.weights {
            Some(dist) => dist.sample(rng),
            None => rng.gen_range(0..self.games.len()),
        };
        self.games[index].clone()
    }

    /// Intermediate names shown while "rolling"
    ///
    /// Frames are uniform over the names; consecutive frames differ whenever
    /// more than one distinct name exists.
    pub fn roll_frames<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<String> {
        let mut distinct: Vec<&String> = Vec::new();
        for game in &self.games {
            if !distinct.contains(&game) {
                distinct.push(game);
            }
        }

        let mut frames: Vec<String> = Vec::with_capacity(count);
        for _ in 0..count {
            let candidates: Vec<&&String> = distinct
                .iter()
                .filter(|g| frames.last().map_or(true, |prev| prev != **g))
                .collect();
            let next = candidates
                .choose(rng)
                .map(|g| (**g).clone())
                .unwrap_or_else(|| self.games[0].clone());
            frames.push(next);
        }
        frames
    }
}

/// Text of an in-progress roll frame
pub fn roll_message(frame: &str) -> String {
    format!("The selected game is: {}", frame)
}

/// Text of the final result
pub fn result_message(pick: &str) -> String {
    format!(":sparkles: The selected game is: {} :sparkles:", pick)
}
