use std::path::Path;

use anyhow::{bail, Context};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use tokio::io::AsyncBufReadExt;
use tokio::{fs, io};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::config;

const BUILTIN_ADJECTIVES: &str = include_str!("../assets/adjectives.txt");
const BUILTIN_NOUNS: &str = include_str!("../assets/nouns.txt");

/// Word lists for generating human-readable paste ids. Both lists are never
/// empty.
#[derive(Debug, Clone)]
pub struct WordLists {
    adjectives: Vec<String>,
    nouns: Vec<String>,
}

impl WordLists {
    /// Load the configured word list files, falling back to the built-in lists
    /// for any that are not configured.
    pub async fn load(config: &config::WordLists) -> anyhow::Result<Self> {
        let adjectives = match &config.adjectives_file {
            Some(path) => read_lines(path)
                .await
                .context("failed to read adjectives file")?,
            None => parse_lines(BUILTIN_ADJECTIVES),
        };
        let nouns = match &config.nouns_file {
            Some(path) => read_lines(path)
                .await
                .context("failed to read nouns file")?,
            None => parse_lines(BUILTIN_NOUNS),
        };

        WordLists::new(adjectives, nouns)
    }

    pub fn new(adjectives: Vec<String>, nouns: Vec<String>) -> anyhow::Result<Self> {
        if adjectives.is_empty() {
            bail!("adjective list is empty");
        }
        if nouns.is_empty() {
            bail!("noun list is empty");
        }
        Ok(WordLists { adjectives, nouns })
    }

    #[cfg(test)]
    pub fn builtin() -> Self {
        WordLists {
            adjectives: parse_lines(BUILTIN_ADJECTIVES),
            nouns: parse_lines(BUILTIN_NOUNS),
        }
    }
}

/// Generate an `adjective-adjective-noun` id.
pub fn generate_key(words: &WordLists) -> String {
    let mut rng = thread_rng();
    let adj_a = pick(&words.adjectives, &mut rng);
    let adj_b = pick(&words.adjectives, &mut rng);
    let noun = pick(&words.nouns, &mut rng);
    format!("{adj_a}-{adj_b}-{noun}")
}

fn pick<'a>(list: &'a [String], rng: &mut impl Rng) -> &'a str {
    list.choose(rng).map(String::as_str).unwrap_or_default()
}

fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

async fn read_lines(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let file = fs::File::open(path).await?;
    let lines = LinesStream::new(io::BufReader::new(file).lines())
        .filter_map(Result::ok)
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
        .await;
    Ok(lines)
}
