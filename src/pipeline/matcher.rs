use rapidfuzz::fuzz;

/// Score the registry assigns to a result it considers an exact hit.
pub const EXACT_MATCH_SCORE: u8 = 100;

/// A single registry search hit, in the order the registry ranked it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub score: u8,
    pub kind: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub time_begin: Option<String>,
    pub time_end: Option<String>,
    pub begin_area_id: Option<String>,
    pub end_area_id: Option<String>,
}

/// Picks the candidate that best identifies `name`.
///
/// A top-ranked exact score wins outright. Otherwise the candidate with the
/// highest token-sorted similarity wins, earliest first on ties. There is no
/// similarity floor: any non-empty list yields a match.
pub fn resolve<'a>(name: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    let first = candidates.first()?;
    if first.score == EXACT_MATCH_SCORE {
        return Some(first);
    }

    let mut best = first;
    let mut best_similarity = token_sort_ratio(name, &first.name);

    for candidate in &candidates[1..] {
        let value = token_sort_ratio(name, &candidate.name);
        if value > best_similarity {
            best = candidate;
            best_similarity = value;
        }
    }

    Some(best)
}

/// Token-order-insensitive Indel similarity in `0.0..=100.0`.
pub fn token_sort_ratio(left: &str, right: &str) -> f64 {
    similarity(&token_sort_key(left), &token_sort_key(right))
}

fn token_sort_key(value: &str) -> String {
    let lowered = value.to_lowercase();
    let mut tokens = lowered.split_whitespace().collect::<Vec<&str>>();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn similarity(left: &str, right: &str) -> f64 {
    fuzz::ratio(left.chars(), right.chars()) * 100.0
}
