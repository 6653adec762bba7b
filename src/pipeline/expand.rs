use std::collections::HashMap;

/// Composite credit mapped to its individual artists, in credit order.
pub type SplitMapping = HashMap<String, Vec<String>>;

/// A dataset row keyed by an artist credit.
pub trait ArtistRow: Clone {
    fn artist(&self) -> &str;
    fn set_artist(&mut self, artist: String);
}

impl ArtistRow for crate::model::ArtistRecord {
    fn artist(&self) -> &str {
        &self.artist
    }

    fn set_artist(&mut self, artist: String) {
        self.artist = artist;
    }
}

/// Drops mapping entries that would not split anything.
pub fn retain_composites(mapping: SplitMapping) -> SplitMapping {
    mapping
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .collect()
}

/// Replaces every mapped row with one copy per constituent artist.
///
/// Rows keep their relative order and the copies of one row stay
/// contiguous. Rows whose artist is not a mapping key pass through
/// unchanged, so expanding an already expanded dataset changes nothing.
pub fn expand<R: ArtistRow>(rows: &[R], mapping: &SplitMapping) -> Vec<R> {
    let capacity = rows
        .iter()
        .map(|row| mapping.get(row.artist()).map_or(1, Vec::len))
        .sum();
    let mut out = Vec::with_capacity(capacity);

    for row in rows {
        match mapping.get(row.artist()) {
            Some(names) => {
                for name in names {
                    let mut copy = row.clone();
                    copy.set_artist(name.clone());
                    out.push(copy);
                }
            }
            None => out.push(row.clone()),
        }
    }

    out
}
