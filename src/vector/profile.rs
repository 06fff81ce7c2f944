//! User profile vectors built from interaction history.
//!
//! A profile is the frequency-weighted mean of the fused vectors of the
//! items a user interacted with, so it lives in the same space as the
//! candidate index it is queried against.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::vector::fusion::FeatureFusion;
use crate::vector::index::{EmbeddingIndex, IndexError};

/// One row of an interaction history file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub item_id: String,
    pub frequency: u32,
}

/// Item ids and how often a user interacted with each.
pub type History = Vec<(String, u32)>;

/// Read `user_id,item_id,frequency` rows, grouped per user.
///
/// Users keep the order of their first row.
pub fn read_histories(path: &Path) -> Result<Vec<(String, History)>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let interaction: Interaction = record?;
        rows.push(interaction);
    }

    Ok(group_by_user(rows))
}

/// Group interactions per user, preserving first-seen user order.
pub fn group_by_user(rows: Vec<Interaction>) -> Vec<(String, History)> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut grouped: Vec<(String, History)> = Vec::new();

    for row in rows {
        let slot = *position.entry(row.user_id.clone()).or_insert_with(|| {
            grouped.push((row.user_id.clone(), Vec::new()));
            grouped.len() - 1
        });
        grouped[slot].1.push((row.item_id, row.frequency));
    }

    grouped
}

/// Builds profile vectors over a content/image pair.
pub struct ProfileBuilder<'a> {
    fusion: FeatureFusion<'a>,
}

impl<'a> ProfileBuilder<'a> {
    pub fn new(fusion: FeatureFusion<'a>) -> Self {
        Self { fusion }
    }

    /// Width of the produced profiles.
    pub fn dimension(&self) -> usize {
        self.fusion.dimension()
    }

    /// Weighted mean of the fused vectors in `history`.
    ///
    /// Items missing a modality or with zero frequency do not contribute.
    /// Returns `None` if nothing does.
    pub fn profile(&self, history: &[(String, u32)]) -> Option<Vec<f32>> {
        let mut sum = vec![0.0f32; self.dimension()];
        let mut weight = 0u64;

        for (item_id, frequency) in history {
            if *frequency == 0 {
                continue;
            }
            let Some(fused) = self.fusion.fuse(item_id) else {
                continue;
            };

            let w = *frequency as f32;
            for (acc, value) in sum.iter_mut().zip(&fused) {
                *acc += w * value;
            }
            weight += u64::from(*frequency);
        }

        if weight == 0 {
            return None;
        }

        let weight = weight as f32;
        for acc in sum.iter_mut() {
            *acc /= weight;
        }
        Some(sum)
    }

    /// Build a user index with one profile row per user that has one.
    pub fn build_index(
        &self,
        histories: &[(String, History)],
    ) -> Result<EmbeddingIndex, IndexError> {
        let mut index = EmbeddingIndex::with_capacity(self.dimension(), histories.len())?;

        for (user_id, history) in histories {
            match self.profile(history) {
                Some(profile) => index.insert(user_id, &profile)?,
                None => log::warn!("no usable interactions for user '{user_id}'"),
            }
        }

        log::info!(
            "built {} of {} user profiles at dimension {}",
            index.len(),
            histories.len(),
            index.dimension()
        );

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modalities() -> (EmbeddingIndex, EmbeddingIndex) {
        let mut content = EmbeddingIndex::new(2).unwrap();
        content
            .add(&["a", "b", "c"], &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
            .unwrap();

        let mut image = EmbeddingIndex::new(1).unwrap();
        image.add(&["a", "b"], &[vec![1.0], vec![0.0]]).unwrap();

        (content, image)
    }

    fn history(items: &[(&str, u32)]) -> History {
        items.iter().map(|(id, f)| (id.to_string(), *f)).collect()
    }

    #[test]
    fn test_weighted_mean() {
        let (content, image) = modalities();
        let builder = ProfileBuilder::new(FeatureFusion::new(&content, &image));

        // a = [1, 0, 1] x3, b = [0, 1, 0] x1
        let profile = builder.profile(&history(&[("a", 3), ("b", 1)])).unwrap();
        assert_eq!(profile, vec![0.75, 0.25, 0.75]);
    }

    #[test]
    fn test_skips_unusable_items() {
        let (content, image) = modalities();
        let builder = ProfileBuilder::new(FeatureFusion::new(&content, &image));

        // "c" has no image, "b" has zero frequency
        let profile = builder
            .profile(&history(&[("a", 2), ("b", 0), ("c", 5)]))
            .unwrap();
        assert_eq!(profile, vec![1.0, 0.0, 1.0]);

        assert!(builder.profile(&history(&[("c", 1)])).is_none());
        assert!(builder.profile(&[]).is_none());
    }

    #[test]
    fn test_build_index() {
        let (content, image) = modalities();
        let builder = ProfileBuilder::new(FeatureFusion::new(&content, &image));

        let histories = vec![
            ("u1".to_string(), history(&[("a", 1)])),
            ("u2".to_string(), history(&[("c", 1)])),
            ("u3".to_string(), history(&[("b", 2)])),
        ];
        let index = builder.build_index(&histories).unwrap();

        assert_eq!(index.dimension(), 3);
        assert_eq!(index.ids(), &["u1".to_string(), "u3".to_string()]);
        assert_eq!(index.get("u3"), Some(&[0.0, 1.0, 0.0][..]));
    }

    #[test]
    fn test_group_by_user() {
        let rows = vec![
            Interaction {
                user_id: "0002".into(),
                item_id: "x".into(),
                frequency: 1,
            },
            Interaction {
                user_id: "0001".into(),
                item_id: "y".into(),
                frequency: 4,
            },
            Interaction {
                user_id: "0002".into(),
                item_id: "z".into(),
                frequency: 2,
            },
        ];

        let grouped = group_by_user(rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "0002");
        assert_eq!(grouped[0].1, history(&[("x", 1), ("z", 2)]));
        assert_eq!(grouped[1].1, history(&[("y", 4)]));
    }

    #[test]
    fn test_read_histories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(
            &path,
            "user_id,item_id,frequency\n0001, ChIJ-a, 3\n0001,ChIJ-b,1\n0003,ChIJ-a,2\n",
        )
        .unwrap();

        let histories = read_histories(&path).unwrap();
        assert_eq!(histories.len(), 2);
        assert_eq!(histories[0].1, history(&[("ChIJ-a", 3), ("ChIJ-b", 1)]));
        assert_eq!(histories[1].0, "0003");
    }

    #[test]
    fn test_read_histories_rejects_bad_frequency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(&path, "user_id,item_id,frequency\n0001,a,many\n").unwrap();

        assert!(read_histories(&path).is_err());
    }
}
