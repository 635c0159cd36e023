//! ProfileStore implementation for LibSqlBackend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use libsql::params;

use crate::db::ProfileStore;
use crate::db::libsql::{LibSqlBackend, fmt_ts, get_f64, get_i64, get_text, get_ts};
use crate::error::DatabaseError;
use crate::profile::{Dimension, DimensionScore, PersonalityProfile, ProfileSource};

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn save_profile(&self, profile: &PersonalityProfile) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        tx.execute("DELETE FROM personality_profile", params![])
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let created_at = fmt_ts(profile.created_at);
        for (dimension, score) in &profile.dimensions {
            tx.execute(
                "INSERT INTO personality_profile \
                 (dimension, score, confidence, source, sample_size, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    dimension.as_str(),
                    score.score,
                    score.confidence,
                    profile.source.as_str(),
                    profile.sample_size as i64,
                    created_at.as_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        tracing::debug!(source = profile.source.as_str(), "Saved personality profile");
        Ok(())
    }

    async fn get_profile(&self) -> Result<Option<PersonalityProfile>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT dimension, score, confidence, source, sample_size, created_at \
                 FROM personality_profile ORDER BY dimension",
                params![],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut dimensions = BTreeMap::new();
        let mut meta = None;
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            let name = get_text(&row, 0);
            let Ok(dimension) = name.parse::<Dimension>() else {
                tracing::warn!(dimension = %name, "Skipping unknown stored dimension");
                continue;
            };
            dimensions.insert(
                dimension,
                DimensionScore::new(get_f64(&row, 1), get_f64(&row, 2)),
            );
            if meta.is_none() {
                let source = get_text(&row, 3)
                    .parse::<ProfileSource>()
                    .map_err(DatabaseError::Serialization)?;
                meta = Some((source, get_i64(&row, 4).max(0) as usize, get_ts(&row, 5)));
            }
        }

        Ok(meta.map(|(source, sample_size, created_at)| PersonalityProfile {
            dimensions,
            source,
            sample_size,
            created_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::db::ProfileStore;
    use crate::profile::{Dimension, PersonalityProfile, ProfileSource};
    use crate::testing::test_db;

    #[tokio::test]
    async fn empty_store_has_no_profile() {
        let (db, _dir) = test_db().await;
        assert!(db.get_profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_active_profile() {
        let (db, _dir) = test_db().await;

        let mut first = PersonalityProfile::neutral();
        first.set(Dimension::HumorLevel, 0.9, 0.7);
        db.save_profile(&first).await.unwrap();

        let mut second = PersonalityProfile::neutral();
        second.source = ProfileSource::Blended;
        second.sample_size = 120;
        second.set(Dimension::HumorLevel, 0.2, 0.6);
        second.dimensions.remove(&Dimension::HashtagUsage);
        db.save_profile(&second).await.unwrap();

        let loaded = db.get_profile().await.unwrap().unwrap();
        assert_eq!(loaded.source, ProfileSource::Blended);
        assert_eq!(loaded.sample_size, 120);
        assert_eq!(loaded.score(Dimension::HumorLevel), 0.2);
        assert!(!loaded.dimensions.contains_key(&Dimension::HashtagUsage));
        assert_eq!(loaded.dimensions.len(), 6);
    }
}
