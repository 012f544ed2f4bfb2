//! # Prediction Service
//!
//! Owns a loaded dataset and a built [`Predictor`] and answers queries from
//! async code:
//! 1. Build the engine on the blocking pool, bounded by a timeout
//! 2. Answer single predictions, batches and top-N recommendations
//! 3. Enrich results with titles from the registry
//!
//! The engine is immutable once built, so the service is cheap to clone and
//! every query runs without locking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use data_loader::{Dataset, ItemId, RatingTable, Registry, UserId};
use engine::{EngineConfig, Prediction, Predictor};

/// Settings for [`PredictionService::build`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
    /// Upper bound on the similarity build
    pub build_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            build_timeout: Duration::from_secs(300),
        }
    }
}

impl ServiceConfig {
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = timeout;
        self
    }
}

/// Recommendation returned to the user
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecommendation {
    pub item_id: ItemId,
    pub title: String,
    pub genres: Vec<String>,
    pub predicted_rating: f64,
}

#[derive(Clone)]
pub struct PredictionService {
    registry: Arc<Registry>,
    predictor: Arc<Predictor>,
}

impl PredictionService {
    /// Build the engine for a loaded dataset
    pub async fn build(dataset: Dataset, config: ServiceConfig) -> Result<Self> {
        let Dataset { table, registry, .. } = dataset;
        Self::from_parts(Arc::new(table), Arc::new(registry), config).await
    }

    /// Build the engine from an already assembled table and registry
    pub async fn from_parts(
        table: Arc<RatingTable>,
        registry: Arc<Registry>,
        config: ServiceConfig,
    ) -> Result<Self> {
        Self::build_with(table, registry, config, Predictor::build).await
    }

    /// Runs `build` on the blocking pool under `config.build_timeout`.
    ///
    /// A timed-out build task is not cancelled; it runs to completion and
    /// its result is dropped.
    #[instrument(skip_all, fields(users = table.n_users(), timeout = ?config.build_timeout))]
    pub(crate) async fn build_with<F>(
        table: Arc<RatingTable>,
        registry: Arc<Registry>,
        config: ServiceConfig,
        build: F,
    ) -> Result<Self>
    where
        F: FnOnce(Arc<RatingTable>, EngineConfig) -> Predictor + Send + 'static,
    {
        let start = Instant::now();
        let engine_config = config.engine;
        let task = tokio::task::spawn_blocking(move || build(table, engine_config));

        let predictor = match tokio::time::timeout(config.build_timeout, task).await {
            Ok(joined) => joined.context("Similarity build task panicked")?,
            Err(_) => {
                warn!("Similarity build did not finish within {:?}", config.build_timeout);
                return Err(anyhow!(
                    "Similarity build exceeded timeout of {:?}",
                    config.build_timeout
                ));
            }
        };

        info!("Prediction service ready in {:.2?}", start.elapsed());
        Ok(Self {
            registry,
            predictor: Arc::new(predictor),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    /// Predict one (user, item) pair
    pub async fn predict(&self, user_id: UserId, item_id: ItemId) -> Result<Prediction> {
        let predictor = self.predictor.clone();
        tokio::task::spawn_blocking(move || predictor.explain(user_id, item_id))
            .await
            .context("Prediction task panicked")?
            .with_context(|| format!("Cannot predict item {} for user {}", item_id, user_id))
    }

    /// Predict many pairs concurrently. Results keep the order of `queries`.
    pub async fn predict_many(&self, queries: &[(UserId, ItemId)]) -> Vec<Result<Prediction>> {
        let mut set = JoinSet::new();
        for (idx, &(user_id, item_id)) in queries.iter().enumerate() {
            let service = self.clone();
            set.spawn(async move { (idx, service.predict(user_id, item_id).await) });
        }

        let mut results: Vec<Option<Result<Prediction>>> = queries.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => warn!("Prediction task failed to join: {}", e),
            }
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(anyhow!("Prediction task did not complete"))))
            .collect()
    }

    /// Top `limit` unrated items for a user, with titles
    pub async fn recommend(&self, user_id: UserId, limit: usize) -> Result<Vec<ItemRecommendation>> {
        let predictor = self.predictor.clone();
        let ranked = tokio::task::spawn_blocking(move || predictor.recommend(user_id, limit))
            .await
            .context("Recommendation task panicked")?
            .with_context(|| format!("Cannot recommend for user {}", user_id))?;

        let recommendations: Vec<ItemRecommendation> = ranked
            .into_iter()
            .map(|(item_id, predicted_rating)| {
                let item = self.registry.item(item_id);
                ItemRecommendation {
                    item_id,
                    title: item
                        .map(|i| i.title.clone())
                        .unwrap_or_else(|| format!("item {}", item_id)),
                    genres: item
                        .map(|i| i.genres.iter().map(|g| g.name().to_string()).collect())
                        .unwrap_or_default(),
                    predicted_rating,
                }
            })
            .collect();

        info!(user_id, count = recommendations.len(), "Built recommendations");
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Genre, Item, RatingRecord};
    use engine::{PredictError, SimilarityMatrix};

    fn build_test_parts() -> (Arc<RatingTable>, Arc<Registry>) {
        let ratings = [
            (1, 1, 5), (1, 2, 3), (1, 3, 4),
            (2, 1, 4), (2, 2, 2), (2, 3, 5), (2, 4, 4),
            (3, 1, 1), (3, 2, 5), (3, 4, 2),
        ];
        let records: Vec<RatingRecord> = ratings
            .iter()
            .map(|&(user_id, item_id, rating)| RatingRecord {
                user_id,
                item_id,
                rating,
                timestamp: 0,
            })
            .collect();
        let table = RatingTable::from_records(3, 4, &records).unwrap();

        let mut registry = Registry::new();
        for id in 1..=4 {
            registry.insert_item(Item {
                id,
                title: format!("Movie {} (1995)", id),
                release_date: None,
                video_release_date: None,
                imdb_url: None,
                genres: vec![Genre::Drama],
            });
        }
        (Arc::new(table), Arc::new(registry))
    }

    async fn build_test_service() -> PredictionService {
        let (table, registry) = build_test_parts();
        PredictionService::from_parts(table, registry, ServiceConfig::default())
            .await
            .expect("service should build")
    }

    #[tokio::test]
    async fn test_predict_in_range() {
        let service = build_test_service().await;
        let prediction = service.predict(1, 4).await.unwrap();
        assert!((1.0..=5.0).contains(&prediction.value));
    }

    #[tokio::test]
    async fn test_predict_errors_keep_their_type() {
        let service = build_test_service().await;

        let err = service.predict(9, 1).await.unwrap_err();
        assert_eq!(err.downcast_ref::<PredictError>(), Some(&PredictError::UnknownUser(9)));

        let err = service.predict(1, 9).await.unwrap_err();
        assert_eq!(err.downcast_ref::<PredictError>(), Some(&PredictError::UnknownItem(9)));
    }

    #[tokio::test]
    async fn test_predict_many_keeps_order() {
        let service = build_test_service().await;
        let queries = [(1, 4), (9, 1), (3, 3)];

        let results = service.predict_many(&queries).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().item_id, 4);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().user_id, 3);
    }

    #[tokio::test]
    async fn test_recommend_enriches_titles() {
        let service = build_test_service().await;
        let recommendations = service.recommend(1, 5).await.unwrap();

        // user 1 rated items 1-3, so only item 4 is left
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].item_id, 4);
        assert_eq!(recommendations[0].title, "Movie 4 (1995)");
        assert_eq!(recommendations[0].genres, vec!["Drama".to_string()]);
    }

    #[tokio::test]
    async fn test_build_timeout() {
        let (table, registry) = build_test_parts();
        let config = ServiceConfig::default().with_build_timeout(Duration::from_millis(20));

        let slow_build = |table: Arc<RatingTable>, engine: EngineConfig| {
            std::thread::sleep(Duration::from_millis(500));
            let matrix = SimilarityMatrix::undefined(table.n_users());
            Predictor::new(table, Arc::new(matrix), engine)
        };

        let result = PredictionService::build_with(table, registry, config, slow_build).await;
        let err = result.err().expect("build should time out");
        assert!(err.to_string().contains("timeout"));
    }
}
