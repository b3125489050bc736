//! Prediction service: validation, closed-store short-circuit, transform,
//! scoring and result assembly.
//!
//! The service is built once at startup. When the artifacts fail to load it
//! stays up in the `Unready` state and refuses every batch with the recorded
//! reason, so health checks can report what went wrong.

use crate::artifacts::{load_encoding_maps, load_model, load_store_table, ArtifactPaths};
use crate::encoding::EncodingMaps;
use crate::errors::{ArtifactError, PredictError, Result};
use crate::features::{FeatureTransformer, TransformPolicy};
use crate::model::{ModelError, Regressor};
use crate::stores::StoreTable;
use crate::validation::validate;
use salescast_types::{PredictionRequest, PredictionResult};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;

/// Everything a prediction needs, immutable once built
pub struct ServiceContext {
    transformer: FeatureTransformer,
    model: Arc<dyn Regressor>,
    model_hash: String,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("stores", &self.transformer.stores().len())
            .field("encoded_columns", &self.transformer.maps().len())
            .field("model_hash", &self.model_hash)
            .finish()
    }
}

impl ServiceContext {
    /// Cross-check the artifacts and assemble a context.
    ///
    /// The model must pass its own [`Regressor::validate`], and every
    /// feature it consumes must be a column the transformer produces.
    pub fn new(
        stores: StoreTable,
        maps: EncodingMaps,
        model: Arc<dyn Regressor>,
        policy: TransformPolicy,
    ) -> Result<Self> {
        maps.validate()?;
        model.validate()?;

        let unknown = model.unknown_features();
        if !unknown.is_empty() {
            return Err(ArtifactError::Inconsistent(format!(
                "model expects features the transformer does not produce: {}",
                unknown.join(", ")
            )));
        }

        let model_hash = model.fingerprint();
        Ok(Self {
            transformer: FeatureTransformer::new(stores, maps, policy),
            model,
            model_hash,
        })
    }

    /// Load all three artifacts. Any failure fails the whole load.
    pub fn load(paths: &ArtifactPaths, policy: TransformPolicy) -> Result<Self> {
        let maps = load_encoding_maps(&paths.encoding_maps)?;
        let stores = load_store_table(&paths.store_attributes)?;
        let model = load_model(&paths.model)?;
        Self::new(stores, maps, Arc::new(model), policy)
    }

    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    pub fn model(&self) -> &dyn Regressor {
        self.model.as_ref()
    }

    pub fn model_hash(&self) -> &str {
        &self.model_hash
    }

    pub fn store_count(&self) -> usize {
        self.transformer.stores().len()
    }
}

/// Request-path limits and transformer policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceConfig {
    pub max_batch_size: usize,
    pub policy: TransformPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            policy: TransformPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Ready(Arc<ServiceContext>),
    Unready { reason: String },
}

/// Cheap to clone; clones share the same context.
#[derive(Debug, Clone)]
pub struct PredictionService {
    state: State,
    max_batch_size: usize,
}

impl PredictionService {
    pub fn ready(context: ServiceContext, max_batch_size: usize) -> Self {
        Self {
            state: State::Ready(Arc::new(context)),
            max_batch_size,
        }
    }

    pub fn unready(reason: impl Into<String>, max_batch_size: usize) -> Self {
        Self {
            state: State::Unready {
                reason: reason.into(),
            },
            max_batch_size,
        }
    }

    /// Load artifacts; a failed load yields an unready service, never an error.
    pub fn from_artifacts(paths: &ArtifactPaths, config: ServiceConfig) -> Self {
        match ServiceContext::load(paths, config.policy) {
            Ok(context) => {
                info!(
                    stores = context.store_count(),
                    encoded_columns = context.transformer().maps().len(),
                    model_hash = %context.model_hash(),
                    "prediction service ready"
                );
                Self::ready(context, config.max_batch_size)
            }
            Err(err) => {
                error!(error = %err, "artifact loading failed; service is unready");
                Self::unready(err.to_string(), config.max_batch_size)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub fn unready_reason(&self) -> Option<&str> {
        match &self.state {
            State::Ready(_) => None,
            State::Unready { reason } => Some(reason),
        }
    }

    pub fn context(&self) -> Option<&ServiceContext> {
        match &self.state {
            State::Ready(context) => Some(context.as_ref()),
            State::Unready { .. } => None,
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Predict sales for a batch.
    ///
    /// Output follows input order. Closed records get zero sales without
    /// being scored; records dropped by the store join are absent.
    pub fn predict(
        &self,
        batch: &[PredictionRequest],
    ) -> std::result::Result<Vec<PredictionResult>, PredictError> {
        let context = match &self.state {
            State::Ready(context) => context,
            State::Unready { reason } => return Err(PredictError::NotReady(reason.clone())),
        };

        if batch.len() > self.max_batch_size {
            return Err(PredictError::BatchTooLarge {
                size: batch.len(),
                limit: self.max_batch_size,
            });
        }

        for (index, record) in batch.iter().enumerate() {
            validate(record).map_err(|source| PredictError::Validation {
                index,
                id: record.id,
                source,
            })?;
        }

        let mut slots: Vec<Option<PredictionResult>> = vec![None; batch.len()];
        let mut open_positions = Vec::new();
        for (position, record) in batch.iter().enumerate() {
            if record.is_closed() {
                slots[position] = Some(PredictionResult::closed(record.id));
            } else {
                open_positions.push(position);
            }
        }

        let closed = batch.len() - open_positions.len();
        if !open_positions.is_empty() {
            let open = open_positions.iter().map(|&p| &batch[p]);
            let table = context.transformer.transform(open)?;

            if !table.is_empty() {
                let predictions = context.model.predict(&table)?;
                if predictions.len() != table.len() {
                    return Err(ModelError::RowCountMismatch {
                        expected: table.len(),
                        got: predictions.len(),
                    }
                    .into());
                }

                for ((&row, &id), sales) in table
                    .source_rows()
                    .iter()
                    .zip(table.ids())
                    .zip(predictions)
                {
                    // negative sales are not meaningful
                    slots[open_positions[row]] = Some(PredictionResult::new(id, sales.max(0.0)));
                }
            }
        }

        let results: Vec<PredictionResult> = slots.into_iter().flatten().collect();
        debug!(
            records = batch.len(),
            closed,
            scored = results.len() - closed,
            "batch predicted"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureTable, JoinMissPolicy};
    use crate::gbdt::{Model, Node, Tree};
    use salescast_types::columns::STATE_HOLIDAY;
    use salescast_types::StoreAttributes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns each row's Store number as its prediction and counts calls.
    struct StoreEcho {
        names: Vec<String>,
        calls: AtomicUsize,
        rows_seen: AtomicUsize,
    }

    impl StoreEcho {
        fn new() -> Self {
            Self {
                names: vec!["Store".to_string()],
                calls: AtomicUsize::new(0),
                rows_seen: AtomicUsize::new(0),
            }
        }
    }

    impl Regressor for StoreEcho {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn predict(&self, table: &FeatureTable) -> std::result::Result<Vec<f64>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rows_seen.fetch_add(table.len(), Ordering::SeqCst);
            let matrix = crate::model::feature_matrix(table, &self.names)?;
            Ok(matrix.iter().map(|row| row[0] * 100.0).collect())
        }

        fn fingerprint(&self) -> String {
            "store-echo".to_string()
        }
    }

    fn attrs(store: i64) -> StoreAttributes {
        StoreAttributes {
            store,
            store_type: Some("a".into()),
            assortment: Some("a".into()),
            competition_distance: 500.0,
            competition_open_since_month: 1.0,
            competition_open_since_year: 2012.0,
            promo2: 0.0,
            promo2_since_week: 0.0,
            promo2_since_year: 0.0,
            promo_interval: Some("0".into()),
        }
    }

    fn request(id: i64, store: i64, open: i64) -> PredictionRequest {
        PredictionRequest {
            id,
            store,
            open,
            ..PredictionRequest::default()
        }
    }

    fn service_with(model: Arc<dyn Regressor>, policy: TransformPolicy) -> PredictionService {
        let stores = StoreTable::from_rows(vec![attrs(1), attrs(2), attrs(3)]).unwrap();
        let context = ServiceContext::new(stores, EncodingMaps::new(), model, policy).unwrap();
        PredictionService::ready(context, 100)
    }

    fn echo_service() -> (PredictionService, Arc<StoreEcho>) {
        let model = Arc::new(StoreEcho::new());
        (
            service_with(model.clone(), TransformPolicy::default()),
            model,
        )
    }

    #[test]
    fn test_closed_store_is_never_scored() {
        let (service, model) = echo_service();
        let results = service.predict(&[request(7, 1, 0)]).unwrap();

        assert_eq!(results, vec![PredictionResult::new(7, 0.0)]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mixed_batch_keeps_original_order() {
        let (service, model) = echo_service();
        let batch = vec![
            request(10, 1, 1),
            request(11, 2, 0),
            request(12, 3, 1),
            request(13, 1, 0),
        ];
        let results = service.predict(&batch).unwrap();

        assert_eq!(
            results,
            vec![
                PredictionResult::new(10, 100.0),
                PredictionResult::new(11, 0.0),
                PredictionResult::new(12, 300.0),
                PredictionResult::new(13, 0.0),
            ]
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(model.rows_seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ids_echo_input() {
        let (service, _) = echo_service();
        let batch: Vec<_> = (0..5).map(|i| request(100 + i, 1 + i % 3, 1)).collect();
        let ids: Vec<i64> = service
            .predict(&batch)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![100, 101, 102, 103, 104]);
    }

    #[test]
    fn test_empty_batch() {
        let (service, model) = echo_service();
        assert!(service.predict(&[]).unwrap().is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_validation_failure_aborts_batch() {
        let (service, model) = echo_service();
        let mut bad = request(2, 1, 1);
        bad.state_holiday = "x".into();
        let err = service
            .predict(&[request(1, 1, 1), bad])
            .unwrap_err();

        match err {
            PredictError::Validation { index, id, source } => {
                assert_eq!((index, id), (1, 2));
                assert_eq!(source.field(), STATE_HOLIDAY);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(service
            .predict(&[request(1, 1, 1), request(3, 0, 0)])
            .unwrap_err()
            .is_client_error());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_join_miss_drop_and_reject() {
        let (service, _) = echo_service();
        // store 4 is valid but has no attributes
        let batch = vec![request(1, 1, 1), request(2, 4, 1), request(3, 4, 0)];
        let results = service.predict(&batch).unwrap();
        assert_eq!(
            results,
            vec![PredictionResult::new(1, 100.0), PredictionResult::new(3, 0.0)]
        );

        let strict = service_with(
            Arc::new(StoreEcho::new()),
            TransformPolicy {
                join_miss: JoinMissPolicy::Reject,
                ..TransformPolicy::default()
            },
        );
        assert!(matches!(
            strict.predict(&batch),
            Err(PredictError::JoinMiss { id: 2, store: 4 })
        ));
    }

    #[test]
    fn test_batch_limit() {
        let (service, _) = echo_service();
        let batch: Vec<_> = (0..101).map(|i| request(i, 1, 1)).collect();
        assert!(matches!(
            service.predict(&batch),
            Err(PredictError::BatchTooLarge { size: 101, limit: 100 })
        ));
    }

    #[test]
    fn test_unready_rejects_everything() {
        let service = PredictionService::unready("model.json missing", 100);
        assert!(!service.is_ready());
        assert_eq!(service.unready_reason(), Some("model.json missing"));
        assert!(service.context().is_none());
        assert!(matches!(
            service.predict(&[request(1, 1, 0)]),
            Err(PredictError::NotReady(reason)) if reason == "model.json missing"
        ));
    }

    #[test]
    fn test_negative_predictions_clamped() {
        let model = Model::new(
            vec!["Store".to_string()],
            vec![Tree::new(vec![Node::leaf(0, -25.0)], 1.0)],
            0.0,
        );
        let service = service_with(Arc::new(model), TransformPolicy::default());
        let results = service.predict(&[request(1, 1, 1)]).unwrap();
        assert_eq!(results, vec![PredictionResult::new(1, 0.0)]);
    }

    #[test]
    fn test_model_with_unknown_feature_rejected() {
        let model = Model::new(vec!["Customers".to_string()], vec![], 0.0);
        let stores = StoreTable::from_rows(vec![attrs(1)]).unwrap();
        let err = ServiceContext::new(
            stores,
            EncodingMaps::new(),
            Arc::new(model),
            TransformPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ArtifactError::Inconsistent(msg) if msg.contains("Customers")));
    }

    #[test]
    fn test_malformed_model_rejected_before_serving() {
        // node 1 points back at itself
        let looping = Model::new(
            vec!["Store".to_string()],
            vec![Tree::new(
                vec![
                    Node::internal(0, 0, 1.5, 1, 2),
                    Node::internal(1, 0, 2.5, 1, 2),
                    Node::leaf(2, 10.0),
                ],
                1.0,
            )],
            0.0,
        );
        let stores = StoreTable::from_rows(vec![attrs(1)]).unwrap();
        let err = ServiceContext::new(
            stores,
            EncodingMaps::new(),
            Arc::new(looping),
            TransformPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Model(ModelError::ValidationFailed(msg)) if msg.contains("backwards")
        ));
    }

    #[test]
    fn test_row_count_mismatch_is_model_error() {
        struct Short(Vec<String>);
        impl Regressor for Short {
            fn feature_names(&self) -> &[String] {
                &self.0
            }
            fn predict(&self, _: &FeatureTable) -> std::result::Result<Vec<f64>, ModelError> {
                Ok(vec![])
            }
            fn fingerprint(&self) -> String {
                String::new()
            }
        }

        let service = service_with(
            Arc::new(Short(vec!["Store".to_string()])),
            TransformPolicy::default(),
        );
        let err = service.predict(&[request(1, 1, 1)]).unwrap_err();
        assert!(matches!(
            err,
            PredictError::Model(ModelError::RowCountMismatch { expected: 1, got: 0 })
        ));
        assert!(!err.is_client_error());
    }
}
