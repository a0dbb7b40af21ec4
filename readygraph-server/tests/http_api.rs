// Copyright 2025 Readygraph (https://github.com/readygraph)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Route-level behavior: request parsing, status mapping, payload shapes.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use dashmap::DashMap;
use readygraph_cache::{CacheConfig, RemoteArtifact, RemoteError, RemoteStore, SubgraphCache};
use readygraph_core::{
    ConceptSubgraph, GraphStep, Result as CoreResult, ScoringModel, StudentHistoryEntry,
    SubgraphEdge,
};
use readygraph_engine::{InferenceEngine, PipelineConfig, SequenceRepository};
use readygraph_server::api::AppState;
use readygraph_server::router;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct MapStore {
    artifacts: DashMap<String, Vec<u8>>,
}

#[async_trait]
impl RemoteStore for MapStore {
    async fn fetch(&self, code: &str) -> Result<RemoteArtifact, RemoteError> {
        match self.artifacts.get(code) {
            Some(bytes) => Ok(RemoteArtifact {
                advertised_len: Some(bytes.len() as u64),
                bytes: bytes.clone(),
            }),
            None => Err(RemoteError::NotFound(code.to_string())),
        }
    }
}

struct FixedModel {
    logit: f32,
}

impl ScoringModel for FixedModel {
    fn score_sequence(&self, steps: &[GraphStep]) -> CoreResult<Vec<f32>> {
        Ok(vec![self.logit; steps.len()])
    }
}

fn app(logit: f32) -> (axum::Router, TempDir) {
    let dir = TempDir::new().unwrap();

    let store = Arc::new(MapStore {
        artifacts: DashMap::new(),
    });
    let subgraph = ConceptSubgraph {
        codes: vec!["4.OA.1".into(), "3.OA.1".into()],
        edges: vec![SubgraphEdge { source: 1, target: 0, kind: 0 }],
        features: vec![vec![1.0], vec![2.0]],
        grade_levels: None,
        descriptions: None,
        history_scores: None,
    };
    store
        .artifacts
        .insert("4.OA.1".to_string(), serde_json::to_vec(&subgraph).unwrap());

    let cache_config = CacheConfig {
        cache_dir: dir.path().to_path_buf(),
        retry_initial_delay_ms: 1,
        ..CacheConfig::default()
    };
    let cache = Arc::new(
        SubgraphCache::new(cache_config, store as Arc<dyn RemoteStore>).unwrap(),
    );

    let mut histories: HashMap<String, Vec<StudentHistoryEntry>> = HashMap::new();
    histories.insert("s1".to_string(), vec![]);
    let repository = Arc::new(SequenceRepository::from_map(histories));

    let engine = Arc::new(InferenceEngine::new(
        cache,
        repository,
        Arc::new(FixedModel { logit }),
        PipelineConfig::default(),
    ));

    (router(AppState { engine }), dir)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn predict_request(payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict_readiness")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn predict_returns_score_and_decision() {
    let (app, _dir) = app(2.0);

    let response = app
        .oneshot(predict_request(serde_json::json!({
            "student_id": "s1",
            "target_code": "4.OA.1",
            "level": 2
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["student_id"], "s1");
    assert_eq!(body["target_code"], "4.OA.1");
    assert_eq!(body["ready"], true);
    let score = body["readiness_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));
}

#[tokio::test]
async fn predict_defaults_the_level() {
    let (app, _dir) = app(0.0);

    let response = app
        .oneshot(predict_request(serde_json::json!({
            "student_id": "s1",
            "target_code": "4.OA.1"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["level"], 1);
}

#[tokio::test]
async fn unknown_student_maps_to_404_with_reason() {
    let (app, _dir) = app(0.0);

    let response = app
        .oneshot(predict_request(serde_json::json!({
            "student_id": "nobody",
            "target_code": "4.OA.1"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("nobody"));
}

#[tokio::test]
async fn empty_student_maps_to_400() {
    let (app, _dir) = app(0.0);

    let response = app
        .oneshot(predict_request(serde_json::json!({
            "student_id": "",
            "target_code": "4.OA.1"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn graph_projection_endpoint_returns_nodes_and_links() {
    let (app, _dir) = app(0.0);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/graph/4.OA.1?student_id=s1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(body["links"][0]["type"], "IS_CHILD_OF");
}

#[tokio::test]
async fn health_reports_cache_stats() {
    let (app, _dir) = app(0.0);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["cache"]["resident_entries"].is_number());
}
