//! HTTP surface tests, driven through the router directly with
//! `tower::ServiceExt::oneshot` rather than binding a real listener.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use signal_csm::csm::{Csm, CsmConfig};
use signal_csm::events::{ClientEvent, ServerEvent};
use signal_csm::http::{self, AppState};
use signal_csm::ids::{CallId, UserId};
use signal_csm::transport::Channel;

fn router() -> (axum::Router, std::sync::Arc<Csm>) {
    let csm = Csm::new(CsmConfig::default());
    (http::create_router(AppState { csm: csm.clone() }), csm)
}

#[tokio::test]
async fn root_returns_a_liveness_string() {
    let (app, _csm) = router();
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn health_reports_connected_users_and_active_calls() {
    let (app, csm) = router();

    let (channel, mut rx) = Channel::new();
    csm.register(UserId("A".into()), channel.clone()).await;
    assert_eq!(rx.recv().await, Some(ServerEvent::Registered { success: true }));

    csm.dispatch(
        &channel,
        ClientEvent::CallInitiate {
            call_id: CallId("c1".into()),
            caller_id: UserId("A".into()),
            receiver_ids: vec![UserId("B".into())],
            call_type: "audio".into(),
            extra_meta: None,
        },
    )
    .await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["connected_user_ids"], serde_json::json!(["A"]));
    assert_eq!(json["calls"][0]["call_id"], "c1");
    assert_eq!(json["calls"][0]["status"], "initiated");
}
