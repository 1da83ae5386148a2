//! The request middleware chain.
//!
//! Every request passes, outermost first, through:
//!
//! 1. panic recovery (a panic anywhere below becomes a `500`);
//! 2. request tracing;
//! 3. the session layer (load before, persist and set the cookie after);
//! 4. the CSRF guard (unsafe methods only);
//! 5. the route table.

pub mod recovery;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::session::{CsrfLayer, SessionLayer};
use crate::state::AppState;

pub use recovery::panic_response;

/// Wrap `router` in the full middleware chain.
///
/// This is the only place the order of the layers is decided.
pub fn apply<S>(router: Router<S>, state: &AppState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let csrf = &state.config().session.csrf;
    tracing::info!(
        csrf_enabled = csrf.enabled,
        cookie = %state.config().session.cookie_name,
        "Middleware chain: panic recovery, tracing, session, CSRF"
    );

    router.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new())
                    .on_response(DefaultOnResponse::new()),
            )
            .layer(SessionLayer::new(state.sessions().clone()))
            .layer(CsrfLayer::new(csrf.clone())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::{CsrfToken, Session, SessionId};
    use axum::{
        body::Body,
        http::{header, HeaderMap, HeaderValue, Request, StatusCode},
        routing::{get, post},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    fn state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.templates.dir = dir.path().to_path_buf();
        AppState::builder().config(config).build().unwrap()
    }

    fn cookie_of(response: &axum::response::Response) -> String {
        response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let state = state();
        let app = apply(
            Router::new().route("/boom", get(|| async { panic!("kaboom") as () })),
            &state,
        );

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_session_written_before_panic_is_kept() {
        let state = state();
        let seen: Arc<Mutex<Option<SessionId>>> = Arc::new(Mutex::new(None));
        let seen_in_handler = seen.clone();

        let app = apply(
            Router::new().route(
                "/boom",
                get(move |session: Session| {
                    let seen = seen_in_handler.clone();
                    async move {
                        session.put("step", "started");
                        *seen.lock().unwrap() = Some(session.id());
                        if session.contains("step") {
                            panic!("failed halfway");
                        }
                        "done"
                    }
                }),
            ),
            &state,
        );

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let id = seen.lock().unwrap().clone().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("session_id={id}")).unwrap(),
        );
        let session = state.sessions().load(&headers).await;
        assert_eq!(session.get_string("step").as_deref(), Some("started"));
    }

    #[tokio::test]
    async fn test_csrf_runs_inside_session_and_before_handler() {
        let state = state();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let app = apply(
            Router::new()
                .route("/token", get(|csrf: CsrfToken| async move { csrf.token().to_string() }))
                .route(
                    "/mutate",
                    post(move |session: Session| {
                        let counter = counter.clone();
                        async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            session.put("mutated", "yes");
                            "ok"
                        }
                    }),
                ),
            &state,
        );

        let response = app
            .clone()
            .oneshot(Request::get("/token").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = cookie_of(&response);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let token = String::from_utf8(body.to_vec()).unwrap();

        let rejected = app
            .clone()
            .oneshot(
                Request::post("/mutate")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
        assert!(rejected.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        assert!(!state.sessions().load(&headers).await.contains("mutated"));

        let accepted = app
            .oneshot(
                Request::post("/mutate")
                    .header(header::COOKIE, &cookie)
                    .header("X-CSRF-Token", &token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(state.sessions().load(&headers).await.contains("mutated"));
    }

    #[tokio::test]
    async fn test_get_is_never_forbidden() {
        let state = state();
        let app = apply(Router::new().route("/", get(|| async { "home" })), &state);

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(Request::get("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
