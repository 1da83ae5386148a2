//! Page handlers

use std::net::SocketAddr;

use quill::prelude::*;
use serde::{Deserialize, Serialize};

/// Session key for the visitor's address as seen on the home page
pub const REMOTE_IP_KEY: &str = "remoteIP";

/// Home page; remembers where the visitor connected from.
pub async fn home(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    session: Session,
) -> Result<Response> {
    session.put(REMOTE_IP_KEY, remote.to_string());

    let ctx = RenderContext::new().with_current_path("/");
    state.renderer().render_page("home.page.html", ctx, &session)
}

/// About page; shows the first address this session was seen from.
pub async fn about(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    session: Session,
) -> Result<Response> {
    let remote_ip = match session.get_string(REMOTE_IP_KEY) {
        Some(recorded) => recorded,
        None => {
            let first = remote.to_string();
            session.put(REMOTE_IP_KEY, first.clone());
            first
        }
    };

    let ctx = RenderContext::new()
        .with_string("name", "John Doe")
        .with_string(REMOTE_IP_KEY, remote_ip)
        .with_current_path("/about");
    state.renderer().render_page("about.page.html", ctx, &session)
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Coffee {
    pub name: String,
    pub price: f32,
    pub message: String,
}

/// Purchase endpoint; CSRF-protected like every unsafe route.
pub async fn buy_coffee() -> Json<Coffee> {
    tracing::info!("Coffee purchased");
    Json(Coffee {
        name: "Cappuccino".to_string(),
        price: 2.50,
        message: "Thank you for your purchase".to_string(),
    })
}
