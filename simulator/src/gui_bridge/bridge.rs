use crate::gui_bridge::model::VisualizationModel;
use anyhow::{Context, Result};
use log::info;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{Filter, Rejection, Reply};

pub type SharedModel = Arc<RwLock<VisualizationModel>>;

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

pub(crate) fn read_model(state: &SharedModel) -> VisualizationModel {
    match state.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub(crate) fn write_model<F>(state: &SharedModel, update: F)
where
    F: FnOnce(&mut VisualizationModel),
{
    match state.write() {
        Ok(mut guard) => update(&mut guard),
        Err(poisoned) => update(&mut poisoned.into_inner()),
    }
}

/// `GET /payload` serves the whole model, `GET /status` the counters.
pub fn routes(
    state: SharedModel,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone + Send + Sync + 'static {
    let state_filter = warp::any().map(move || state.clone());

    let payload_route = warp::path("payload")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedModel| warp::reply::json(&read_model(&state)));

    let status_route = warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter)
        .map(|state: SharedModel| {
            let model = read_model(&state);
            warp::reply::json(&json!({
                "description": model.description,
                "tick": model.tick,
                "drained": model.drained,
                "rejected": model.rejected,
                "tick_failures": model.tick_failures,
            }))
        });

    payload_route.or(status_route)
}

/// Holds the latest render model and optionally serves it over HTTP.
pub struct GuiBridge {
    state: SharedModel,
}

impl GuiBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(VisualizationModel::default())),
        }
    }

    pub fn shared(&self) -> SharedModel {
        Arc::clone(&self.state)
    }

    /// Starts `GET /payload` and `GET /status` on a background thread.
    pub fn serve(&self, addr: SocketAddr) -> Result<()> {
        let routes = routes(self.shared());
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building runtime for the HTTP bridge")?;
        thread::Builder::new()
            .name("gui-bridge".into())
            .spawn(move || {
                runtime.block_on(async move {
                    warp::serve(routes).run(addr).await;
                });
            })
            .context("spawning HTTP bridge thread")?;

        self.publish_status(&format!("HTTP bridge listening on http://{}", addr));
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        info!("[GUI] {}", message);
    }

    pub fn snapshot(&self) -> VisualizationModel {
        read_model(&self.state)
    }
}

impl Default for GuiBridge {
    fn default() -> Self {
        Self::new()
    }
}
