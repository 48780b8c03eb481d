use salvo::prelude::*;
use serde_json::json;

use crate::web::metrics::Metrics;
use crate::web::web_state;

#[handler]
pub async fn health_check(res: &mut Response) {
    let payload = match web_state() {
        Some(state) => json!({
            "status": "running",
            "uptime_seconds": Metrics::uptime_seconds(),
            "version": env!("CARGO_PKG_VERSION"),
            "channel": state.channel,
            "users": state.users,
        }),
        None => json!({ "status": "starting" }),
    };
    res.render(Json(payload));
}
