use salvo::prelude::*;

use crate::web::handlers::{health::health_check, metrics::metrics};

pub fn create_router() -> Router {
    Router::new()
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("metrics").get(metrics))
}
