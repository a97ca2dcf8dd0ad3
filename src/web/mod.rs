pub mod api;

use salvo::prelude::*;

pub fn router() -> Router {
    Router::new().push(api::validate_api::validate_router())
}
