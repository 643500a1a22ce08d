//! Item lookup handlers.

use axum::extract::{Path, State};
use axum::Json;
use vharvest_models::ItemDetail;

use crate::error::ApiResult;
use crate::state::AppState;

/// Stored title, description and presigned media links of a successful item.
pub async fn get_item(
    State(state): State<AppState>,
    Path(id_tag): Path<String>,
) -> ApiResult<Json<ItemDetail>> {
    Ok(Json(state.service.item_detail(&id_tag).await?))
}
