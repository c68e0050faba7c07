use crate::error::AppError;
use crate::models::*;
use crate::services::GachaService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/guilds/{guild_id}/gachas",
    tag = "gacha",
    params(
        ("guild_id" = String, Path, description = "Guild the gachas belong to")
    ),
    responses(
        (status = 200, description = "Gachas of the guild in creation order", body = [GachaResponse]),
        (status = 400, description = "Malformed guild id", body = ApiError)
    )
)]
pub async fn list_gachas(
    service: web::Data<GachaService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let guild_id = path.into_inner();
    match service.list_gachas(&guild_id).await {
        Ok(list) => Ok(HttpResponse::Ok().json(ApiResponse::success(list))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/guilds/{guild_id}/gachas/{name}",
    tag = "gacha",
    params(
        ("guild_id" = String, Path, description = "Guild the gacha belongs to"),
        ("name" = String, Path, description = "Gacha name")
    ),
    responses(
        (status = 200, description = "Gacha with its item table and draw shares", body = GachaDetailResponse),
        (status = 404, description = "No such gacha", body = ApiError)
    )
)]
pub async fn get_gacha(
    service: web::Data<GachaService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (guild_id, name) = path.into_inner();
    match service.get_gacha(&guild_id, &name).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(ApiResponse::success(detail))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/guilds/{guild_id}/gachas",
    tag = "gacha",
    params(
        ("guild_id" = String, Path, description = "Guild the gacha belongs to")
    ),
    request_body(
        content = CreateGacha,
        description = "Gacha command tagged by `action`: `create` (CreateGacha), `edit` (EditGacha) or `delete` (DeleteGacha)"
    ),
    responses(
        (status = 200, description = "Command applied; `data` is the resulting gacha, absent after delete", body = GachaResponse),
        (status = 400, description = "Invalid command", body = ApiError),
        (status = 404, description = "No such gacha", body = ApiError),
        (status = 409, description = "Name already taken", body = ApiError)
    )
)]
pub async fn apply_gacha(
    service: web::Data<GachaService>,
    path: web::Path<String>,
    command: web::Json<GachaCommand>,
) -> Result<HttpResponse> {
    let guild_id = path.into_inner();
    match service.apply_gacha(&guild_id, command.into_inner()).await {
        Ok(Some(gacha)) => Ok(HttpResponse::Ok().json(ApiResponse::success(gacha))),
        Ok(None) => Ok(HttpResponse::Ok().json(ApiResponse {
            success: true,
            data: None::<GachaResponse>,
            message: Some("gacha deleted".into()),
            error: None,
        })),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/guilds/{guild_id}/gachas/{name}/items",
    tag = "gacha",
    params(
        ("guild_id" = String, Path, description = "Guild the gacha belongs to"),
        ("name" = String, Path, description = "Gacha whose item table is changed")
    ),
    request_body(
        content = CreateItem,
        description = "Item command tagged by `action`: `create` (CreateItem), `edit` (EditItem) or `delete` (DeleteItem)"
    ),
    responses(
        (status = 200, description = "Command applied; `data` is the resulting item, absent after delete", body = ItemResponse),
        (status = 400, description = "Invalid command", body = ApiError),
        (status = 404, description = "No such gacha or item", body = ApiError),
        (status = 409, description = "Item name already taken", body = ApiError)
    )
)]
pub async fn apply_item(
    service: web::Data<GachaService>,
    path: web::Path<(String, String)>,
    command: web::Json<ItemCommand>,
) -> Result<HttpResponse> {
    let (guild_id, name) = path.into_inner();
    match service.apply_item(&guild_id, &name, command.into_inner()).await {
        Ok(Some(item)) => Ok(HttpResponse::Ok().json(ApiResponse::success(item))),
        Ok(None) => Ok(HttpResponse::Ok().json(ApiResponse {
            success: true,
            data: None::<ItemResponse>,
            message: Some("item deleted".into()),
            error: None,
        })),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/guilds/{guild_id}/export",
    tag = "transfer",
    params(
        ("guild_id" = String, Path, description = "Guild to export")
    ),
    responses(
        (status = 200, description = "Every gacha of the guild with its items", body = [GachaExport])
    )
)]
pub async fn export(
    service: web::Data<GachaService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let guild_id = path.into_inner();
    match service.export(&guild_id).await {
        Ok(records) => Ok(HttpResponse::Ok().json(ApiResponse::success(records))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/guilds/{guild_id}/import",
    tag = "transfer",
    params(
        ("guild_id" = String, Path, description = "Guild to import into")
    ),
    request_body = [GachaExport],
    responses(
        (status = 200, description = "All records created", body = ImportSummary),
        (status = 400, description = "Invalid record; nothing was imported", body = ApiError),
        (status = 409, description = "A gacha name already exists; nothing was imported", body = ApiError)
    )
)]
pub async fn import(
    service: web::Data<GachaService>,
    path: web::Path<String>,
    records: web::Json<Vec<GachaExport>>,
) -> Result<HttpResponse> {
    let guild_id = path.into_inner();
    match service.import(&guild_id, records.into_inner()).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            summary,
            "import completed",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 请求体格式错误时同样返回统一的错误结构
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into())
}

/// `/guilds/{guild_id}` 下的路由
pub fn gacha_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/guilds/{guild_id}")
            .app_data(json_config())
            .route("/gachas", web::get().to(list_gachas))
            .route("/gachas", web::post().to(apply_gacha))
            .route("/gachas/{name}", web::get().to(get_gacha))
            .route("/gachas/{name}/items", web::post().to(apply_item))
            .route("/export", web::get().to(export))
            .route("/import", web::post().to(import)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::connect_test_db;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(GachaService::new(connect_test_db().await)))
                    .service(web::scope("/api/v1").configure(gacha_config)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_create_then_fetch_detail() {
        let app = app!();

        let req = test::TestRequest::post()
            .uri("/api/v1/guilds/g1/gachas")
            .set_json(json!({ "action": "create", "name": "daily", "trigger_phrase": "!daily" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["trigger_phrase"], "!daily");

        let req = test::TestRequest::post()
            .uri("/api/v1/guilds/g1/gachas/daily/items")
            .set_json(json!({ "action": "create", "item_name": "Common", "rarity": "N", "weight": 3 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["share"], 1.0);

        let req = test::TestRequest::get()
            .uri("/api/v1/guilds/g1/gachas/daily")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["gacha"]["name"], "daily");
        assert_eq!(body["data"]["items"][0]["item_name"], "Common");
        assert_eq!(body["data"]["total_weight"], 3.0);
    }

    #[actix_web::test]
    async fn test_errors_use_envelope_and_status() {
        let app = app!();

        let req = test::TestRequest::get()
            .uri("/api/v1/guilds/g1/gachas/missing")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let req = test::TestRequest::post()
            .uri("/api/v1/guilds/g1/gachas")
            .set_json(json!({ "action": "create", "name": "  " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/guilds/g1/gachas")
            .set_json(json!({ "action": "explode" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[actix_web::test]
    async fn test_import_conflict_is_409() {
        let app = app!();
        let records = json!([{ "config": { "name": "daily" }, "items": [
            { "item_name": "Common", "weight": 1 }
        ] }]);

        let req = test::TestRequest::post()
            .uri("/api/v1/guilds/g1/import")
            .set_json(&records)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["gachas"], 1);
        assert_eq!(body["data"]["items"], 1);

        let req = test::TestRequest::post()
            .uri("/api/v1/guilds/g1/import")
            .set_json(&records)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::get()
            .uri("/api/v1/guilds/g1/export")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["data"][0]["config"]["trigger_phrase"], "daily");
    }
}
