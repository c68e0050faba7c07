use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::handlers::health::HealthStatus;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::gacha::list_gachas,
        handlers::gacha::get_gacha,
        handlers::gacha::apply_gacha,
        handlers::gacha::apply_item,
        handlers::gacha::export,
        handlers::gacha::import,
        handlers::health::health,
    ),
    components(
        schemas(
            CreateGacha,
            EditGacha,
            DeleteGacha,
            CreateItem,
            EditItem,
            DeleteItem,
            GachaResponse,
            ItemResponse,
            GachaDetailResponse,
            GachaRecord,
            ItemRecord,
            GachaExport,
            ImportSummary,
            HealthStatus,
            ApiError,
        )
    ),
    tags(
        (name = "gacha", description = "Gacha configs and item tables"),
        (name = "transfer", description = "Import and export of a guild's gachas"),
        (name = "health", description = "Liveness"),
    ),
    info(
        title = "Gacha Dispatcher API",
        version = "1.0.0",
        description = "Administration API for chat-triggered gachas"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_admin_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/guilds/{guild_id}/gachas"));
        assert!(paths.iter().any(|p| p.as_str() == "/guilds/{guild_id}/import"));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
    }
}
