mod api;
mod config;
mod database;
mod middleware;
mod models;
mod services;
mod state;
mod utils;

#[cfg(test)]
mod testing;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    log::info!("🚀 Starting ITBI Search Service...");
    log::info!("🗄️  Supabase: {}", config.supabase_url);
    log::info!("↩️  OAuth callback: {}", config.callback_url());

    let client = match database::SupabaseClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            log::error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let host = config.host.clone();
    let port = config.port.clone();
    let frontend_url = config.frontend_url.clone();
    let app_state = web::Data::new(state::AppState::with_supabase(config, client));

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .expose_headers(vec![
                actix_web::http::header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        // Generate OpenAPI document
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            // Metrics
            .route("/metrics", web::get().to(api::metrics::get_metrics))
            // Auth endpoints
            .service(
                web::scope("/api/v1/auth")
                    .route("/login", web::post().to(api::auth::login))
                    .route("/register", web::post().to(api::auth::register))
                    .route("/oauth", web::get().to(api::auth::oauth_start))
                    .route("/callback", web::get().to(api::auth::callback))
                    .route("/session", web::get().to(api::auth::session))
                    .service(
                        web::resource("/logout")
                            .wrap(middleware::auth::AuthMiddleware)
                            .route(web::post().to(api::auth::logout))
                    )
                    .service(
                        web::resource("/me")
                            .wrap(middleware::auth::AuthMiddleware)
                            .route(web::get().to(api::auth::get_me))
                    )
            )

            // ==================== ITBI SEARCH ====================

            // Years: public catalog (RPC, cached)
            .route("/api/v1/years", web::get().to(api::search::get_years))

            // Search: requires JWT, consumes free plan quota
            .service(
                web::scope("/api/v1/search")
                    .wrap(middleware::auth::AuthMiddleware)
                    .route("", web::post().to(api::search::search))
                    .route("/refine", web::post().to(api::search::refine))
            )
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
