use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::middleware::auth::{bearer_token, Claims};
use crate::models::SessionIdentity;
use crate::services::auth_service::{self, AuthResponse, LoginRequest, MeResponse, OAuthStartQuery, OAuthUrlResponse, RegisterRequest};
use crate::services::session_service::{self, Activation, CallbackParams, GateState};
use crate::state::AppState;

const DEFAULT_OAUTH_PROVIDER: &str = "google";

/// Estado da sessão do navegador
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> HttpResponse {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    match auth_service::login(&state, &request).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", request.email);
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful (token absent while email confirmation is pending)", body = AuthResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Provider rejected the registration")
    )
)]
pub async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterRequest>,
) -> HttpResponse {
    log::info!("📝 POST /auth/register - email: {}", request.email);

    match auth_service::register(&state, &request).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => {
            log::warn!("❌ Registration failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session closed"),
        (status = 401, description = "Missing or invalid session token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(state: web::Data<AppState>, claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("👋 POST /auth/logout - user: {}", claims.email);

    auth_service::logout(&state, &claims).await;

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Sessão encerrada."
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/oauth",
    tag = "Auth",
    params(OAuthStartQuery),
    responses(
        (status = 200, description = "Provider authorization URL", body = OAuthUrlResponse)
    )
)]
pub async fn oauth_start(
    state: web::Data<AppState>,
    query: web::Query<OAuthStartQuery>,
) -> HttpResponse {
    let provider = query
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_OAUTH_PROVIDER);
    log::info!("🔐 GET /auth/oauth - provider: {}", provider);

    HttpResponse::Ok().json(auth_service::start_oauth(&state, provider))
}

/// Destino do redirect depois do callback, sempre sem código/token do provedor
fn callback_redirect(frontend_url: &str, activation: &Activation) -> String {
    match (&activation.token, &activation.error) {
        (Some(token), _) => format!(
            "{}/auth-callback.html?access_token={}",
            frontend_url,
            urlencoding::encode(token)
        ),
        (None, Some(e)) => format!(
            "{}/auth-callback.html?error={}",
            frontend_url,
            urlencoding::encode(&e.to_string())
        ),
        (None, None) => frontend_url.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/callback",
    tag = "Auth",
    params(CallbackParams),
    responses(
        (status = 302, description = "Redirect to the frontend with the session token or error; provider code/token never forwarded")
    )
)]
pub async fn callback(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<CallbackParams>,
) -> HttpResponse {
    log::info!("🔐 GET /auth/callback - Processing OAuth return");

    let bearer = bearer_token(&req);
    let activation = session_service::activate(&state, &query, bearer.as_deref()).await;

    if let Some(e) = &activation.error {
        log::error!("❌ OAuth callback error: {}", e);
    }

    HttpResponse::Found()
        .append_header(("Location", callback_redirect(&state.config.frontend_url, &activation)))
        .finish()
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/session",
    tag = "Auth",
    responses(
        (status = 200, description = "Authenticated identity or anonymous", body = SessionResponse)
    )
)]
pub async fn session(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let bearer = bearer_token(&req);
    let activation =
        session_service::activate(&state, &CallbackParams::default(), bearer.as_deref()).await;

    let user = match activation.state {
        GateState::Authenticated(identity) => Some(identity),
        _ => None,
    };

    HttpResponse::Ok().json(SessionResponse {
        authenticated: user.is_some(),
        user,
        error: activation.error.map(|e| e.to_string()),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user with plan and remaining searches", body = MeResponse),
        (status = 401, description = "Missing or invalid session token"),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(state: web::Data<AppState>, claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("👤 GET /auth/me - user: {}", claims.email);

    match auth_service::current_user(&state, &claims).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            log::warn!("❌ Failed to load profile for {}: {}", claims.sub, e);
            e.error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::AuthMiddleware;
    use crate::models::{Plan, UserProfile};
    use crate::testing::*;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new().app_data($state.clone()).service(
                    web::scope("/api/v1/auth")
                        .route("/login", web::post().to(login))
                        .route("/register", web::post().to(register))
                        .route("/oauth", web::get().to(oauth_start))
                        .route("/callback", web::get().to(callback))
                        .route("/session", web::get().to(session))
                        .service(
                            web::resource("/logout")
                                .wrap(AuthMiddleware)
                                .route(web::post().to(logout)),
                        )
                        .service(
                            web::resource("/me")
                                .wrap(AuthMiddleware)
                                .route(web::get().to(get_me)),
                        ),
                ),
            )
            .await
        };
    }

    fn location(resp: &actix_web::dev::ServiceResponse) -> String {
        resp.headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    macro_rules! login_token {
        ($app:expr) => {{
            let req = test::TestRequest::post()
                .uri("/api/v1/auth/login")
                .set_json(json!({ "email": VALID_EMAIL, "password": VALID_PASSWORD }))
                .to_request();
            let body: Value = test::call_and_read_body_json(&$app, req).await;
            body["token"].as_str().unwrap().to_string()
        }};
    }

    #[actix_rt::test]
    async fn test_login_then_me_then_logout() {
        let store = Arc::new(InMemoryStore::default().with_profile(UserProfile {
            id: "u1".to_string(),
            plan: Plan::Professional,
            searches_used: 40,
            last_reset_date: chrono::Utc::now().date_naive(),
        }));
        let state = web::Data::new(test_state(store));
        let app = app!(state);
        let token = login_token!(app);

        let req = test::TestRequest::get()
            .uri("/api/v1/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["plan"], "professional");
        assert_eq!(body["remaining_searches"], Value::Null);

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/logout")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_rt::test]
    async fn test_login_wrong_password_is_unauthorized() {
        let state = web::Data::new(test_state(Arc::new(InMemoryStore::default())));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .set_json(json!({ "email": VALID_EMAIL, "password": "nope" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_register_created() {
        let state = web::Data::new(test_state(Arc::new(InMemoryStore::default())));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/register")
            .set_json(json!({ "email": "novo@exatas.com.br", "password": "x", "name": "Novo" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[actix_rt::test]
    async fn test_oauth_callback_redirects_once() {
        let provider = Arc::new(FakeIdentityProvider::default());
        let state = web::Data::new(test_state_with_provider(
            Arc::new(InMemoryStore::default()),
            provider.clone(),
        ));
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/auth/oauth").to_request();
        let start: Value = test::call_and_read_body_json(&app, req).await;
        assert!(start["auth_url"].as_str().unwrap().contains("provider=google"));
        let flow = start["flow"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/auth/callback?code={}&flow={}", VALID_CODE, flow);
        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let first = location(&resp);
        assert!(first.starts_with("http://localhost:3000/auth-callback.html?access_token="));
        assert!(!first.contains(VALID_CODE));

        // mesmo callback de novo: sem nova troca, volta para a URL limpa
        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(location(&resp), "http://localhost:3000");
        assert_eq!(provider.exchange_count(), 1);
    }

    #[actix_rt::test]
    async fn test_callback_provider_error() {
        let state = web::Data::new(test_state(Arc::new(InMemoryStore::default())));
        let app = app!(state);

        let req = test::TestRequest::get()
            .uri("/api/v1/auth/callback?error=access_denied")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert!(location(&resp).contains("auth-callback.html?error="));
    }

    #[actix_rt::test]
    async fn test_session_resolution() {
        let state = web::Data::new(test_state(Arc::new(InMemoryStore::default())));
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/auth/session").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["authenticated"], false);

        let token = login_token!(app);
        let req = test::TestRequest::get()
            .uri("/api/v1/auth/session")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["user"]["email"], VALID_EMAIL);
    }

    #[actix_rt::test]
    async fn test_token_rejected_after_logout() {
        let store = Arc::new(InMemoryStore::default().with_profile(UserProfile {
            id: "u1".to_string(),
            plan: Plan::Free,
            searches_used: 0,
            last_reset_date: chrono::Utc::now().date_naive(),
        }));
        let state = web::Data::new(test_state(store.clone()));
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(
                    web::scope("/api/v1/auth")
                        .route("/login", web::post().to(login))
                        .route("/session", web::get().to(session))
                        .service(
                            web::resource("/logout")
                                .wrap(AuthMiddleware)
                                .route(web::post().to(logout)),
                        ),
                )
                .service(
                    web::scope("/api/v1/search")
                        .wrap(AuthMiddleware)
                        .route("", web::post().to(crate::api::search::search)),
                ),
        )
        .await;
        let token = login_token!(app);
        let auth = format!("Bearer {}", token);

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/logout")
            .insert_header(("Authorization", auth.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/v1/auth/session")
            .insert_header(("Authorization", auth.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["authenticated"], false);

        let req = test::TestRequest::post()
            .uri("/api/v1/search")
            .insert_header(("Authorization", auth))
            .set_json(json!({ "street": "Rua Augusta" }))
            .to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.query_count(), 0);
        assert_eq!(store.profile("u1").unwrap().searches_used, 0);
    }
}
