// src/web/routes.rs
use crate::{
    state::AppState,
    web::{
        attendance_handlers, auth_handlers, mw_admin, mw_auth, qr_handlers, timetable_handlers, user_handlers,
    },
};
use axum::{
    handler::Handler,
    middleware,
    routing::{get, post},
    Router,
};

pub fn create_router(app_state: AppState) -> Router {
    // --- Rotas Públicas ---
    let public_routes = Router::new()
        .route("/auth/login", post(auth_handlers::handle_login))
        .route("/auth/logout", post(auth_handlers::handle_logout))
        .route("/qr/verify-login", post(qr_handlers::verify_login_qr));

    // --- Rotas de Admin ---
    // mw_auth é aplicado no router pai
    let admin_routes = Router::new()
        .route("/users", get(user_handlers::list_users).post(user_handlers::create_user))
        .route("/timetables/generate", post(timetable_handlers::generate_timetable))
        .route_layer(middleware::from_fn(mw_admin::require_admin));

    // --- Rotas de Docentes (e admins) ---
    let staff_routes = Router::new()
        .route(
            "/timetables/{id}/classes/{course_code}/enroll",
            post(timetable_handlers::enroll_student),
        )
        .route("/attendance", post(attendance_handlers::mark_attendance))
        .route("/attendance/class/{id}", get(attendance_handlers::class_attendance))
        .route("/qr/generate-attendance", post(qr_handlers::generate_attendance_qr))
        .route_layer(middleware::from_fn(mw_admin::require_staff));

    // --- Rotas Autenticadas ---
    let authenticated_routes = Router::new()
        .route("/auth/me", get(auth_handlers::handle_me))
        .route("/timetables", get(timetable_handlers::list_timetables))
        .route(
            "/timetables/{id}",
            get(timetable_handlers::get_timetable).delete(
                // mesmo caminho que o GET, por isso o admin é verificado só neste método
                timetable_handlers::delete_timetable.layer(middleware::from_fn(mw_admin::require_admin)),
            ),
        )
        .route("/attendance/student/{id}", get(attendance_handlers::student_history))
        .route("/qr/generate-login", post(qr_handlers::generate_login_qr))
        .route("/qr/verify-attendance", post(qr_handlers::verify_attendance_qr))
        .merge(admin_routes)
        .merge(staff_routes)
        // require_auth corre antes dos layers de admin/staff acima
        .route_layer(middleware::from_fn(mw_auth::require_auth));

    let api = Router::new().merge(public_routes).merge(authenticated_routes);

    Router::new().nest("/api", api).with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, db, models::user::Role, services::user_service};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use tower_sessions::SessionManagerLayer;
    use tower_sessions_sqlx_store::SqliteStore;

    async fn test_app() -> (Router, sqlx::SqlitePool) {
        let pool = db::test_pool().await;
        let store = SqliteStore::new(pool.clone());
        store.migrate().await.unwrap();

        let secret = "k".repeat(64);
        let config = AppConfig::from_lookup(move |key: &str| match key {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            "SESSION_SECRET" => Some(secret.clone()),
            _ => None,
        })
        .unwrap();

        let app = create_router(AppState::new(pool.clone(), config))
            .layer(SessionManagerLayer::new(store).with_secure(false));
        (app, pool)
    }

    async fn add_user(pool: &sqlx::SqlitePool, username: &str, role: Role) -> String {
        user_service::create_user_with_cost(pool, username, "secret123", username, role, None, 4)
            .await
            .unwrap()
            .id
    }

    async fn send(app: &Router, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        let raw = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("set-cookie")
            .to_str()
            .unwrap();
        raw.split(';').next().unwrap().to_string()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &Router, username: &str) -> String {
        let response = send(
            app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": username, "password": "secret123" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response)
    }

    #[tokio::test]
    async fn protected_routes_need_a_session() {
        let (app, _pool) = test_app().await;
        let response = send(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let (app, pool) = test_app().await;
        add_user(&pool, "ana", Role::Student).await;
        let response = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ana", "password": "errada" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn roles_gate_admin_and_staff_routes() {
        let (app, pool) = test_app().await;
        add_user(&pool, "aluno", Role::Student).await;
        add_user(&pool, "prof", Role::Faculty).await;
        let student = login(&app, "aluno").await;
        let faculty = login(&app, "prof").await;

        let me = send(&app, Method::GET, "/api/auth/me", Some(&student), None).await;
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(json_body(me).await["data"]["role"], "student");

        let qr_body = json!({ "classId": "CS101" });
        let response = send(&app, Method::POST, "/api/qr/generate-attendance", Some(&student), Some(qr_body.clone())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = send(&app, Method::POST, "/api/qr/generate-attendance", Some(&faculty), Some(qr_body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(&app, Method::GET, "/api/users", Some(&faculty), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = send(&app, Method::DELETE, "/api/timetables/qualquer", Some(&faculty), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn attendance_qr_is_single_use() {
        let (app, pool) = test_app().await;
        add_user(&pool, "prof", Role::Faculty).await;
        let student_id = add_user(&pool, "aluno", Role::Student).await;
        let faculty = login(&app, "prof").await;
        let student = login(&app, "aluno").await;

        let response = send(
            &app,
            Method::POST,
            "/api/qr/generate-attendance",
            Some(&faculty),
            Some(json!({ "classId": "CS101", "expiryMinutes": 5 })),
        )
        .await;
        let token = json_body(response).await["data"]["token"].as_str().unwrap().to_string();

        // Sem sessão: recusado e o nonce continua livre
        let anonymous = send(&app, Method::POST, "/api/qr/verify-attendance", None, Some(json!({ "token": token }))).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let first = send(&app, Method::POST, "/api/qr/verify-attendance", Some(&student), Some(json!({ "token": token }))).await;
        assert_eq!(first.status(), StatusCode::OK);
        let body = json_body(first).await;
        assert_eq!(body["data"]["studentId"], student_id.as_str());
        assert_eq!(body["data"]["method"], "qr");

        let second = send(&app, Method::POST, "/api/qr/verify-attendance", Some(&student), Some(json!({ "token": token }))).await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(second).await["data"]["reason"], "REPLAYED");

        let history = send(&app, Method::GET, &format!("/api/attendance/student/{}", student_id), Some(&student), None).await;
        assert_eq!(json_body(history).await["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn login_qr_opens_a_session_once() {
        let (app, pool) = test_app().await;
        add_user(&pool, "aluno", Role::Student).await;
        let student = login(&app, "aluno").await;

        let response = send(&app, Method::POST, "/api/qr/generate-login", Some(&student), None).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let token = json_body(response).await["data"]["token"].as_str().unwrap().to_string();

        // Um QR de login não serve para marcar presença (e não é consumido)
        let wrong = send(&app, Method::POST, "/api/qr/verify-attendance", Some(&student), Some(json!({ "token": token }))).await;
        assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);

        let accepted = send(&app, Method::POST, "/api/qr/verify-login", None, Some(json!({ "token": token }))).await;
        assert_eq!(accepted.status(), StatusCode::OK);
        let cookie = session_cookie(&accepted);
        let me = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
        assert_eq!(json_body(me).await["data"]["username"], "aluno");

        let replay = send(&app, Method::POST, "/api/qr/verify-login", None, Some(json!({ "token": token }))).await;
        assert_eq!(replay.status(), StatusCode::CONFLICT);

        let garbage = send(&app, Method::POST, "/api/qr/verify-login", None, Some(json!({ "token": "lixo" }))).await;
        assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_generates_and_reads_a_timetable() {
        let (app, pool) = test_app().await;
        add_user(&pool, "admin", Role::Admin).await;
        let admin = login(&app, "admin").await;

        let spec = json!({
            "name": "CS Sem 1",
            "department": "Computer Science",
            "semester": "1",
            "academicYear": "2024-25",
            "startDate": "2024-09-01",
            "endDate": "2024-12-20",
            "subjects": ["Math", "Physics"],
            "faculty": ["Dr. A", "Dr. B"],
            "rooms": ["R1"],
            "constraints": { "maxClassesPerDay": 4 }
        });
        let response = send(&app, Method::POST, "/api/timetables/generate", Some(&admin), Some(spec)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["classes"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["classes"][0]["courseCode"], "AUTO-1");

        let fetched = send(&app, Method::GET, &format!("/api/timetables/{}", id), Some(&admin), None).await;
        assert_eq!(fetched.status(), StatusCode::OK);

        let deleted = send(&app, Method::DELETE, &format!("/api/timetables/{}", id), Some(&admin), None).await;
        assert_eq!(deleted.status(), StatusCode::OK);
        let missing = send(&app, Method::GET, &format!("/api/timetables/{}", id), Some(&admin), None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_attendance_write_leaves_the_qr_usable() {
        let (app, pool) = test_app().await;
        add_user(&pool, "prof", Role::Faculty).await;
        add_user(&pool, "aluno", Role::Student).await;
        let faculty = login(&app, "prof").await;
        let student = login(&app, "aluno").await;

        let response = send(
            &app,
            Method::POST,
            "/api/qr/generate-attendance",
            Some(&faculty),
            Some(json!({ "classId": "CS101" })),
        )
        .await;
        let token = json_body(response).await["data"]["token"].as_str().unwrap().to_string();

        // Sem tabela de presenças o UPSERT falha
        sqlx::query("ALTER TABLE attendance RENAME TO attendance_off")
            .execute(&pool)
            .await
            .unwrap();
        let failed = send(&app, Method::POST, "/api/qr/verify-attendance", Some(&student), Some(json!({ "token": token }))).await;
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);

        sqlx::query("ALTER TABLE attendance_off RENAME TO attendance")
            .execute(&pool)
            .await
            .unwrap();
        let retry = send(&app, Method::POST, "/api/qr/verify-attendance", Some(&student), Some(json!({ "token": token }))).await;
        assert_eq!(retry.status(), StatusCode::OK);
        let replay = send(&app, Method::POST, "/api/qr/verify-attendance", Some(&student), Some(json!({ "token": token }))).await;
        assert_eq!(replay.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn attendance_qr_expiry_is_validated() {
        let (app, pool) = test_app().await;
        add_user(&pool, "prof", Role::Faculty).await;
        let faculty = login(&app, "prof").await;

        // 0 e negativos: TTL inválido; 121 passa o máximo por omissão (120)
        for minutes in [0, -5, 121] {
            let response = send(
                &app,
                Method::POST,
                "/api/qr/generate-attendance",
                Some(&faculty),
                Some(json!({ "classId": "CS101", "expiryMinutes": minutes })),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "expiryMinutes = {}", minutes);
            let body = json_body(response).await;
            assert_eq!(body["success"], false);
            assert!(body["message"].as_str().is_some());
        }

        let ok = send(
            &app,
            Method::POST,
            "/api/qr/generate-attendance",
            Some(&faculty),
            Some(json!({ "classId": "CS101", "expiryMinutes": 120 })),
        )
        .await;
        assert_eq!(ok.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn infeasible_generation_reports_unplaced_count() {
        let (app, pool) = test_app().await;
        add_user(&pool, "admin", Role::Admin).await;
        let admin = login(&app, "admin").await;

        // 2 por dia x 5 dias = 10 células para 13 disciplinas
        let subjects: Vec<String> = (0..13).map(|i| format!("Disciplina {}", i)).collect();
        let spec = json!({
            "name": "Cheio",
            "department": "Computer Science",
            "semester": "1",
            "academicYear": "2024-25",
            "startDate": "2024-09-01",
            "endDate": "2024-12-20",
            "subjects": subjects,
            "faculty": ["Dr. A", "Dr. B"],
            "rooms": ["R1", "R2"],
            "constraints": { "maxClassesPerDay": 2 }
        });
        let response = send(&app, Method::POST, "/api/timetables/generate", Some(&admin), Some(spec)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["unplaced"], 3);
        assert_eq!(body["data"]["requested"], 13);

        let listed = send(&app, Method::GET, "/api/timetables", Some(&admin), None).await;
        assert!(json_body(listed).await["data"].as_array().unwrap().is_empty());
    }
}
