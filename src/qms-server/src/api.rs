// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{get, post, web, Error, HttpRequest, HttpResponse, Responder};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use qms_call_log::MAX_RECENT;
use qms_core::call::ISO_TIMESTAMP_FORMAT;
use qms_core::{CallError, CallRequest};

use crate::dispatcher::CallDispatcher;
use crate::media::MediaLibrary;
use crate::server::realtime;

const DEFAULT_RECENT: usize = 10;

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "status": "error",
        "message": message,
    }))
}

fn blocking_error(e: actix_web::error::BlockingError) -> Error {
    error!("blocking task failed: {}", e);
    actix_web::error::ErrorInternalServerError("Internal server error")
}

#[post("/api/call_number")]
pub async fn call_number(
    body: web::Bytes,
    dispatcher: web::Data<CallDispatcher>,
) -> impl Responder {
    let request = serde_json::from_slice::<serde_json::Value>(&body)
        .map_err(|_| CallError::MissingPayload)
        .and_then(CallRequest::from_json);
    let request = match request {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    match dispatcher.process_request(&request).await {
        Ok(record) => HttpResponse::Ok().json(json!({
            "status": "success",
            "message": "Call processed and logged successfully",
            "data": {"number": record.number, "counter": record.counter},
        })),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

#[get("/api/current_state")]
pub async fn current_state(dispatcher: web::Data<CallDispatcher>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "success",
        "data": dispatcher.snapshot(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[get("/api/logs/recent")]
pub async fn recent_logs(
    query: web::Query<RecentQuery>,
    dispatcher: web::Data<CallDispatcher>,
) -> Result<HttpResponse, Error> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT).min(MAX_RECENT);
    let log = dispatcher.call_log();
    let rows = web::block(move || log.recent(limit))
        .await
        .map_err(blocking_error)?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "count": rows.len(),
        "data": rows,
    })))
}

#[get("/api/logs/date/{date}")]
pub async fn logs_by_date(
    path: web::Path<String>,
    dispatcher: web::Data<CallDispatcher>,
) -> Result<HttpResponse, Error> {
    let date = path.into_inner();
    if NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "Invalid date format. Use YYYY-MM-DD",
        ));
    }

    let log = dispatcher.call_log();
    let query_date = date.clone();
    let rows = web::block(move || log.by_date(&query_date))
        .await
        .map_err(blocking_error)?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "count": rows.len(),
        "data": rows,
        "date": date,
    })))
}

#[get("/api/logs/stats")]
pub async fn logs_stats(dispatcher: web::Data<CallDispatcher>) -> Result<HttpResponse, Error> {
    let log = dispatcher.call_log();
    let today = Local::now().format("%Y-%m-%d").to_string();
    let stats = web::block(move || log.stats(&today))
        .await
        .map_err(blocking_error)?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": {
            "today": {
                "date": stats.date,
                "total_calls": stats.total_calls,
                "counter_usage": stats.counter_usage,
            },
            "recent": {
                "total_calls": stats.recent_total,
            },
        },
    })))
}

#[get("/api/media-list")]
pub async fn media_list(media: web::Data<MediaLibrary>) -> Result<HttpResponse, Error> {
    let media = media.into_inner();
    let files = web::block(move || media.list())
        .await
        .map_err(blocking_error)?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "count": files.len(),
        "media_files": files,
    })))
}

#[get("/health")]
pub async fn health(
    dispatcher: web::Data<CallDispatcher>,
    subscribers: web::Data<Arc<AtomicUsize>>,
) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Local::now().format(ISO_TIMESTAMP_FORMAT).to_string(),
        "calls_in_history": dispatcher.history_len(),
        "csv_logging": "enabled",
        "subscribers": subscribers.load(Ordering::Relaxed),
    }))
}

async fn not_found() -> HttpResponse {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn query_error(err: actix_web::error::QueryPayloadError, _req: &HttpRequest) -> Error {
    let message = format!("Invalid query parameters: {err}");
    actix_web::error::InternalError::from_response(
        err,
        error_response(StatusCode::BAD_REQUEST, &message),
    )
    .into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(query_error))
        .service(call_number)
        .service(current_state)
        .service(recent_logs)
        .service(logs_by_date)
        .service(logs_stats)
        .service(media_list)
        .service(health)
        .service(realtime::ws)
        .service(realtime::events)
        .default_service(web::to(not_found));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use serde_json::Value;

    use qms_cloud::CloudSinks;

    use crate::config::MediaConfig;
    use crate::dispatcher::tests::dispatcher_with;
    use crate::server::{self, AppContext};

    fn context(dir: &tempfile::TempDir) -> AppContext {
        let media_dir = dir.path().join("media");
        std::fs::create_dir_all(&media_dir).unwrap();
        std::fs::write(media_dir.join("intro.mp4"), b"").unwrap();
        let media = MediaLibrary::new(&MediaConfig {
            dir: media_dir.to_string_lossy().to_string(),
            ..MediaConfig::default()
        });
        AppContext::new(
            dispatcher_with(dir, 4, CloudSinks::default()),
            media,
            "*".to_string(),
        )
    }

    macro_rules! app {
        ($ctx:expr) => {{
            let ctx = $ctx.clone();
            test::init_service(App::new().configure(move |cfg| server::configure(cfg, &ctx))).await
        }};
    }

    macro_rules! post_call {
        ($app:expr, $body:expr) => {{
            let req = test::TestRequest::post()
                .uri("/api/call_number")
                .insert_header(("content-type", "application/json"))
                .set_payload($body.to_string())
                .to_request();
            let resp = test::call_service(&$app, req).await;
            let status = resp.status();
            let body: Value = test::read_body_json(resp).await;
            (status, body)
        }};
    }

    #[actix_web::test]
    async fn test_call_number_success() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let app = app!(ctx);

        let (status, body) = post_call!(app, r#"{"number":" A12 ","counter":"Counter 1"}"#);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["number"], "A12");
        assert_eq!(body["data"]["counter"], "Counter 1");

        let req = test::TestRequest::get().uri("/api/current_state").to_request();
        let state: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(state["data"]["current"]["number"], "A12");
        assert_eq!(state["data"]["history"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn test_call_number_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let app = app!(ctx);

        let cases = [
            ("", "No data provided"),
            ("{}", "No data provided"),
            ("not json", "No data provided"),
            (r#"{"number":"","counter":"C1"}"#, "Number is required"),
            (r#"{"number":"A1","counter":"   "}"#, "Counter is required"),
        ];
        for (payload, message) in cases {
            let (status, body) = post_call!(app, payload);
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload:?}");
            assert_eq!(body["status"], "error");
            assert_eq!(body["message"], message);
        }

        let long = "x".repeat(51);
        let (status, body) =
            post_call!(app, &format!(r#"{{"number":"A1","counter":"{long}"}}"#));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Counter name too long");

        assert_eq!(ctx.dispatcher.history_len(), 0);
        assert!(ctx.dispatcher.call_log().recent(10).is_empty());
    }

    #[actix_web::test]
    async fn test_logs_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let app = app!(ctx);

        for (number, counter) in [("A1", "Counter1"), ("B2", "Counter2"), ("C3", "Counter1")] {
            let body = format!(r#"{{"number":"{number}","counter":"{counter}"}}"#);
            let (status, _) = post_call!(app, &body);
            assert_eq!(status, StatusCode::OK);
        }

        let req = test::TestRequest::get().uri("/api/logs/recent?limit=2").to_request();
        let recent: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(recent["count"], 2);
        assert_eq!(recent["data"][0]["number"], "C3");
        assert_eq!(recent["data"][1]["number"], "B2");

        let today = Local::now().format("%Y-%m-%d").to_string();
        let req = test::TestRequest::get()
            .uri(&format!("/api/logs/date/{today}"))
            .to_request();
        let by_date: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(by_date["count"], 3);
        assert_eq!(by_date["date"], today.as_str());
        assert_eq!(by_date["data"][0]["number"], "A1");

        let req = test::TestRequest::get().uri("/api/logs/date/18-10-2026").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/logs/stats").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["data"]["today"]["total_calls"], 3);
        assert_eq!(stats["data"]["today"]["counter_usage"]["Counter1"], 2);
        assert_eq!(stats["data"]["recent"]["total_calls"], 3);
    }

    #[actix_web::test]
    async fn test_recent_limit_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let log = ctx.dispatcher.call_log();
        for i in 0..(MAX_RECENT + 5) {
            assert!(log.append(&qms_core::CallRecord::new(format!("N{i}"), "C1")));
        }
        let app = app!(ctx);

        let req = test::TestRequest::get().uri("/api/logs/recent?limit=500").to_request();
        let recent: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(recent["count"], MAX_RECENT);

        let req = test::TestRequest::get().uri("/api/logs/recent").to_request();
        let recent: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(recent["count"], DEFAULT_RECENT);
    }

    #[actix_web::test]
    async fn test_bad_limit_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let app = app!(ctx);

        for uri in ["/api/logs/recent?limit=abc", "/api/logs/recent?limit=-1"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["status"], "error");
            assert!(body["message"]
                .as_str()
                .unwrap()
                .starts_with("Invalid query parameters"));
        }
    }

    #[actix_web::test]
    async fn test_media_health_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let app = app!(ctx);

        let req = test::TestRequest::get().uri("/api/media-list").to_request();
        let media: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(media["count"], 1);
        assert_eq!(media["media_files"][0], "/static/media/intro.mp4");

        let req = test::TestRequest::get().uri("/health").to_request();
        let health_body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(health_body["status"], "healthy");
        assert_eq!(health_body["calls_in_history"], 0);
        assert_eq!(health_body["subscribers"], 0);

        let req = test::TestRequest::get().uri("/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Not found");
    }
}
