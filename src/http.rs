//! HTTP boundary (§4.11, §6): thin `actix-web` routes over [`GeoCore`].

use crate::core::GeoCore;
use crate::error::GeoError;
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct AppState {
    pub core: Arc<GeoCore>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub coords: String,
}

#[derive(Debug, Deserialize)]
pub struct RandomDeleteRequest {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct BatchInsertRequest {
    pub count: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

fn error_response(err: &GeoError) -> HttpResponse {
    match err {
        GeoError::BadRequest(msg) => HttpResponse::BadRequest().json(ErrorBody {
            status: "error",
            message: msg.clone(),
        }),
        other => {
            log::error!("request failed: {other}");
            HttpResponse::InternalServerError().json(ErrorBody {
                status: "error",
                message: other.to_string(),
            })
        }
    }
}

#[post("/api/query")]
async fn query(state: web::Data<AppState>, body: web::Json<QueryRequest>) -> impl Responder {
    match state.core.query(&body.coords) {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    status: &'static str,
    removed: bool,
}

#[delete("/api/objects/{id}")]
async fn delete_object(state: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    let id = path.into_inner();
    let removed = state.core.delete_one(id);
    HttpResponse::Ok().json(DeleteResponse {
        status: "ok",
        removed,
    })
}

#[derive(Debug, Serialize)]
struct RandomDeleteResponse {
    status: &'static str,
    achieved_count: u64,
}

#[post("/api/objects/random-delete")]
async fn random_delete(state: web::Data<AppState>, body: web::Json<RandomDeleteRequest>) -> impl Responder {
    match state.core.delete_random(body.count) {
        Ok(achieved_count) => HttpResponse::Ok().json(RandomDeleteResponse {
            status: "ok",
            achieved_count,
        }),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Serialize)]
struct BatchInsertResponse {
    status: &'static str,
    ok: bool,
}

#[post("/api/objects/batch")]
async fn batch_insert(state: web::Data<AppState>, body: web::Json<BatchInsertRequest>) -> impl Responder {
    match state.core.insert_batch(body.count) {
        Ok(ok) => HttpResponse::Ok().json(BatchInsertResponse { status: "ok", ok }),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Serialize)]
struct CountResponse {
    status: &'static str,
    count: usize,
}

#[get("/api/count")]
async fn count(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(CountResponse {
        status: "ok",
        count: state.core.count(),
    })
}

#[get("/api/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(query)
        .service(delete_object)
        .service(random_delete)
        .service(batch_insert)
        .service(count)
        .service(health);
}
