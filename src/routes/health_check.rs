use crate::core::no_store;
use actix_web::{get, HttpResponse};

#[get("/health_check")]
pub async fn health_check() -> HttpResponse {
    no_store(HttpResponse::Ok()).finish()
}
