use crate::helpers::{assert_no_store, spawn_app};
use actix_web::test;

#[actix_web::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let request = test::TestRequest::get().uri("/health_check").to_request();
    let response = test::call_service(&app, request).await;

    assert!(response.status().is_success());
    assert_no_store(&response);
}

#[actix_web::test]
async fn unknown_routes_are_not_cached_either() {
    let app = spawn_app().await;

    let request = test::TestRequest::get()
        .uri("/api/system/does-not-exist")
        .to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 404);
    assert_no_store(&response);
}
