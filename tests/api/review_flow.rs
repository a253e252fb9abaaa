use crate::helpers::{
    assert_no_store, json_body, seed_file, seed_user, session_cookie, spawn_app_with_pool,
};
use actix_web::test;
use sqlx::PgPool;
use trading_portal::db::{course_access, file_access, notifications};
use trading_portal::models::course_access::AccessStatus;
use trading_portal::models::file_access::FileRequestStatus;

async fn count(pool: &PgPool, query: &str) -> i64 {
    sqlx::query_scalar(query)
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

#[sqlx::test]
async fn approving_course_five_notifies_the_student_once(pool: PgPool) {
    let admin = seed_user(&pool, "admin@example.com", "admin", None).await;
    let student = seed_user(&pool, "student@example.com", "student", None).await;
    let admin_cookie = session_cookie(&pool, admin).await;
    let student_cookie = session_cookie(&pool, student).await;
    let app = spawn_app_with_pool(pool.clone()).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/system/courses/request")
            .cookie(student_cookie)
            .set_json(serde_json::json!({"courseId": 5}))
            .to_request(),
    )
    .await;
    assert_eq!(response.status().as_u16(), 200);
    let body = json_body(response).await;
    assert_eq!(body["access"]["status"], "requested");

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/system/admin/course-access/bulk-review")
            .cookie(admin_cookie)
            .set_json(serde_json::json!({
                "items": [{"userId": student, "courseId": 5}],
                "action": "approve"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_no_store(&response);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({"ok": true, "updated": 1, "notified": 1}));

    let row = course_access::find(&pool, student, 5).await.unwrap().unwrap();
    assert_eq!(row.status, AccessStatus::Approved);
    assert_eq!(row.reviewed_by, Some(admin));

    let inbox = notifications::list_for_user(&pool, student).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "课程申请已通过 / Course approved");
    assert_eq!(inbox[0].from_user_id, Some(admin));
    assert!(inbox[0].content.as_deref().unwrap().contains("Course #5"));
}

#[sqlx::test]
async fn bulk_file_approval_grants_and_notifies_each_request(pool: PgPool) {
    let admin = seed_user(&pool, "admin@example.com", "admin", None).await;
    let admin_cookie = session_cookie(&pool, admin).await;

    let mut items = Vec::new();
    let mut requests = Vec::new();
    for i in 0..4 {
        let student = seed_user(&pool, &format!("s{}@example.com", i), "student", None).await;
        let title = format!("Handout {}", i);
        let file_id = seed_file(&pool, &title).await;
        file_access::submit(&pool, student, file_id).await.unwrap();
        items.push(serde_json::json!({"userId": student, "fileId": file_id}));
        requests.push((student, file_id, title));
    }
    let app = spawn_app_with_pool(pool.clone()).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/system/admin/file-access/bulk-review")
            .cookie(admin_cookie)
            .set_json(serde_json::json!({"items": items, "action": "approve"}))
            .to_request(),
    )
    .await;
    assert_eq!(response.status().as_u16(), 200);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({"ok": true, "updated": 4, "notified": 4}));

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM file_permissions").await, 4);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM notifications").await, 4);
    for (student, file_id, title) in &requests {
        let (permitted, status) = file_access::gate_state(&pool, *student, *file_id)
            .await
            .unwrap();
        assert!(permitted);
        assert_eq!(status, Some(FileRequestStatus::Approved));

        let inbox = notifications::list_for_user(&pool, *student).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].title, "文件申请已通过 / File access approved");
        assert!(inbox[0].content.as_deref().unwrap().contains(title.as_str()));
    }
}

#[sqlx::test]
async fn bulk_course_review_rejects_courses_outside_the_catalog(pool: PgPool) {
    let admin = seed_user(&pool, "admin@example.com", "admin", None).await;
    let student = seed_user(&pool, "student@example.com", "student", None).await;
    let admin_cookie = session_cookie(&pool, admin).await;
    let app = spawn_app_with_pool(pool.clone()).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/system/admin/course-access/bulk-review")
            .cookie(admin_cookie)
            .set_json(serde_json::json!({
                "items": [
                    {"userId": student, "courseId": 5},
                    {"userId": student, "courseId": 999}
                ],
                "action": "approve"
            }))
            .to_request(),
    )
    .await;

    assert_eq!(response.status().as_u16(), 400);
    let body = json_body(response).await;
    assert_eq!(body["error"], "INVALID_COURSE");
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM course_access").await, 0);
}

#[sqlx::test]
async fn leaders_cannot_review_other_leaders_students(pool: PgPool) {
    let leader = seed_user(&pool, "leader@example.com", "leader", None).await;
    let other_leader = seed_user(&pool, "other@example.com", "leader", None).await;
    let stranger = seed_user(&pool, "stranger@example.com", "student", Some(other_leader)).await;
    let leader_cookie = session_cookie(&pool, leader).await;
    course_access::submit(&pool, stranger, 5).await.unwrap();
    let app = spawn_app_with_pool(pool.clone()).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/system/admin/course-access/bulk-review")
            .cookie(leader_cookie)
            .set_json(serde_json::json!({
                "items": [{"userId": stranger, "courseId": 5}],
                "action": "approve"
            }))
            .to_request(),
    )
    .await;

    assert_eq!(response.status().as_u16(), 403);
    let row = course_access::find(&pool, stranger, 5).await.unwrap().unwrap();
    assert_eq!(row.status, AccessStatus::Requested);
}

#[sqlx::test]
async fn frozen_accounts_are_refused_with_a_live_session(pool: PgPool) {
    let student = seed_user(&pool, "frozen@example.com", "student", None).await;
    let cookie = session_cookie(&pool, student).await;
    sqlx::query("UPDATE system_profiles SET status = 'frozen' WHERE id = $1")
        .bind(student)
        .execute(&pool)
        .await
        .unwrap();
    let app = spawn_app_with_pool(pool).await;

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/system/auth/me")
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(response.status().as_u16(), 403);
    assert_no_store(&response);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({"ok": false, "error": "FROZEN"}));
}

#[sqlx::test]
async fn revoked_sessions_are_unauthorized(pool: PgPool) {
    let student = seed_user(&pool, "revoked@example.com", "student", None).await;
    let cookie = session_cookie(&pool, student).await;
    trading_portal::db::sessions::revoke_all_for_user(&pool, student)
        .await
        .unwrap();
    let app = spawn_app_with_pool(pool).await;

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/system/auth/me")
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(response.status().as_u16(), 401);
    let body = json_body(response).await;
    assert_eq!(body["error"], "UNAUTHORIZED");
}
