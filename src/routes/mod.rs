use actix_web::web::{scope, ServiceConfig};
use actix_web::Scope;
use admin_users::{assign_leader, change_role, change_status, list_users, role_audit_log};
use auth::{
    logout, me, password_login, request_login_code, request_reset_code, reset_password,
    verify_login_code,
};
use course_access::{
    complete_course, get_note, my_course_access, request_course, save_note, update_progress,
    view_course,
};
use file_access::{download_file, list_files, my_file_requests, request_file};
use notifications::{list_notifications, mark_all_read, mark_read, send_notification};
use review::{
    approve_course_range, bulk_review_courses, bulk_review_files, pending_courses, pending_files,
    review_course,
};

mod admin_users;
mod auth;
mod course_access;
mod extract;
mod file_access;
mod health_check;
mod notifications;
mod review;

use crate::routes::health_check::*;

fn auth_routes() -> Scope {
    scope("auth")
        .service(password_login)
        .service(request_login_code)
        .service(verify_login_code)
        .service(logout)
        .service(me)
        .service(request_reset_code)
        .service(reset_password)
}

fn courses_routes() -> Scope {
    // fixed segments before `/{course_id}`
    scope("courses")
        .service(request_course)
        .service(complete_course)
        .service(update_progress)
        .service(save_note)
        .service(my_course_access)
        .service(view_course)
        .service(get_note)
}

fn files_routes() -> Scope {
    scope("files")
        .service(list_files)
        .service(request_file)
        .service(my_file_requests)
        .service(download_file)
}

fn notifications_routes() -> Scope {
    scope("notifications")
        .service(list_notifications)
        .service(mark_read)
        .service(mark_all_read)
}

fn admin_routes() -> Scope {
    scope("admin")
        // review engine
        .service(review_course)
        .service(bulk_review_courses)
        .service(approve_course_range)
        .service(pending_courses)
        .service(bulk_review_files)
        .service(pending_files)
        // outbox
        .service(send_notification)
        // user administration
        .service(list_users)
        .service(change_role)
        .service(change_status)
        .service(assign_leader)
        .service(role_audit_log)
}

pub fn portal_routes(conf: &mut ServiceConfig) {
    conf.service(health_check).service(
        scope("api/system")
            .service(auth_routes())
            .service(courses_routes())
            .service(files_routes())
            .service(notifications_routes())
            .service(admin_routes()),
    );
}
