use crate::core::AppError;
use crate::db::sessions::ClientInfo;
use actix_web::{http::header, web, HttpRequest};
use validator::Validate;

/// Unwraps a JSON body taken as `Result<Json<T>, _>`, so the session
/// extractor has already run by the time a bad body is reported.
pub fn json_body<T>(body: Result<web::Json<T>, actix_web::Error>) -> Result<T, AppError> {
    body.map(web::Json::into_inner).map_err(|e| {
        tracing::error!("Rejected request body: {}", e);
        AppError::invalid_body(e)
    })
}

pub fn validated_body<T: Validate>(
    body: Result<web::Json<T>, actix_web::Error>,
) -> Result<T, AppError> {
    let body = json_body(body)?;
    body.validate()?;
    Ok(body)
}

pub fn query_params<T>(query: Result<web::Query<T>, actix_web::Error>) -> Result<T, AppError> {
    query
        .map(web::Query::into_inner)
        .map_err(AppError::invalid_body)
}

pub fn client_info(req: &HttpRequest) -> ClientInfo {
    ClientInfo {
        ip: req.connection_info().realip_remote_addr().map(str::to_string),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}
