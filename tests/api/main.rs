mod auth_gate;
mod health_check;
mod helpers;
mod ledger;
mod login_code_store;
mod request_validation;
mod review_flow;
