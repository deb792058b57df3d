//! Request body extraction.

use axum::extract::FromRequest;

use crate::error::AppError;

/// JSON body extractor whose rejections render as an [`AppError`], so a
/// malformed or mistyped body gets the same `{error, code, messages}` shape
/// as any other validation failure.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
