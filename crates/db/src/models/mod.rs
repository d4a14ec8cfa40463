#![allow(clippy::useless_conversion)]

pub mod category;
pub mod comment;
pub mod event;
pub mod event_version;
pub mod ids;
pub mod platform_status;
pub mod status_history;

use sea_orm::{DbErr, JsonValue};
use serde::{Serialize, de::DeserializeOwned};

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<JsonValue, DbErr> {
    serde_json::to_value(value).map_err(|err| DbErr::Json(err.to_string()))
}

pub(crate) fn from_json<T: DeserializeOwned>(value: JsonValue) -> Result<T, DbErr> {
    serde_json::from_value(value).map_err(|err| DbErr::Json(err.to_string()))
}
