// src/lib.rs

pub mod db;
pub mod http;
pub mod repositories;
pub mod captcha;
pub mod giftcode;
pub mod services;
pub mod notification;
pub mod tasks;
pub mod utils;

pub use db::Database;
pub use giftbot_common::error::Error;
pub use giftbot_common::models;
pub use http::{DefaultHttpClient, HttpClient, HttpResponse};
