//! Common test utilities for QuickSwap integration tests
//!
//! This file contains the shared test environment (router, state and a
//! temporary static directory), a small cookie-keeping client that plays the
//! part of a browser, and helpers for the usual account and item steps.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use quickswap::{config::base_config, create_app, db::init_pool, run_migrations, AppState};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "hunter22";
const BOUNDARY: &str = "quickswap-test-boundary";

/// One application instance with its own database and static directory
pub struct TestEnv {
    pub app: Router,
    pub state: AppState,
    pub static_dir: TempDir,
}

impl TestEnv {
    /// Creates an application backed by a fresh shared in-memory database
    pub fn new() -> Self {
        let static_dir = tempfile::tempdir().unwrap();

        let mut config = base_config(None);
        config.secret_key = Some("integration-test-secret-with-enough-bytes".to_string());
        config.static_dir = static_dir.path().to_string_lossy().to_string();
        config.public_url = "http://quickswap.test".to_string();

        let database_url = format!("file:it_{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
        let pool = init_pool(&database_url).unwrap();
        run_migrations(&mut pool.get().unwrap()).unwrap();

        let state = AppState::new(&config, Arc::new(pool)).unwrap();
        let app = create_app(state.clone());

        Self { app, state, static_dir }
    }

    /// A new browser with an empty cookie jar
    pub fn client(&self) -> Client {
        Client {
            app: self.app.clone(),
            cookies: BTreeMap::new(),
        }
    }
}

/// A response with its body already read
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Raw `Set-Cookie` header for `name`
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{}=", name)))
            .map(str::to_string)
    }

    /// Asserts a `303 See Other` to `to`
    pub fn assert_redirect(&self, to: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {}", String::from_utf8_lossy(&self.body));
        assert_eq!(self.location(), Some(to));
    }
}

/// A browser: sends requests and keeps the cookies it is given
pub struct Client {
    app: Router,
    cookies: BTreeMap<String, String>,
}

impl Client {
    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    async fn send(&mut self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let mut builder = builder;
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie);
        }

        let response = self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let pair = value.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else { continue };
            if value.is_empty() {
                self.cookies.remove(name.trim());
            } else {
                self.cookies.insert(name.trim().to_string(), value.to_string());
            }
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
        TestResponse { status, headers, body }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(uri), Body::empty()).await
    }

    /// Posts an urlencoded form
    pub async fn post_form(&mut self, uri: &str, form: &[(&str, &str)]) -> TestResponse {
        let body = serde_html_form::to_string(form).unwrap();
        let builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(builder, Body::from(body)).await
    }

    /// Posts a `multipart/form-data` body
    pub async fn post_multipart(&mut self, uri: &str, parts: &[Part<'_>]) -> TestResponse {
        let builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY));
        self.send(builder, Body::from(multipart_body(parts))).await
    }
}

/// One field of a multipart body
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// An encoded picture of the given size
pub fn picture_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let picture = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30])));
    let mut bytes = Cursor::new(Vec::new());
    picture.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

/// Messages of the `flashes` array of a page view
pub fn flash_messages(page: &Value) -> Vec<String> {
    page["flashes"]
        .as_array()
        .map(|flashes| {
            flashes
                .iter()
                .filter_map(|f| f["message"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn email_of(username: &str) -> String {
    format!("{}@example.com", username)
}

/// Registers `username` with [`PASSWORD`]
pub async fn register(client: &mut Client, username: &str) -> TestResponse {
    let email = email_of(username);
    client
        .post_form(
            "/register",
            &[
                ("username", username),
                ("email", email.as_str()),
                ("password", PASSWORD),
                ("confirm_password", PASSWORD),
            ],
        )
        .await
}

pub async fn login(client: &mut Client, username: &str) -> TestResponse {
    let email = email_of(username);
    client
        .post_form("/login", &[("email", email.as_str()), ("password", PASSWORD)])
        .await
}

/// Registers and logs in a fresh browser as `username`
pub async fn logged_in(env: &TestEnv, username: &str) -> Client {
    let mut client = env.client();
    register(&mut client, username).await.assert_redirect("/login");
    login(&mut client, username).await.assert_redirect("/");
    client
}

/// Posts an item and returns its id
pub async fn post_item(client: &mut Client, title: &str, value: &str) -> i32 {
    client
        .post_form(
            "/item/new",
            &[("title", title), ("description", "Barely used"), ("value", value)],
        )
        .await
        .assert_redirect("/");

    let page = client.get("/").await.json();
    page["items"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["title"] == title)
        .and_then(|item| item["id"].as_i64())
        .map(|id| id as i32)
        .unwrap()
}
