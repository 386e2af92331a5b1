//! Page views
//!
//! Every page is answered with a JSON document carrying what a template
//! would receive: the page title, the logged-in user, pending flash
//! messages and the page's own fields.

use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Serialize;

use crate::flash::{self, FlashLevel, FlashMessage};
use crate::models::User;

/// Name shown in front of every page title
pub const SITE_NAME: &str = "QuickSwap";

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub title: String,
    pub current_user: Option<User>,
    pub flashes: Vec<FlashMessage>,
    #[serde(flatten)]
    pub content: T,
}

/// A rendered page plus the cookie jar with the drained flashes removed
pub type Rendered<T> = (SignedCookieJar, Json<Page<T>>);

fn full_title(title: Option<&str>) -> String {
    match title {
        Some(title) => format!("{} - {}", SITE_NAME, title),
        None => SITE_NAME.to_string(),
    }
}

/// Renders `content` as a page, draining the queued flash messages
pub fn render<T: Serialize>(
    jar: SignedCookieJar,
    current_user: Option<User>,
    title: Option<&str>,
    content: T,
) -> Rendered<T> {
    let (jar, flashes) = flash::take(jar);
    (
        jar,
        Json(Page {
            title: full_title(title),
            current_user,
            flashes,
            content,
        }),
    )
}

/// Queues a flash message and answers with `303 See Other`
pub fn redirect_with_flash(jar: SignedCookieJar, level: FlashLevel, message: &str, to: &str) -> Response {
    let jar = flash::push(jar, level, message);
    (jar, Redirect::to(to)).into_response()
}

/// Legend and prefilled fields of a form page
#[derive(Serialize, Debug, Default)]
pub struct FormPage<F> {
    pub legend: &'static str,
    pub form: F,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum_extra::extract::cookie::Key;

    #[derive(Serialize)]
    struct Greeting {
        greeting: &'static str,
    }

    #[test]
    fn test_render_drains_flashes() {
        let jar = SignedCookieJar::new(Key::generate());
        let jar = flash::push(jar, FlashLevel::Info, "Hello there");

        let (jar, Json(page)) = render(jar, None, Some("About"), Greeting { greeting: "hi" });

        assert_eq!(page.title, "QuickSwap - About");
        assert_eq!(page.flashes.len(), 1);
        assert!(flash::take(jar).1.is_empty());

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["greeting"], "hi");
        assert!(json["current_user"].is_null());
    }

    #[test]
    fn test_untitled_page() {
        let jar = SignedCookieJar::new(Key::generate());
        let (_, Json(page)) = render(jar, None, None, Greeting { greeting: "hi" });
        assert_eq!(page.title, "QuickSwap");
    }

    #[test]
    fn test_redirect_with_flash() {
        let jar = SignedCookieJar::new(Key::generate());
        let response = redirect_with_flash(jar, FlashLevel::Success, "Done", "/somewhere");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/somewhere");
        let cookies: Vec<_> = response.headers().get_all(header::SET_COOKIE).iter().collect();
        assert!(cookies.iter().any(|c| c.to_str().unwrap().starts_with("_flashes=")));
    }
}
