use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};

/// Value of the cookie `name` from the request's `Cookie` headers.
pub fn read<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// `Set-Cookie` value for an `HttpOnly` cookie scoped to the whole site.
/// `max_age` of `None` makes it a browser-session cookie.
pub fn set(name: &str, value: &str, max_age: Option<i64>) -> String {
    let mut cookie = format!("{}={}; HttpOnly; Path=/; SameSite=Lax", name, value);
    if let Some(secs) = max_age {
        cookie.push_str(&format!("; Max-Age={}", secs));
    }
    cookie
}

pub fn clear(name: &str) -> String {
    format!("{}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax", name)
}

/// Response mapper that adds `Secure` to every cookie the app sets.
/// Installed only when `COOKIE_SECURE` is on.
pub async fn mark_secure(mut res: Response) -> Response {
    let headers = res.headers_mut();
    let cookies: Vec<HeaderValue> = headers.get_all(header::SET_COOKIE).iter().cloned().collect();
    headers.remove(header::SET_COOKIE);
    for cookie in cookies {
        let secured = cookie
            .to_str()
            .ok()
            .filter(|c| !c.contains("; Secure"))
            .and_then(|c| HeaderValue::from_str(&format!("{}; Secure", c)).ok())
            .unwrap_or(cookie);
        headers.append(header::SET_COOKIE, secured);
    }
    res
}
