//! Server-rendered HTML pages.

use axum::{
    http::header,
    response::{Html, IntoResponse, Response},
};
use time::{macros::format_description, PrimitiveDateTime};

use crate::{
    auth::{repo_types::User, session::CurrentUser},
    flash::{Flash, IncomingFlash},
    tasks::{
        dto::{ListParams, SortBy, SortOrder},
        repo_types::Task,
    },
};

/// Rendered page that also consumes the pending flash message.
pub struct Page {
    html: String,
    flash: IncomingFlash,
}

impl Page {
    fn new(html: String, flash: IncomingFlash) -> Self {
        Self { html, flash }
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        let mut res = Html(self.html).into_response();
        if let Some(clear) = self.flash.consume_cookie() {
            res.headers_mut().append(header::SET_COOKIE, clear);
        }
        res
    }
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_deadline(deadline: Option<PrimitiveDateTime>) -> String {
    deadline
        .and_then(|d| {
            d.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
                .ok()
        })
        .unwrap_or_default()
}

fn layout(title: &str, user: Option<&CurrentUser>, flash: Option<&Flash>, body: &str) -> String {
    let nav = match user {
        Some(u) => format!(
            r#"<nav><a href="/">My tasks</a> | <a href="/todo/create">New task</a> | <a href="/profile">{}</a> | <a href="/logout">Log out</a></nav>"#,
            escape(&u.username)
        ),
        None => r#"<nav><a href="/login">Log in</a> | <a href="/register">Register</a></nav>"#
            .to_string(),
    };
    let flash = flash
        .map(|f| {
            format!(
                r#"<p class="flash flash-{}">{}</p>"#,
                f.level.as_str(),
                escape(&f.message)
            )
        })
        .unwrap_or_default();
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{title} - Taskbook</title></head>
<body>
{nav}
{flash}
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    )
}

pub fn error_page(title: &str, message: &str) -> String {
    layout(title, None, None, &format!("<p>{}</p>", escape(message)))
}

pub fn login(flash: IncomingFlash, next: &str) -> Page {
    let action = serde_urlencoded::to_string([("next", next)])
        .map(|q| format!("/login?{}", q))
        .unwrap_or_else(|_| "/login".into());
    let body = format!(
        r#"<form method="post" action="{action}">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Log in</button>
</form>
<p>No account? <a href="/register">Register</a></p>"#,
        action = escape(&action),
    );
    let html = layout("Log in", None, flash.message(), &body);
    Page::new(html, flash)
}

pub fn register(flash: IncomingFlash) -> Page {
    let body = r#"<form method="post" action="/register">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<small>At least 8 characters with upper and lower case letters, a digit and a symbol.</small>
<label>Phone <input name="phone" placeholder="09xxxxxxxxx"></label>
<label>Birthday <input name="birthday" placeholder="YYYY-MM-DD"></label>
<label>National ID <input name="national_id"></label>
<button type="submit">Register</button>
</form>"#;
    let html = layout("Register", None, flash.message(), body);
    Page::new(html, flash)
}

pub fn profile(flash: IncomingFlash, current: &CurrentUser, user: &User) -> Page {
    let birthday = user.birthday.map(|d| d.to_string()).unwrap_or_default();
    let body = format!(
        r#"<dl>
<dt>Username</dt><dd>{username}</dd>
<dt>Birthday</dt><dd>{birthday}</dd>
<dt>National ID</dt><dd>{national_id}</dd>
</dl>
<form method="post" action="/profile">
<label>Phone <input name="phone" value="{phone}" placeholder="09xxxxxxxxx"></label>
<fieldset><legend>Change password</legend>
<label>Current password <input name="current_password" type="password"></label>
<label>New password <input name="new_password" type="password"></label>
<label>Confirm new password <input name="confirm_password" type="password"></label>
</fieldset>
<button type="submit">Save</button>
</form>"#,
        username = escape(&user.username),
        birthday = escape(&birthday),
        national_id = escape(user.national_id.as_deref().unwrap_or("")),
        phone = escape(user.phone.as_deref().unwrap_or("")),
    );
    let html = layout("Profile", Some(current), flash.message(), &body);
    Page::new(html, flash)
}

fn toggle_form(task: &Task) -> String {
    format!(
        r#"<form method="post" action="/todo/{id}/toggle" class="inline"><button type="submit">{label}</button></form>"#,
        id = task.id,
        label = if task.done { "Mark open" } else { "Mark done" },
    )
}

fn selected(on: bool) -> &'static str {
    if on {
        " selected"
    } else {
        ""
    }
}

pub fn task_list(flash: IncomingFlash, user: &CurrentUser, tasks: &[Task], params: &ListParams) -> Page {
    let q = params.q.as_deref().unwrap_or("");
    let mut body = format!(
        r#"<form method="get" action="/">
<input name="q" value="{q}" placeholder="Search">
<select name="sort"><option value="{deadline}"{sd}>Deadline</option><option value="{date}"{sc}>Created</option></select>
<select name="order"><option value="{asc}"{oa}>Ascending</option><option value="{desc}"{od}>Descending</option></select>
<button type="submit">Apply</button>
</form>
"#,
        q = escape(q),
        deadline = SortBy::Deadline.as_str(),
        date = SortBy::Date.as_str(),
        asc = SortOrder::Asc.as_str(),
        desc = SortOrder::Desc.as_str(),
        sd = selected(params.sort == SortBy::Deadline),
        sc = selected(params.sort == SortBy::Date),
        oa = selected(params.order == SortOrder::Asc),
        od = selected(params.order == SortOrder::Desc),
    );

    if tasks.is_empty() {
        body.push_str("<p>No tasks yet.</p>");
    } else {
        body.push_str("<table>\n<tr><th>Title</th><th>Deadline</th><th>Priority</th><th>Status</th><th></th></tr>\n");
        for t in tasks {
            body.push_str(&format!(
                r#"<tr class="{class}"><td><a href="/todo/{id}">{title}</a></td><td>{deadline}</td><td>{priority}</td><td>{status}</td><td>{toggle}</td></tr>
"#,
                class = if t.done { "done" } else { "open" },
                id = t.id,
                title = escape(&t.title),
                deadline = format_deadline(t.deadline),
                priority = escape(&t.priority),
                status = if t.done { "done" } else { "open" },
                toggle = toggle_form(t),
            ));
        }
        body.push_str("</table>");
    }

    let html = layout("My tasks", Some(user), flash.message(), &body);
    Page::new(html, flash)
}

pub fn task_detail(flash: IncomingFlash, user: &CurrentUser, task: &Task) -> Page {
    let body = format!(
        r#"<dl>
<dt>Description</dt><dd>{description}</dd>
<dt>Deadline</dt><dd>{deadline}</dd>
<dt>Priority</dt><dd>{priority}</dd>
<dt>Status</dt><dd>{status}</dd>
</dl>
{toggle}
<a href="/todo/{id}/edit">Edit</a>
<form method="post" action="/todo/{id}/delete" class="inline"><button type="submit">Delete</button></form>"#,
        description = escape(task.description.as_deref().unwrap_or("")),
        deadline = format_deadline(task.deadline),
        priority = escape(&task.priority),
        status = if task.done { "done" } else { "open" },
        toggle = toggle_form(task),
        id = task.id,
    );
    let html = layout(&task.title, Some(user), flash.message(), &body);
    Page::new(html, flash)
}

/// Create form when `task` is `None`, edit form otherwise.
pub fn task_form(flash: IncomingFlash, user: &CurrentUser, task: Option<&Task>) -> Page {
    let (title, action) = match task {
        Some(t) => ("Edit task", format!("/todo/{}/edit", t.id)),
        None => ("New task", "/todo/create".to_string()),
    };
    let priority = task.map(|t| t.priority.as_str()).unwrap_or("medium");
    let body = format!(
        r#"<form method="post" action="{action}">
<label>Title <input name="title" value="{title}" required></label>
<label>Description <textarea name="description">{description}</textarea></label>
<label>Deadline <input name="deadline" value="{deadline}" placeholder="YYYY-MM-DD HH:MM"></label>
<label>Priority <select name="priority"><option value="low"{pl}>low</option><option value="medium"{pm}>medium</option><option value="high"{ph}>high</option>{custom}</select></label>
<button type="submit">Save</button>
</form>"#,
        title = escape(task.map(|t| t.title.as_str()).unwrap_or("")),
        description = escape(task.and_then(|t| t.description.as_deref()).unwrap_or("")),
        deadline = format_deadline(task.and_then(|t| t.deadline)),
        pl = selected(priority == "low"),
        pm = selected(priority == "medium"),
        ph = selected(priority == "high"),
        custom = if ["low", "medium", "high"].contains(&priority) {
            String::new()
        } else {
            format!(r#"<option value="{p}" selected>{p}</option>"#, p = escape(priority))
        },
    );
    let html = layout(title, Some(user), flash.message(), &body);
    Page::new(html, flash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn escape_html_special_characters() {
        assert_eq!(
            escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn deadline_renders_in_input_format() {
        assert_eq!(format_deadline(Some(datetime!(2024-01-15 09:30))), "2024-01-15 09:30");
        assert_eq!(format_deadline(None), "");
    }

    #[test]
    fn layout_escapes_flash_and_username() {
        let user = CurrentUser {
            id: 1,
            username: "<b>eve</b>".into(),
        };
        let html = layout(
            "T",
            Some(&user),
            Some(&Flash::error("<i>bad</i>")),
            "",
        );
        assert!(html.contains("&lt;b&gt;eve&lt;/b&gt;"));
        assert!(html.contains(r#"class="flash flash-error">&lt;i&gt;bad&lt;/i&gt;"#));
    }

    #[test]
    fn task_list_preselects_current_sort() {
        let user = CurrentUser {
            id: 1,
            username: "amy".into(),
        };
        let params = ListParams {
            q: Some("milk".into()),
            sort: SortBy::Date,
            order: SortOrder::Desc,
        };
        let page = task_list(IncomingFlash::default(), &user, &[], &params);
        assert!(page.html.contains(r#"<option value="date" selected>"#));
        assert!(page.html.contains(r#"<option value="desc" selected>"#));
        assert!(page.html.contains(r#"<option value="deadline">"#));
        assert!(page.html.contains(r#"value="milk""#));
    }

    #[test]
    fn login_form_keeps_next_target() {
        let page = login(IncomingFlash::default(), "/todo/3/edit");
        assert!(page.html.contains(r#"action="/login?next=%2Ftodo%2F3%2Fedit""#));
    }
}
