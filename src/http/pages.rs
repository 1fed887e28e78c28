//! HTML pages: the sign-in form and the error page.

use axum::http::StatusCode;

/// Data shown on the sign-in form.
#[derive(Debug, Clone, Copy)]
pub struct SignInPage<'a> {
    /// Where to go after signing in; posted back as `rd`.
    pub redirect: &'a str,
    /// Show the "invalid credentials" notice.
    pub failed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ErrorPage<'a> {
    pub status: StatusCode,
    pub title: &'a str,
    pub message: &'a str,
}

pub trait PageRenderer: Send + Sync {
    fn sign_in(&self, page: &SignInPage<'_>) -> String;
    fn error(&self, page: &ErrorPage<'_>) -> String;
}

/// Built-in templates.
#[derive(Debug, Clone)]
pub struct DefaultPages {
    prefix: String,
    sign_in_message: String,
    footer: String,
}

impl DefaultPages {
    /// `footer` of `-` hides the footer; empty shows the default one.
    pub fn new(prefix: impl Into<String>, sign_in_message: impl Into<String>, footer: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sign_in_message: sign_in_message.into(),
            footer: footer.into(),
        }
    }

    fn footer_html(&self) -> String {
        match self.footer.as_str() {
            "-" => String::new(),
            "" => format!(
                "<footer>Secured with LDAP Auth Proxy version {}</footer>",
                env!("CARGO_PKG_VERSION")
            ),
            custom => format!("<footer>{custom}</footer>"),
        }
    }
}

impl PageRenderer for DefaultPages {
    fn sign_in(&self, page: &SignInPage<'_>) -> String {
        let message = if self.sign_in_message.is_empty() {
            String::new()
        } else {
            format!("<p class=\"message\">{}</p>", escape(&self.sign_in_message))
        };
        let failed = if page.failed {
            "<p class=\"error\">Invalid username or password.</p>"
        } else {
            ""
        };
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Sign In</title>
</head>
<body>
<main class="signin">
{message}
{failed}
<form method="POST" action="{action}">
<input type="hidden" name="rd" value="{redirect}">
<label for="username">Username</label>
<input type="text" id="username" name="username" autocapitalize="off" autocorrect="off" autofocus>
<label for="password">Password</label>
<input type="password" id="password" name="password">
<button type="submit">Sign In</button>
</form>
</main>
{footer}
</body>
</html>
"#,
            action = escape(&format!("{}/sign_in", self.prefix)),
            redirect = escape(page.redirect),
            footer = self.footer_html(),
        )
    }

    fn error(&self, page: &ErrorPage<'_>) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<h2>{title}</h2>
<p>{message}</p>
<hr>
<p><a href="{prefix}/sign_in">Sign In</a></p>
</body>
</html>
"#,
            title = escape(&format!("{} {}", page.status.as_u16(), page.title)),
            message = escape(page.message),
            prefix = escape(&self.prefix),
        )
    }
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
