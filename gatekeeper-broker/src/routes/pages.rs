//! HTML result pages for the approval links

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use gatekeeper_core::escape_html;

use crate::approval::{ApprovedAdmin, IdentityStatus, RejectedRequest};

#[derive(Clone, Copy)]
enum Tone {
    Success,
    Neutral,
    Failure,
}

impl Tone {
    fn color(self) -> &'static str {
        match self {
            Tone::Success => "#2e7d32",
            Tone::Neutral => "#455a64",
            Tone::Failure => "#c62828",
        }
    }
}

/// Render a page; `body` must already be escaped
fn page(status: StatusCode, tone: Tone, title: &str, body: &str) -> Response {
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <style>
    body {{ font-family: Arial, sans-serif; background: #f4f6f8; color: #333; margin: 0; }}
    .card {{ max-width: 520px; margin: 80px auto; background: white; padding: 32px; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); text-align: center; }}
    h1 {{ color: {color}; font-size: 24px; }}
    .button {{ display: inline-block; margin-top: 16px; padding: 12px 28px; background: #2196F3; color: white; text-decoration: none; border-radius: 5px; }}
    .note {{ color: #666; font-size: 14px; }}
  </style>
</head>
<body>
  <div class="card">
    <h1>{title}</h1>
    {body}
  </div>
</body>
</html>
"#,
        title = escape_html(title),
        color = tone.color(),
        body = body,
    );

    (status, Html(html)).into_response()
}

pub fn approved(admin: &ApprovedAdmin, login_url: &str) -> Response {
    let greeting = if admin.admin_created {
        format!(
            "<p>The administrator account for <strong>{}</strong> is now active.</p>",
            escape_html(&admin.email)
        )
    } else {
        format!(
            "<p>The administrator account for <strong>{}</strong> has been updated.</p>",
            escape_html(&admin.email)
        )
    };

    let note = match admin.identity {
        IdentityStatus::Failed => {
            "<p class=\"note\">The login could not be set up automatically. Please contact the site administrator.</p>"
        }
        IdentityStatus::Created | IdentityStatus::Updated => "",
    };

    let body = format!(
        "{}{}<a class=\"button\" href=\"{}\">Go to login</a>",
        greeting,
        note,
        escape_html(login_url)
    );

    page(StatusCode::OK, Tone::Success, "Account approved", &body)
}

pub fn rejected(request: &RejectedRequest) -> Response {
    let body = format!(
        "<p>The administrator request for <strong>{}</strong> has been rejected. No account was created.</p>",
        escape_html(&request.email)
    );
    page(StatusCode::OK, Tone::Neutral, "Request rejected", &body)
}

pub fn missing_token() -> Response {
    page(
        StatusCode::BAD_REQUEST,
        Tone::Failure,
        "Missing token",
        "<p>The link you followed is incomplete. Open the full link from the email.</p>",
    )
}

pub fn invalid_token() -> Response {
    page(
        StatusCode::BAD_REQUEST,
        Tone::Failure,
        "Invalid or used link",
        "<p>This link is invalid, has expired, or has already been used.</p>",
    )
}

pub fn internal_error() -> Response {
    page(
        StatusCode::INTERNAL_SERVER_ERROR,
        Tone::Failure,
        "Something went wrong",
        "<p>The request could not be completed. Please try again later.</p>",
    )
}
